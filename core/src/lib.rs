pub mod configuration;
pub mod error;
pub mod guid;
pub mod instructions;
pub mod partition;

pub use configuration::{Configuration, TableType};
pub use error::{ConfigError, Error, ImageError, LayoutError};
pub use guid::Guid;
pub use instructions::Instructions;
pub use partition::{Partition, PartitionFlags, TypeId};
