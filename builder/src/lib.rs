pub mod crc32;
pub mod gpt;
pub mod mbr;
pub mod orchestrator;
pub mod util;
pub mod write_protect;
pub mod xml;

pub use gpt::GptOptions;
pub use orchestrator::{run, Artifacts};
