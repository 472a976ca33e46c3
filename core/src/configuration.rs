use crate::{ConfigError, Instructions, Partition, TypeId};

/// Which on-disk table format a [`Configuration`] targets, determined by
/// the (uniform) type tag of its partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableType {
    Mbr,
    Gpt,
}

/// The fully decoded configuration: global instructions plus the ordered
/// partition list. Constructed once by the decoder, then threaded (never
/// mutated except by the layout planner assigning LBAs) through
/// serialization.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub instructions: Instructions,
    pub partitions: Vec<Partition>,
}

impl Configuration {
    /// Determines MBR vs GPT from the partitions' type tags, rejecting a
    /// mix and an empty list.
    pub fn table_type(&self) -> Result<TableType, ConfigError> {
        if self.partitions.is_empty() {
            return Err(ConfigError::EmptyPartitionList);
        }

        let mut table_type = None;
        for part in &self.partitions {
            let this = match part.type_id {
                TypeId::Mbr(_) => TableType::Mbr,
                TypeId::Gpt(_) => TableType::Gpt,
            };
            match table_type {
                None => table_type = Some(this),
                Some(t) if t == this => {}
                Some(_) => return Err(ConfigError::MixedPartitionType(part.label.clone())),
            }
        }

        Ok(table_type.expect("checked non-empty above"))
    }
}
