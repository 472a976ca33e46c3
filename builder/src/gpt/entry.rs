use byteorder::{LittleEndian, WriteBytesExt};
use ptimage_core::Guid;

pub const ENTRY_SIZE: usize = 128;
const MAX_LABEL_UNITS: usize = 36;

/// One 128-byte GPT partition entry.
#[derive(Debug, Clone)]
pub struct Entry {
    pub type_guid: Guid,
    pub unique_guid: Guid,
    pub first_lba: u64,
    pub last_lba: u64,
    pub attributes: u64,
    pub label: String,
}

impl Entry {
    /// Serializes the entry, truncating the label to at most 36 UTF-16LE
    /// code units and zero-padding the remainder of the 72-byte label
    /// field.
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = Vec::with_capacity(ENTRY_SIZE);
        buf.extend_from_slice(&self.type_guid.to_le_bytes());
        buf.extend_from_slice(&self.unique_guid.to_le_bytes());
        buf.write_u64::<LittleEndian>(self.first_lba).unwrap();
        buf.write_u64::<LittleEndian>(self.last_lba).unwrap();
        buf.write_u64::<LittleEndian>(self.attributes).unwrap();

        let units: Vec<u16> = self.label.encode_utf16().take(MAX_LABEL_UNITS).collect();
        for unit in &units {
            buf.write_u16::<LittleEndian>(*unit).unwrap();
        }
        buf.resize(ENTRY_SIZE, 0);

        let mut out = [0u8; ENTRY_SIZE];
        out.copy_from_slice(&buf);
        out
    }
}
