use byteorder::{LittleEndian, WriteBytesExt};
use ptimage_core::{Guid, LayoutError};

use crate::crc32::crc32;

pub const HEADER_SIZE: u32 = 92;
pub const ENTRY_SIZE: u32 = 128;
pub const FIRST_USABLE_LBA: u64 = 34;
pub const SIGNATURE: &[u8; 8] = b"EFI PART";
pub const REVISION: u32 = 0x0001_0000;

/// The 92-byte GPT header. Primary and backup headers share the same
/// layout but are seeded with different `current_lba`/`backup_lba`/
/// `entry_array_lba` defaults, which — because the device's true last LBA
/// is not known at build time — are left at those seed values rather than
/// computed from real geometry (see spec's Open Questions on the
/// `last_usable_lba` quirk).
#[derive(Debug, Clone, Copy)]
pub struct GptHeader {
    pub header_crc32: u32,
    pub current_lba: u64,
    pub backup_lba: u64,
    pub first_usable_lba: u64,
    pub last_usable_lba: u64,
    pub disk_guid: Guid,
    pub entry_array_lba: u64,
    pub entry_count: u32,
    pub entry_array_crc32: u32,
}

impl GptHeader {
    pub fn primary(disk_guid: Guid) -> Self {
        GptHeader {
            header_crc32: 0,
            current_lba: 1,
            backup_lba: 0,
            first_usable_lba: FIRST_USABLE_LBA,
            last_usable_lba: 0,
            disk_guid,
            entry_array_lba: 2,
            entry_count: 0,
            entry_array_crc32: 0,
        }
    }

    pub fn backup(disk_guid: Guid) -> Self {
        GptHeader {
            header_crc32: 0,
            current_lba: 0,
            backup_lba: 1,
            first_usable_lba: FIRST_USABLE_LBA,
            last_usable_lba: 0,
            disk_guid,
            entry_array_lba: 0,
            entry_count: 0,
            entry_array_crc32: 0,
        }
    }

    /// Serializes the 92-byte header, zeroing `header_crc32` first,
    /// computing the CRC over those 92 bytes, then patching it back in at
    /// bytes 16..20.
    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE as usize], LayoutError> {
        let mut buf = Vec::with_capacity(HEADER_SIZE as usize);
        buf.extend_from_slice(SIGNATURE);
        buf.write_u32::<LittleEndian>(REVISION).unwrap();
        buf.write_u32::<LittleEndian>(HEADER_SIZE).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap(); // header_crc32, zeroed for CRC
        buf.write_u32::<LittleEndian>(0).unwrap(); // reserved
        buf.write_u64::<LittleEndian>(self.current_lba).unwrap();
        buf.write_u64::<LittleEndian>(self.backup_lba).unwrap();
        buf.write_u64::<LittleEndian>(self.first_usable_lba).unwrap();
        buf.write_u64::<LittleEndian>(self.last_usable_lba).unwrap();
        buf.extend_from_slice(&self.disk_guid.to_le_bytes());
        buf.write_u64::<LittleEndian>(self.entry_array_lba).unwrap();
        buf.write_u32::<LittleEndian>(self.entry_count).unwrap();
        buf.write_u32::<LittleEndian>(ENTRY_SIZE).unwrap();
        buf.write_u32::<LittleEndian>(self.entry_array_crc32).unwrap();

        if buf.len() != HEADER_SIZE as usize {
            return Err(LayoutError::CrcLengthMismatch {
                expected: HEADER_SIZE as usize,
                actual: buf.len(),
            });
        }

        let crc = crc32(&buf);
        buf[16..20].copy_from_slice(&crc.to_le_bytes());

        let mut out = [0u8; HEADER_SIZE as usize];
        out.copy_from_slice(&buf);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_crc_is_self_consistent() {
        let mut header = GptHeader::primary(Guid(0));
        header.last_usable_lba = 2113;
        header.entry_count = 4;
        header.entry_array_crc32 = 0xDEADBEEF;
        let bytes = header.to_bytes().unwrap();

        let mut zeroed = bytes;
        zeroed[16..20].copy_from_slice(&[0, 0, 0, 0]);
        let expected = crc32(&zeroed);
        let actual = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        assert_eq!(actual, expected);
    }

    #[test]
    fn primary_and_backup_defaults_match_spec_quirk() {
        let primary = GptHeader::primary(Guid(0));
        assert_eq!(primary.current_lba, 1);
        assert_eq!(primary.backup_lba, 0);
        assert_eq!(primary.entry_array_lba, 2);

        let backup = GptHeader::backup(Guid(0));
        assert_eq!(backup.current_lba, 0);
        assert_eq!(backup.backup_lba, 1);
        assert_eq!(backup.entry_array_lba, 0);
    }
}
