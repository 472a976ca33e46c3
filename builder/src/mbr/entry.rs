use byteorder::{LittleEndian, WriteBytesExt};

pub const ENTRY_SIZE: usize = 16;

/// One 16-byte legacy MBR/EBR partition table entry. The CHS fields are
/// carried for on-disk fidelity but never computed from real geometry —
/// callers set them to the fixed values the spec names (zeroed for real
/// partitions, the 0xFF sentinel for the protective entry).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MbrEntry {
    pub bootable: u8,
    pub first_head: u8,
    pub first_sector_cylinder: u8,
    pub first_cylinder: u8,
    pub part_type: u8,
    pub last_head: u8,
    pub last_sector_cylinder: u8,
    pub last_cylinder: u8,
    pub first_lba: u32,
    pub num_sectors: u32,
}

impl MbrEntry {
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = Vec::with_capacity(ENTRY_SIZE);
        buf.push(self.bootable);
        buf.push(self.first_head);
        buf.push(self.first_sector_cylinder);
        buf.push(self.first_cylinder);
        buf.push(self.part_type);
        buf.push(self.last_head);
        buf.push(self.last_sector_cylinder);
        buf.push(self.last_cylinder);
        buf.write_u32::<LittleEndian>(self.first_lba).unwrap();
        buf.write_u32::<LittleEndian>(self.num_sectors).unwrap();

        let mut out = [0u8; ENTRY_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    /// The protective MBR's single entry: CHS (0,1,0)..(255,255,255),
    /// type 0xEE, covering the whole addressable disk.
    pub fn protective() -> Self {
        MbrEntry {
            bootable: 0,
            first_head: 0,
            first_sector_cylinder: 0x01,
            first_cylinder: 0,
            part_type: 0xEE,
            last_head: 0xFF,
            last_sector_cylinder: 0xFF,
            last_cylinder: 0xFF,
            first_lba: 1,
            num_sectors: 0xFFFF_FFFF,
        }
    }
}
