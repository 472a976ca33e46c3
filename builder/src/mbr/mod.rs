//! MBR layout planner and serializer, plus the EBR chain for more than
//! four partitions. Grounded in `original_source/mbr.py::{MBR,EBR}`.

pub mod entry;
pub mod record;

use ptimage_core::{ConfigError, Configuration, Error, ImageError, LayoutError, Partition, TypeId};

use crate::util::kb_to_sectors;
use entry::MbrEntry;

const MAX_PRIMARY_ENTRIES: usize = 4;
const EXTENDED_PARTITION_TYPE: u8 = 0x05;

#[derive(Debug)]
pub struct MbrImages {
    pub mbr: Vec<u8>,
    pub ebr: Option<Vec<u8>>,
}

/// Loads and validates an optional boot-code file. The file must be
/// exactly 440 or 446 bytes, matching the two conventional boot-code
/// sizes (with or without the 4-byte disk-signature gap).
pub fn read_boot_code(path: &std::path::Path) -> Result<Vec<u8>, Error> {
    let bytes = std::fs::read(path).map_err(|source| ImageError::Read {
        path: path.display().to_string(),
        source,
    })?;
    if bytes.len() != 440 && bytes.len() != 446 {
        return Err(ImageError::InvalidBootCode(bytes.len() as u64).into());
    }
    Ok(bytes)
}

pub fn build(config: &Configuration, boot_code: Option<&[u8]>) -> Result<MbrImages, Error> {
    let partitions = &config.partitions;
    let sector_size = config.instructions.sector_size_bytes;
    let sectors_per_bulk = config.instructions.sectors_per_bulk();
    if sectors_per_bulk == 0 {
        return Err(ConfigError::ZeroBulkSize.into());
    }

    let needs_ebr = partitions.len() > MAX_PRIMARY_ENTRIES;
    let primary_count = if needs_ebr { 3 } else { partitions.len() };

    let mut tracker = crate::write_protect::WriteProtectTracker::new();
    let (mut entries, cursor) =
        plan_primary(partitions, primary_count, sector_size, sectors_per_bulk, &mut tracker);

    if needs_ebr {
        entries[3] = MbrEntry {
            bootable: 0,
            part_type: EXTENDED_PARTITION_TYPE,
            first_lba: cursor as u32,
            num_sectors: 0,
            ..MbrEntry::default()
        };
    }

    for (part, entry) in partitions.iter().take(primary_count).zip(entries.iter()) {
        log::info!(
            "mbr partition \"{}\": first_lba={} num_sectors={}",
            part.label,
            entry.first_lba,
            entry.num_sectors
        );
    }

    let mbr_bytes = record::serialize_sector(boot_code, config.instructions.disk_signature, &entries).to_vec();

    let ebr_bytes = if needs_ebr {
        Some(plan_ebr(partitions, cursor, sectors_per_bulk, &mut tracker)?)
    } else {
        None
    };

    Ok(MbrImages { mbr: mbr_bytes, ebr: ebr_bytes })
}

fn mbr_type(part: &Partition) -> u8 {
    match part.type_id {
        TypeId::Mbr(code) => code,
        TypeId::Gpt(_) => unreachable!("orchestrator enforces uniform MBR table type"),
    }
}

fn plan_primary(
    partitions: &[Partition],
    count: usize,
    sector_size_bytes: u64,
    sectors_per_bulk: u64,
    tracker: &mut crate::write_protect::WriteProtectTracker,
) -> ([MbrEntry; 4], u64) {
    let mut entries = [MbrEntry::default(); 4];
    let mut first_lba: u64 = 1;
    let mut last_lba: u64 = 1;

    for (i, part) in partitions.iter().take(count).enumerate() {
        if part.first_lba_in_kb > 0 {
            first_lba = kb_to_sectors(part.first_lba_in_kb, sector_size_bytes);
        }
        if first_lba < last_lba {
            first_lba = last_lba;
        }

        // Every MBR partition is treated as write-protected for tracker
        // purposes, regardless of its own readonly flag.
        tracker.update(first_lba, part.size_in_sec, sectors_per_bulk);

        entries[i] = MbrEntry {
            bootable: if part.flags.bootable { 0x80 } else { 0x00 },
            part_type: mbr_type(part),
            first_lba: first_lba as u32,
            num_sectors: part.size_in_sec as u32,
            ..MbrEntry::default()
        };

        last_lba = first_lba + part.size_in_sec;
    }

    (entries, last_lba)
}

fn plan_ebr(
    partitions: &[Partition],
    start_lba: u64,
    sectors_per_bulk: u64,
    tracker: &mut crate::write_protect::WriteProtectTracker,
) -> Result<Vec<u8>, Error> {
    let part_num = partitions.len();
    let mut first_lba = start_lba + part_num as u64 - 3;
    let mut last_lba = first_lba;
    let mut ebr_offset: i64 = 0;
    let mut prev_relative: Option<i64> = None;
    let mut records = Vec::with_capacity((part_num - 3) * record::SECTOR_SIZE);

    for (i, part) in partitions.iter().enumerate().skip(3) {
        if first_lba < last_lba {
            first_lba = last_lba;
        }

        tracker.update(first_lba, part.size_in_sec, sectors_per_bulk);

        let relative_first_lba = first_lba as i64 - start_lba as i64 - ebr_offset;
        if relative_first_lba < 0 {
            return Err(LayoutError::EbrChainInvalid(format!(
                "partition \"{}\" resolves to a negative EBR-relative LBA",
                part.label
            ))
            .into());
        }
        if let Some(prev) = prev_relative {
            if relative_first_lba <= prev {
                return Err(LayoutError::EbrChainInvalid(format!(
                    "EBR chain is not monotonically increasing at partition \"{}\"",
                    part.label
                ))
                .into());
            }
        }
        prev_relative = Some(relative_first_lba);

        let entry1 = MbrEntry {
            bootable: if part.flags.bootable { 0x80 } else { 0x00 },
            part_type: mbr_type(part),
            first_lba: relative_first_lba as u32,
            num_sectors: part.size_in_sec as u32,
            ..MbrEntry::default()
        };

        last_lba = first_lba + part.size_in_sec;

        let is_last = i + 1 == part_num;
        let entry2 = if is_last {
            MbrEntry::default()
        } else {
            MbrEntry {
                bootable: 0,
                part_type: EXTENDED_PARTITION_TYPE,
                first_lba: (i - 2) as u32,
                num_sectors: 1,
                ..MbrEntry::default()
            }
        };

        let sector = record::serialize_sector(
            None,
            0,
            &[entry1, entry2, MbrEntry::default(), MbrEntry::default()],
        );
        records.extend_from_slice(&sector);

        ebr_offset += 1;
    }

    Ok(records)
}
