//! GPT layout planner and serializer. Grounded in
//! `original_source/gpt.py::GPTPartitionTable.{init_primary_gpt,
//! init_secondary_gpt,create_gpt_*_bin}`.

pub mod entry;
pub mod header;

use ptimage_core::{ConfigError, Configuration, Error, Guid, LayoutError, Partition, TypeId};
use rand::Rng;

use crate::crc32::crc32;
use crate::mbr::entry::MbrEntry;
use crate::mbr::record;
use crate::util::sectors_till_next_bulk;
use crate::write_protect::WriteProtectTracker;
use entry::Entry;
use header::GptHeader;

pub const FIRST_PARTITION_LBA: u64 = header::FIRST_USABLE_LBA;
pub const ENTRY_ARRAY_SECTORS: u64 = 32;
pub const PRIMARY_GPT_SECTORS: u64 = 1 + ENTRY_ARRAY_SECTORS;
pub const SECONDARY_GPT_SECTORS: u64 = ENTRY_ARRAY_SECTORS + 1;
const MAX_ENTRY_COUNT: u32 = 128;
const MIN_ENTRY_COUNT: u32 = 4;
const ENTRY_ARRAY_BYTES: usize = MAX_ENTRY_COUNT as usize * entry::ENTRY_SIZE;

/// Build-time knobs not carried in the XML itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct GptOptions {
    pub sequential_guid: bool,
    pub all_128_partitions: bool,
}

#[derive(Debug)]
pub struct GptImages {
    /// `gpt_both.bin` = protective MBR ‖ primary GPT ‖ backup GPT.
    pub both: Vec<u8>,
    /// `gpt_main.bin` = protective MBR ‖ primary GPT.
    pub main: Vec<u8>,
    /// `gpt_backup.bin` = backup GPT only.
    pub backup: Vec<u8>,
}

pub fn build(config: &Configuration, options: GptOptions, rng: &mut impl Rng) -> Result<GptImages, Error> {
    let partitions = &config.partitions;
    let raw_count = partitions.len() as u32;
    if raw_count > MAX_ENTRY_COUNT {
        return Err(LayoutError::TooManyEntries(raw_count).into());
    }

    let entry_count = if options.all_128_partitions {
        MAX_ENTRY_COUNT
    } else {
        quantize_entry_count(raw_count)
    };

    let sectors_per_bulk = config.instructions.sectors_per_bulk();
    if sectors_per_bulk == 0 {
        return Err(ConfigError::ZeroBulkSize.into());
    }
    let kb_per_bulk = config.instructions.write_protect_bulk_size_kb;

    let mut tracker = WriteProtectTracker::new();
    let entries = plan_entries(
        partitions,
        config.instructions.auto_grow_last_partition,
        kb_per_bulk,
        sectors_per_bulk,
        &mut tracker,
        options,
        rng,
    );

    let last_entry_lba = entries.last().map(|e| e.last_lba).unwrap_or(FIRST_PARTITION_LBA - 1);
    let last_usable_lba = if config.instructions.auto_grow_last_partition {
        0
    } else {
        last_entry_lba + ENTRY_ARRAY_SECTORS
    };

    for part in partitions {
        log::info!(
            "gpt partition \"{}\": {} KB, readonly={}",
            part.label,
            part.size_in_kb,
            part.flags.readonly
        );
    }

    let entry_array = serialize_entry_array(&entries);
    let entry_array_crc = crc32(&entry_array[..entry_count as usize * entry::ENTRY_SIZE]);

    let mut primary_header = GptHeader::primary(disk_guid(rng));
    primary_header.last_usable_lba = last_usable_lba;
    primary_header.entry_count = entry_count;
    primary_header.entry_array_crc32 = entry_array_crc;

    let mut backup_header = GptHeader::backup(primary_header.disk_guid);
    backup_header.last_usable_lba = last_usable_lba;
    backup_header.entry_count = entry_count;
    backup_header.entry_array_crc32 = entry_array_crc;

    let protective_mbr = build_protective_mbr(config.instructions.disk_signature);

    let primary_header_bytes = primary_header.to_bytes()?;
    let backup_header_bytes = backup_header.to_bytes()?;

    let mut primary_gpt = Vec::with_capacity(PRIMARY_GPT_SECTORS as usize * record::SECTOR_SIZE);
    primary_gpt.extend_from_slice(&pad_to_sector(&primary_header_bytes));
    primary_gpt.extend_from_slice(&entry_array);

    let mut backup_gpt = Vec::with_capacity(SECONDARY_GPT_SECTORS as usize * record::SECTOR_SIZE);
    backup_gpt.extend_from_slice(&entry_array);
    backup_gpt.extend_from_slice(&pad_to_sector(&backup_header_bytes));

    let mut both = Vec::with_capacity(protective_mbr.len() + primary_gpt.len() + backup_gpt.len());
    both.extend_from_slice(&protective_mbr);
    both.extend_from_slice(&primary_gpt);
    both.extend_from_slice(&backup_gpt);

    let mut main = Vec::with_capacity(protective_mbr.len() + primary_gpt.len());
    main.extend_from_slice(&protective_mbr);
    main.extend_from_slice(&primary_gpt);

    log::info!(
        "gpt header crc32=0x{:08X} entry array crc32=0x{:08X} entry_count={}",
        u32::from_le_bytes(primary_header_bytes[16..20].try_into().unwrap()),
        entry_array_crc,
        entry_count
    );

    Ok(GptImages { both, main, backup: backup_gpt })
}

fn quantize_entry_count(raw_count: u32) -> u32 {
    let rounded = ((raw_count + 3) / 4) * 4;
    rounded.max(MIN_ENTRY_COUNT)
}

fn disk_guid(rng: &mut impl Rng) -> Guid {
    Guid::random_with(rng)
}

#[allow(clippy::too_many_arguments)]
fn plan_entries(
    partitions: &[Partition],
    auto_grow_last: bool,
    kb_per_bulk: u64,
    sectors_per_bulk: u64,
    tracker: &mut WriteProtectTracker,
    options: GptOptions,
    rng: &mut impl Rng,
) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(partitions.len());
    let mut first_lba = FIRST_PARTITION_LBA;

    for (i, part) in partitions.iter().enumerate() {
        let last_chunk_end = tracker.last_chunk().end_sector;
        let till_next_bulk = if kb_per_bulk > 0 {
            sectors_till_next_bulk(first_lba, sectors_per_bulk)
        } else {
            0
        };

        if part.flags.readonly {
            if first_lba > last_chunk_end {
                first_lba += till_next_bulk;
            }
            tracker.update(first_lba, part.size_in_sec, sectors_per_bulk);
        } else if first_lba <= last_chunk_end {
            first_lba += till_next_bulk;
        }

        let is_last = i + 1 == partitions.len();
        let size_in_sec = if is_last && auto_grow_last { 0 } else { part.size_in_sec };

        let last_lba = first_lba + size_in_sec - 1;

        let unique_guid = if options.sequential_guid {
            Guid::sequential(i as u64 + 1)
        } else if let Some(explicit) = part.unique_guid {
            explicit
        } else {
            Guid::random_with(rng)
        };

        let type_guid = match part.type_id {
            TypeId::Gpt(guid) => guid,
            TypeId::Mbr(_) => unreachable!("orchestrator enforces uniform GPT table type"),
        };

        entries.push(Entry {
            type_guid,
            unique_guid,
            first_lba,
            last_lba,
            attributes: part.flags.gpt_attributes(),
            label: part.label.clone(),
        });

        first_lba = last_lba + 1;
    }

    entries
}

fn serialize_entry_array(entries: &[Entry]) -> Vec<u8> {
    let mut buf = vec![0u8; ENTRY_ARRAY_BYTES];
    for (i, entry) in entries.iter().enumerate() {
        let offset = i * entry::ENTRY_SIZE;
        buf[offset..offset + entry::ENTRY_SIZE].copy_from_slice(&entry.to_bytes());
    }
    buf
}

fn pad_to_sector(header_bytes: &[u8]) -> Vec<u8> {
    let mut sector = vec![0u8; record::SECTOR_SIZE];
    sector[..header_bytes.len()].copy_from_slice(header_bytes);
    sector
}

fn build_protective_mbr(disk_signature: u32) -> Vec<u8> {
    let entries = [MbrEntry::protective(), MbrEntry::default(), MbrEntry::default(), MbrEntry::default()];
    record::serialize_sector(None, disk_signature, &entries).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptimage_core::{Instructions, PartitionFlags};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn gpt_partition(label: &str, size_in_kb: u64, readonly: bool) -> Partition {
        Partition {
            label: label.to_string(),
            first_lba_in_kb: 0,
            size_in_kb,
            size_in_sec: size_in_kb * 2,
            type_id: TypeId::Gpt(Guid::BASIC_DATA),
            unique_guid: None,
            flags: PartitionFlags { readonly, ..PartitionFlags::default() },
            filename: String::new(),
            sparse: String::new(),
        }
    }

    fn config(partitions: Vec<Partition>, instructions: Instructions) -> Configuration {
        Configuration { instructions, partitions }
    }

    #[test]
    fn single_writable_partition_no_auto_grow() {
        let cfg = config(
            vec![gpt_partition("system", 1024, false)],
            Instructions { write_protect_bulk_size_kb: 65536, ..Instructions::default() },
        );
        let mut rng = StdRng::seed_from_u64(1);
        let images = build(&cfg, GptOptions::default(), &mut rng).unwrap();
        assert_eq!(images.main.len(), PRIMARY_GPT_SECTORS as usize * 512 + 512);
        assert_eq!(images.backup.len(), SECONDARY_GPT_SECTORS as usize * 512);

        let entry_bytes = &images.main[512 + 512..512 + 512 + entry::ENTRY_SIZE];
        let first_lba = u64::from_le_bytes(entry_bytes[32..40].try_into().unwrap());
        let last_lba = u64::from_le_bytes(entry_bytes[40..48].try_into().unwrap());
        assert_eq!(first_lba, 34);
        assert_eq!(last_lba, 2081);
    }

    #[test]
    fn readonly_alignment_rounds_up_to_bulk_boundary() {
        let cfg = config(
            vec![
                gpt_partition("ro1", 64, true),
                gpt_partition("ro2", 64, true),
            ],
            Instructions { write_protect_bulk_size_kb: 64, write_protect_gpt: true, ..Instructions::default() },
        );
        let mut rng = StdRng::seed_from_u64(1);
        let images = build(&cfg, GptOptions::default(), &mut rng).unwrap();

        let entry1 = &images.main[1024..1024 + entry::ENTRY_SIZE];
        let entry2 = &images.main[1024 + entry::ENTRY_SIZE..1024 + 2 * entry::ENTRY_SIZE];
        let first1 = u64::from_le_bytes(entry1[32..40].try_into().unwrap());
        let first2 = u64::from_le_bytes(entry2[32..40].try_into().unwrap());
        assert_eq!(first1, 128);
        assert_eq!(first2, 256);
    }

    #[test]
    fn auto_grow_last_zeroes_size_and_last_usable_lba() {
        let cfg = config(
            vec![
                gpt_partition("a", 64, false),
                gpt_partition("b", 64, false),
            ],
            Instructions { auto_grow_last_partition: true, ..Instructions::default() },
        );
        let mut rng = StdRng::seed_from_u64(1);
        let images = build(&cfg, GptOptions::default(), &mut rng).unwrap();
        let header_bytes = &images.main[512..512 + header::HEADER_SIZE as usize];
        let last_usable = u64::from_le_bytes(header_bytes[48..56].try_into().unwrap());
        assert_eq!(last_usable, 0);

        let entry2 = &images.main[1024 + entry::ENTRY_SIZE..1024 + 2 * entry::ENTRY_SIZE];
        let first2 = u64::from_le_bytes(entry2[32..40].try_into().unwrap());
        let last2 = u64::from_le_bytes(entry2[40..48].try_into().unwrap());
        assert_eq!(last2, first2 - 1);
    }

    #[test]
    fn all_128_partitions_forces_entry_count() {
        let cfg = config(
            vec![
                gpt_partition("a", 64, false),
                gpt_partition("b", 64, false),
                gpt_partition("c", 64, false),
            ],
            Instructions::default(),
        );
        let mut rng = StdRng::seed_from_u64(1);
        let options = GptOptions { sequential_guid: true, all_128_partitions: true };
        let images = build(&cfg, options, &mut rng).unwrap();
        let header_bytes = &images.main[512..512 + header::HEADER_SIZE as usize];
        let entry_count = u32::from_le_bytes(header_bytes[80..84].try_into().unwrap());
        assert_eq!(entry_count, 128);

        let entry1 = &images.main[1024..1024 + entry::ENTRY_SIZE];
        let unique_guid = u128::from_le_bytes(entry1[16..32].try_into().unwrap());
        assert_eq!(unique_guid, 1);
    }

    #[test]
    fn rejects_more_than_128_entries() {
        let partitions: Vec<_> = (0..129).map(|i| gpt_partition(&format!("p{i}"), 1, false)).collect();
        let cfg = config(partitions, Instructions::default());
        let mut rng = StdRng::seed_from_u64(1);
        let err = build(&cfg, GptOptions::default(), &mut rng).unwrap_err();
        assert!(matches!(err, Error::Layout(LayoutError::TooManyEntries(129))));
    }

    #[test]
    fn rejects_zero_bulk_size() {
        let cfg = config(
            vec![gpt_partition("system", 1024, false)],
            Instructions { write_protect_bulk_size_kb: 0, ..Instructions::default() },
        );
        let mut rng = StdRng::seed_from_u64(1);
        let err = build(&cfg, GptOptions::default(), &mut rng).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ZeroBulkSize)));
    }

    #[test]
    fn both_is_main_plus_backup() {
        let cfg = config(vec![gpt_partition("system", 1024, false)], Instructions::default());
        let mut rng = StdRng::seed_from_u64(1);
        let images = build(&cfg, GptOptions::default(), &mut rng).unwrap();
        assert_eq!(images.both[..images.main.len()], images.main[..]);
        assert_eq!(images.both[images.both.len() - images.backup.len()..], images.backup[..]);
        assert_eq!(images.both.len(), images.main.len() + images.backup.len());
    }
}
