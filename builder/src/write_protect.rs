//! Write-protect chunk tracker: a monotonic, coalesced list of protected
//! sector ranges, grown as read-only partitions are laid down. Grounded in
//! `original_source/pt.py::Partitions.{__init__,update_wp_chunk_list}`.

/// A contiguous, bulk-aligned range of sectors marked read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteProtectChunk {
    pub start_sector: u64,
    pub end_sector: u64,
    pub num_sectors: u64,
    pub start_bulk: u64,
    pub num_bulk: u64,
}

impl WriteProtectChunk {
    fn zero() -> Self {
        WriteProtectChunk {
            start_sector: 0,
            end_sector: 0,
            num_sectors: 0,
            start_bulk: 0,
            num_bulk: 0,
        }
    }
}

/// Tracks the ordered, non-overlapping list of write-protect chunks as
/// partitions are assigned LBA ranges.
#[derive(Debug, Clone)]
pub struct WriteProtectTracker {
    chunks: Vec<WriteProtectChunk>,
}

impl WriteProtectTracker {
    /// A fresh tracker seeded with a single zero chunk. When GPT write
    /// protection is enabled with a nonzero bulk size, the caller should
    /// follow up with [`Self::preprotect_first_bulk`] to cover sectors
    /// `0..sectors_per_bulk` up front.
    pub fn new() -> Self {
        WriteProtectTracker {
            chunks: vec![WriteProtectChunk::zero()],
        }
    }

    /// Pre-populates the initial chunk to cover the first write-protect
    /// bulk, as the GPT path does when `write_protect_gpt` is set.
    pub fn preprotect_first_bulk(&mut self, sectors_per_bulk: u64) {
        let first = &mut self.chunks[0];
        first.start_sector = 0;
        first.end_sector = sectors_per_bulk - 1;
        first.num_sectors = sectors_per_bulk;
        first.start_bulk = first.start_sector / sectors_per_bulk;
        first.num_bulk = first.num_sectors / sectors_per_bulk;
    }

    pub fn chunks(&self) -> &[WriteProtectChunk] {
        &self.chunks
    }

    pub fn last_chunk(&self) -> &WriteProtectChunk {
        self.chunks.last().expect("always seeded with one chunk")
    }

    /// Extends the last chunk or appends a new one to cover
    /// `[start_sector_1based - 1, start_sector_1based + size_sectors - 1]`,
    /// growing by whole bulks and never shrinking or overlapping existing
    /// chunks.
    pub fn update(&mut self, start_sector_1based: u64, size_sectors: u64, sectors_per_bulk: u64) {
        let s = start_sector_1based - 1;
        let e = start_sector_1based + size_sectors - 1;

        let last = self.chunks.last_mut().expect("always seeded with one chunk");
        if s <= last.end_sector {
            while last.end_sector < e {
                last.end_sector += sectors_per_bulk;
                last.num_sectors += sectors_per_bulk;
            }
            last.num_bulk = last.num_sectors / sectors_per_bulk;
        } else {
            let mut chunk = WriteProtectChunk {
                start_sector: start_sector_1based,
                end_sector: start_sector_1based + sectors_per_bulk - 1,
                num_sectors: sectors_per_bulk,
                start_bulk: 0,
                num_bulk: 0,
            };
            while chunk.end_sector < e {
                chunk.end_sector += sectors_per_bulk;
                chunk.num_sectors += sectors_per_bulk;
            }
            chunk.start_bulk = chunk.start_sector / sectors_per_bulk;
            chunk.num_bulk = chunk.num_sectors / sectors_per_bulk;
            self.chunks.push(chunk);
        }
    }
}

impl Default for WriteProtectTracker {
    fn default() -> Self {
        Self::new()
    }
}
