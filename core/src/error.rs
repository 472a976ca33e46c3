use thiserror::Error;

/// Everything that can go wrong turning a [`Configuration`](crate::Configuration)
/// into on-disk partition table bytes.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Errors raised while decoding the XML configuration into a [`Configuration`](crate::Configuration).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate tag <{0}>, only one is allowed")]
    DuplicateSingleton(&'static str),

    #[error("partition \"{0}\" mixes MBR and GPT type tags")]
    MixedPartitionType(String),

    #[error("partition has neither an MBR type nor a GPT type")]
    MissingPartitionType,

    #[error("unknown attribute \"{0}\" on <partition>")]
    UnknownPartitionAttribute(String),

    #[error("invalid GUID format: \"{0}\"")]
    InvalidGuid(String),

    #[error("invalid type attribute: \"{0}\"")]
    InvalidType(String),

    #[error("label \"EXT\" is a reserved legacy sentinel and cannot be used")]
    ReservedLabel,

    #[error("<physical_partition> contained no partitions")]
    EmptyPartitionList,

    #[error("write-protect bulk size resolves to zero sectors; check WRITE_PROTECT_BULK_SIZE_IN_KB and SECTOR_SIZE_IN_BYTES")]
    ZeroBulkSize,

    #[error("malformed XML: {0}")]
    Xml(String),
}

/// Errors raised while planning LBA ranges or serializing partition tables.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("GPT entry count {0} exceeds the maximum of 128")]
    TooManyEntries(u32),

    /// Named by the taxonomy to mirror the MBR cursor invariant, but not
    /// currently constructed: `mbr::plan_primary`'s clamp
    /// (`if first_lba < last_lba { first_lba = last_lba }`) always
    /// resolves a below-cursor `first_lba_in_kb` pin forward instead of
    /// rejecting it, so this condition can't occur with the current
    /// planner. Kept for a future stricter mode that treats the pin as a
    /// hard requirement rather than a suggestion.
    #[error("partition \"{label}\" starts at LBA {requested}, below the current cursor {cursor}")]
    StartBelowCursor {
        label: String,
        requested: u64,
        cursor: u64,
    },

    /// Raised by `GptHeader::to_bytes` if the serialized buffer isn't
    /// exactly the 92-byte header size before the CRC is computed over it.
    #[error("CRC input length mismatch: expected {expected}, got {actual}")]
    CrcLengthMismatch { expected: usize, actual: usize },

    #[error("EBR chain is malformed: {0}")]
    EbrChainInvalid(String),
}

/// Errors raised while reading ancillary inputs or writing output artifacts.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("boot code file must be exactly 440 or 446 bytes, got {0}")]
    InvalidBootCode(u64),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
