use crate::ConfigError;

/// A 128-bit GUID stored as the exact integer that gets LE-serialized on
/// disk (see the module doc on `Entry` for why this isn't a big-endian
/// "natural" GUID value).
///
/// Two wire encodings feed into this value:
///
/// - the 32-hex-digit `0x...` form, a single big-endian 128-bit number read
///   verbatim from the hex digits;
/// - the dashed `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form, whose first
///   three fields are little-endian and whose last two fields are raw byte
///   sequences — the standard mixed-endian GUID wire format.
///
/// Either way, `Guid::to_le_bytes` is what actually lands in the on-disk
/// entry; no further byte-swapping happens at serialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(pub u128);

impl Guid {
    /// Fallback GPT "Basic data" partition type GUID used by the original
    /// tool when a type string parses as neither GUID form.
    pub const BASIC_DATA: Guid = Guid(0xC79926B7B668C0874433B9E5EBD0A0A2);

    pub fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    pub fn random_with<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        Guid(rng.gen::<u128>())
    }

    /// Sequential mode: the ordinal index (1-based) used as a deterministic
    /// stand-in for a random unique GUID.
    pub fn sequential(ordinal: u64) -> Self {
        Guid(ordinal as u128)
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            if hex.len() == 32 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return u128::from_str_radix(hex, 16)
                    .map(Guid)
                    .map_err(|_| ConfigError::InvalidGuid(s.to_string()));
            }
        }
        Self::parse_dashed(s).ok_or_else(|| ConfigError::InvalidGuid(s.to_string()))
    }

    fn parse_dashed(s: &str) -> Option<Guid> {
        let groups: Vec<&str> = s.split('-').collect();
        let [g0, g1, g2, g3, g4] = groups[..] else {
            return None;
        };
        if g0.len() != 8 || g1.len() != 4 || g2.len() != 4 || g3.len() != 4 || g4.len() != 12 {
            return None;
        }

        let d1 = u32::from_str_radix(g0, 16).ok()?;
        let d2 = u16::from_str_radix(g1, 16).ok()?;
        let d3 = u16::from_str_radix(g2, 16).ok()?;

        let tail: String = format!("{g3}{g4}");
        let mut d4 = [0u8; 8];
        for (i, slot) in d4.iter_mut().enumerate() {
            *slot = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16).ok()?;
        }

        let mut value: u128 = d1 as u128;
        value |= (d2 as u128) << 32;
        value |= (d3 as u128) << 48;
        for (k, byte) in d4.iter().enumerate() {
            value |= (*byte as u128) << (64 + 8 * k);
        }

        Some(Guid(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_hex32_form() {
        let err = Guid::parse("0x0FC63DAF84834772").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGuid(_)));
    }

    #[test]
    fn hex32_roundtrips_as_big_endian_reading() {
        let g = Guid::parse("0xC79926B7B668C0874433B9E5EBD0A0A2").unwrap();
        assert_eq!(g.0, 0xC79926B7B668C0874433B9E5EBD0A0A2u128);
        assert_eq!(g, Guid::BASIC_DATA);
    }

    #[test]
    fn dashed_form_is_mixed_endian() {
        // EFI System Partition GUID, canonical text form.
        let g = Guid::parse("C12A7328-F81F-11D2-BA4B-00A0C93EC93B").unwrap();
        let bytes = g.to_le_bytes();
        // data1 = 0xC12A7328 written little-endian as the first 4 bytes.
        assert_eq!(&bytes[0..4], &[0x28, 0x73, 0x2A, 0xC1]);
        // data2 = 0xF81F little-endian.
        assert_eq!(&bytes[4..6], &[0x1F, 0xF8]);
        // data3 = 0x11D2 little-endian.
        assert_eq!(&bytes[6..8], &[0xD2, 0x11]);
        // data4 bytes are copied verbatim, not swapped.
        assert_eq!(&bytes[8..16], &[0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E, 0xC9, 0x3B]);
    }

    #[test]
    fn rejects_malformed_dashed_guid() {
        assert!(Guid::parse("not-a-guid").is_err());
        assert!(Guid::parse("C12A7328-F81F-11D2-BA4B").is_err());
    }
}
