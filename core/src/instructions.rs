/// Process-wide configuration parsed from the `<parser_instructions>` text
/// body. Threaded explicitly through the planner and serializers rather
/// than shared as mutable global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instructions {
    pub write_protect_bulk_size_kb: u64,
    pub write_protect_gpt: bool,
    pub sector_size_bytes: u64,
    pub auto_grow_last_partition: bool,
    pub disk_signature: u32,
}

impl Default for Instructions {
    fn default() -> Self {
        Self {
            write_protect_bulk_size_kb: 65536,
            write_protect_gpt: false,
            sector_size_bytes: 512,
            auto_grow_last_partition: false,
            disk_signature: 0,
        }
    }
}

impl Instructions {
    pub fn sectors_per_bulk(&self) -> u64 {
        self.write_protect_bulk_size_kb * 1024 / self.sector_size_bytes
    }

    /// `KEY=VALUE` pairs, whitespace separated, exactly as the
    /// `<parser_instructions>` text body is written. Unknown keys and
    /// malformed expressions are collected as warnings rather than
    /// aborting the decode.
    pub fn parse_text(text: &str) -> (Instructions, Vec<String>) {
        let mut instructions = Instructions::default();
        let mut warnings = Vec::new();

        for token in text.split_whitespace() {
            let mut parts = token.splitn(2, '=');
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                warnings.push(format!("invalid expression \"{token}\""));
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "WRITE_PROTECT_BULK_SIZE_IN_KB" => match value.parse() {
                    Ok(v) => instructions.write_protect_bulk_size_kb = v,
                    Err(_) => warnings.push(format!("invalid integer \"{value}\" for {key}")),
                },
                "WRITE_PROTECT_GPT" => instructions.write_protect_gpt = str2bool(value),
                "SECTOR_SIZE_IN_BYTES" => match value.parse() {
                    Ok(v) => instructions.sector_size_bytes = v,
                    Err(_) => warnings.push(format!("invalid integer \"{value}\" for {key}")),
                },
                "AUTO_GROW_LAST_PARTITION" => {
                    instructions.auto_grow_last_partition = str2bool(value)
                }
                "DISK_SIGNATURE" => {
                    let hex = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
                    match u32::from_str_radix(hex, 16) {
                        Ok(v) => instructions.disk_signature = v,
                        Err(_) => warnings.push(format!("invalid hex value \"{value}\" for {key}")),
                    }
                }
                _ => warnings.push(format!("unknown instruction key \"{key}\"")),
            }
        }

        (instructions, warnings)
    }
}

fn str2bool(s: &str) -> bool {
    s.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let i = Instructions::default();
        assert_eq!(i.write_protect_bulk_size_kb, 65536);
        assert!(!i.write_protect_gpt);
        assert_eq!(i.sector_size_bytes, 512);
        assert!(!i.auto_grow_last_partition);
        assert_eq!(i.disk_signature, 0);
    }

    #[test]
    fn parses_recognized_keys() {
        let (i, warnings) = Instructions::parse_text(
            "WRITE_PROTECT_BULK_SIZE_IN_KB=65536 WRITE_PROTECT_GPT=true \
             SECTOR_SIZE_IN_BYTES=512 AUTO_GROW_LAST_PARTITION=false \
             DISK_SIGNATURE=0xDEADBEEF",
        );
        assert!(warnings.is_empty());
        assert_eq!(i.write_protect_bulk_size_kb, 65536);
        assert!(i.write_protect_gpt);
        assert_eq!(i.sector_size_bytes, 512);
        assert!(!i.auto_grow_last_partition);
        assert_eq!(i.disk_signature, 0xDEADBEEF);
    }

    #[test]
    fn unknown_key_warns_without_aborting() {
        let (i, warnings) = Instructions::parse_text("FOO=bar SECTOR_SIZE_IN_BYTES=4096");
        assert_eq!(i.sector_size_bytes, 4096);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("FOO"));
    }

    #[test]
    fn sectors_per_bulk_computes_from_kb() {
        let i = Instructions {
            write_protect_bulk_size_kb: 64,
            sector_size_bytes: 512,
            ..Instructions::default()
        };
        assert_eq!(i.sectors_per_bulk(), 128);
    }
}
