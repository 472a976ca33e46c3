//! XML decoder: walks the same three singleton tags plus repeated
//! `<partition>` elements that `original_source/parser.py::xml2object`
//! walks via `ElementTree.getiterator()`, using `quick-xml`'s pull reader
//! instead. Grounded in `parser.py` and `pt.py::Partition.items2expr`.

use ptimage_core::{Configuration, ConfigError, Error, Guid, Instructions, Partition, PartitionFlags, TypeId};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A decoded configuration plus any non-fatal anomalies collected along
/// the way (unknown instruction keys, empty `<partition/>` tags skipped).
#[derive(Debug)]
pub struct DecodeResult {
    pub configuration: Configuration,
    pub warnings: Vec<String>,
}

pub fn decode(xml: &str) -> Result<DecodeResult, Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut warnings = Vec::new();
    let mut instructions = Instructions::default();
    let mut partitions = Vec::new();

    let mut config_count = 0u32;
    let mut instructions_count = 0u32;
    let mut phys_part_count = 0u32;
    let mut awaiting_instructions_text = false;

    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ConfigError::Xml(e.to_string()))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"configuration" => {
                        config_count += 1;
                        if config_count > 1 {
                            return Err(ConfigError::DuplicateSingleton("configuration").into());
                        }
                    }
                    b"parser_instructions" => {
                        instructions_count += 1;
                        if instructions_count > 1 {
                            return Err(ConfigError::DuplicateSingleton("parser_instructions").into());
                        }
                        awaiting_instructions_text = !is_empty;
                    }
                    b"physical_partition" => {
                        phys_part_count += 1;
                        if phys_part_count > 1 {
                            return Err(ConfigError::DuplicateSingleton("physical_partition").into());
                        }
                    }
                    b"partition" => {
                        if let Some(partition) = decode_partition(e)? {
                            partitions.push(partition);
                        } else {
                            log::info!("empty <partition> tag skipped");
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if awaiting_instructions_text {
                    let text = t.unescape().map_err(|e| ConfigError::Xml(e.to_string()))?;
                    let (parsed, mut instr_warnings) = Instructions::parse_text(&text);
                    instructions = parsed;
                    warnings.append(&mut instr_warnings);
                }
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == b"parser_instructions" {
                    awaiting_instructions_text = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    for partition in &mut partitions {
        partition.recompute_size_in_sec(instructions.sector_size_bytes);
    }

    Ok(DecodeResult {
        configuration: Configuration { instructions, partitions },
        warnings,
    })
}

fn decode_partition(start: &BytesStart) -> Result<Option<Partition>, Error> {
    let attrs: Vec<(String, String)> = start
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
            (key, value)
        })
        .collect();

    if attrs.is_empty() {
        return Ok(None);
    }

    let mut label = String::new();
    let mut first_lba_in_kb = 0u64;
    let mut size_in_kb = 0u64;
    let mut type_id: Option<TypeId> = None;
    let mut unique_guid = None;
    let mut flags = PartitionFlags::default();
    let mut filename = String::new();
    let mut sparse = String::new();

    for (key, value) in &attrs {
        match key.as_str() {
            "label" => label = value.clone(),
            "first_lba_in_kb" => first_lba_in_kb = value.parse().unwrap_or(0),
            "size_in_kb" => size_in_kb = value.parse().unwrap_or(0),
            "type" => type_id = Some(decode_type(value)?),
            "uniqueguid" if !value.is_empty() => unique_guid = Some(Guid::parse(value)?),
            "uniqueguid" => {}
            "bootable" => flags.bootable = str2bool(value),
            "readonly" => flags.readonly = str2bool(value),
            "hidden" => flags.hidden = str2bool(value),
            "dontautomount" => flags.dontautomount = str2bool(value),
            "system" => flags.system = str2bool(value),
            "filename" => filename = value.clone(),
            "sparse" => sparse = value.clone(),
            other => return Err(ConfigError::UnknownPartitionAttribute(other.to_string()).into()),
        }
    }

    if label == "EXT" {
        return Err(ConfigError::ReservedLabel.into());
    }

    let type_id = type_id.ok_or(ConfigError::MissingPartitionType)?;

    Ok(Some(Partition {
        label,
        first_lba_in_kb,
        size_in_kb,
        size_in_sec: 0, // recomputed once decoding finishes.
        type_id,
        unique_guid,
        flags,
        filename,
        sparse,
    }))
}

/// GPT is tried first (32-hex-digit `0x...` form or dashed), then MBR's
/// one-or-two hex digit form (with optional `0x` prefix).
fn decode_type(value: &str) -> Result<TypeId, ConfigError> {
    if let Ok(guid) = Guid::parse(value) {
        return Ok(TypeId::Gpt(guid));
    }
    if let Some(code) = parse_mbr_type(value) {
        return Ok(TypeId::Mbr(code));
    }
    Err(ConfigError::InvalidType(value.to_string()))
}

fn parse_mbr_type(value: &str) -> Option<u8> {
    let hex = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
    if hex.is_empty() || hex.len() > 2 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

fn str2bool(s: &str) -> bool {
    s.eq_ignore_ascii_case("true")
}
