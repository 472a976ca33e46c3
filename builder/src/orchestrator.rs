//! Ties decode → plan → serialize → write into the single linear pipeline
//! spec'd for the core: parse XML, determine table type from the
//! partitions' type tags, dispatch to the GPT or MBR path, and emit fixed-
//! name artifacts. Grounded in `original_source/parser.py::xml2object` plus
//! `gpt.py`/`mbr.py`'s respective `create()` entry points.

use std::path::Path;

use ptimage_core::{ConfigError, Error, ImageError, TableType};
use rand::Rng;

use crate::gpt::GptOptions;

/// One output artifact: its fixed on-disk filename and serialized bytes.
#[derive(Debug)]
pub struct Artifacts {
    pub files: Vec<(&'static str, Vec<u8>)>,
    pub warnings: Vec<String>,
}

pub fn run(
    xml: &str,
    boot_code_path: Option<&Path>,
    options: GptOptions,
    rng: &mut impl Rng,
) -> Result<Artifacts, Error> {
    let decoded = crate::xml::decode(xml)?;
    let config = decoded.configuration;
    let table_type = config.table_type()?;

    let files = match table_type {
        TableType::Gpt => {
            let images = crate::gpt::build(&config, options, rng)?;
            vec![
                ("gpt_both.bin", images.both),
                ("gpt_main.bin", images.main),
                ("gpt_backup.bin", images.backup),
            ]
        }
        TableType::Mbr => {
            let boot_code = boot_code_path.map(crate::mbr::read_boot_code).transpose()?;
            let images = crate::mbr::build(&config, boot_code.as_deref())?;
            let mut files = vec![("MBR.bin", images.mbr)];
            if let Some(ebr) = images.ebr {
                files.push(("EBR.bin", ebr));
            }
            files
        }
    };

    Ok(Artifacts { files, warnings: decoded.warnings })
}

/// Writes every artifact into `output_dir`, each file descriptor opened
/// and closed within its own emission so a mid-run failure leaves no
/// artifact half-written across invocations.
pub fn write_artifacts(output_dir: &Path, artifacts: &Artifacts) -> Result<(), Error> {
    for (name, bytes) in &artifacts.files {
        let path = output_dir.join(name);
        std::fs::write(&path, bytes).map_err(|source| ImageError::Write {
            path: path.display().to_string(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn dispatches_to_gpt_path() {
        let xml = r#"<data><physical_partition>
            <partition label="system" size_in_kb="1024" type="0xC79926B7B668C0874433B9E5EBD0A0A2"/>
        </physical_partition></data>"#;
        let mut rng = StdRng::seed_from_u64(1);
        let artifacts = run(xml, None, GptOptions::default(), &mut rng).unwrap();
        let names: Vec<_> = artifacts.files.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["gpt_both.bin", "gpt_main.bin", "gpt_backup.bin"]);
    }

    #[test]
    fn dispatches_to_mbr_path_without_ebr() {
        let xml = r#"<data><physical_partition>
            <partition label="boot" size_in_kb="1024" type="0x83"/>
        </physical_partition></data>"#;
        let mut rng = StdRng::seed_from_u64(1);
        let artifacts = run(xml, None, GptOptions::default(), &mut rng).unwrap();
        let names: Vec<_> = artifacts.files.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["MBR.bin"]);
    }

    #[test]
    fn rejects_zero_bulk_size_instead_of_hanging() {
        let xml = r#"<data>
            <parser_instructions>WRITE_PROTECT_BULK_SIZE_IN_KB=0</parser_instructions>
            <physical_partition>
                <partition label="boot" size_in_kb="1024" type="0x83"/>
            </physical_partition>
        </data>"#;
        let mut rng = StdRng::seed_from_u64(1);
        let err = run(xml, None, GptOptions::default(), &mut rng).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ZeroBulkSize)));
    }

    #[test]
    fn writes_files_to_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"<data><physical_partition>
            <partition label="boot" size_in_kb="1024" type="0x83"/>
        </physical_partition></data>"#;
        let mut rng = StdRng::seed_from_u64(1);
        let artifacts = run(xml, None, GptOptions::default(), &mut rng).unwrap();
        write_artifacts(dir.path(), &artifacts).unwrap();
        assert!(dir.path().join("MBR.bin").exists());
    }
}
