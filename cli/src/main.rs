use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ptimage_builder::{orchestrator, GptOptions};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser)]
#[command(name = "ptimage")]
#[command(about = "Builds MBR/EBR or GPT partition-table images from a declarative XML layout", long_about = None)]
struct Cli {
    /// Path to the layout XML.
    xml: PathBuf,

    /// Directory artifacts are written into.
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Optional boot code file (440 or 446 bytes), MBR only.
    #[arg(long)]
    boot_code: Option<PathBuf>,

    /// Assign unique GUIDs sequentially (1, 2, 3, ...) instead of random.
    #[arg(long)]
    sequential_guid: bool,

    /// Always size the GPT entry array to 128 entries.
    #[arg(long)]
    all_128_partitions: bool,

    /// Seed the RNG for deterministic, reproducible runs.
    #[arg(long)]
    rng_seed: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let xml = tokio::fs::read_to_string(&cli.xml).await?;

    let options = GptOptions {
        sequential_guid: cli.sequential_guid,
        all_128_partitions: cli.all_128_partitions,
    };
    let boot_code_path = cli.boot_code.clone();
    let output_dir = cli.output.clone();
    let rng_seed = cli.rng_seed;

    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let artifacts = orchestrator::run(&xml, boot_code_path.as_deref(), options, &mut rng)?;
        for warning in &artifacts.warnings {
            log::warn!("{warning}");
        }

        std::fs::create_dir_all(&output_dir)?;
        orchestrator::write_artifacts(&output_dir, &artifacts)?;

        for (name, _) in &artifacts.files {
            log::info!("wrote {}", output_dir.join(name).display());
        }
        Ok(())
    })
    .await??;

    Ok(())
}
