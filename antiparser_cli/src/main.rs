use antiparser_core::config::AntiparserConfig;
use antiparser_core::snapshot::{export_snapshot, import_snapshot};
use antiparser_core::store::{SnapshotStore, write_payload};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Log every mutation and payload rebuild
    #[clap(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate payloads from a TOML template
    Generate {
        #[clap(short, long, value_parser)]
        config: PathBuf,
        #[clap(short, long)]
        iterations: Option<u64>,
        #[clap(short, long)]
        seed: Option<u64>,
        #[clap(short, long, value_parser)]
        output_dir: Option<PathBuf>,
        /// Save a snapshot of every iteration into this directory
        #[clap(long, value_parser)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Write the payload recorded in a stored snapshot
    Replay {
        #[clap(long, value_parser)]
        snapshot_dir: PathBuf,
        #[clap(long)]
        id: usize,
        #[clap(short, long, value_parser)]
        output: PathBuf,
    },
}

fn setup_logging(verbose: bool) -> Result<(), anyhow::Error> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Generate {
            config,
            iterations,
            seed,
            output_dir,
            snapshot_dir,
        } => {
            info!("Loading template from {config:?}");
            let mut config = AntiparserConfig::load_from_file(&config)?;
            if let Some(iterations) = iterations {
                config.generator.iterations = iterations;
            }
            if let Some(seed) = seed {
                config.generator.seed = seed;
            }
            if let Some(output_dir) = output_dir {
                config.generator.output_dir = output_dir;
            }
            if snapshot_dir.is_some() {
                config.generator.snapshot_dir = snapshot_dir;
            }
            debug!("Effective configuration: {config:#?}");
            generate(&config)
        }
        Commands::Replay {
            snapshot_dir,
            id,
            output,
        } => replay(snapshot_dir, id, output),
    }
}

fn generate(config: &AntiparserConfig) -> Result<(), anyhow::Error> {
    let settings = &config.generator;
    let mut container = config
        .build_container()
        .context("Failed to build container from template")?;
    container.log_objects();

    let mut store = match &settings.snapshot_dir {
        Some(dir) => Some(SnapshotStore::open(dir.clone())?),
        None => None,
    };

    info!(
        objects = container.len(),
        iterations = settings.iterations,
        seed = settings.seed,
        "Starting payload generation"
    );
    let start_time = Instant::now();
    let mut bytes_written = 0usize;

    for iteration in 0..settings.iterations {
        if settings.shuffle {
            container.shuffle()?;
        }
        container.permute()?;

        let payload = container.payload();
        let digest = format!("{:x}", md5::compute(payload));
        let path = settings
            .output_dir
            .join(format!("payload_{iteration:06}_{digest}.bin"));
        write_payload(&path, payload)?;
        bytes_written += payload.len();

        if let Some(store) = store.as_mut() {
            let id = store.save(
                &export_snapshot(&container),
                &format!("iteration {iteration}"),
            )?;
            debug!(iteration, snapshot = id, "snapshot stored");
        }

        debug!(iteration, len = payload.len(), path = ?path, "payload generated");
    }

    let elapsed = start_time.elapsed();
    info!(
        payloads = settings.iterations,
        bytes = bytes_written,
        "Generation finished in {elapsed:.2?}"
    );
    println!(
        "Wrote {} payloads ({} bytes) to {:?}",
        settings.iterations, bytes_written, settings.output_dir
    );
    Ok(())
}

fn replay(snapshot_dir: PathBuf, id: usize, output: PathBuf) -> Result<(), anyhow::Error> {
    let store = SnapshotStore::open(snapshot_dir)?;
    let snapshot = store.load(id)?;
    let container = import_snapshot(snapshot, ChaCha8Rng::seed_from_u64(0))
        .with_context(|| format!("Snapshot {id} does not describe a valid container"))?;
    container.log_objects();
    write_payload(&output, container.payload())?;
    info!(id, len = container.payload().len(), "Replayed snapshot to {output:?}");
    Ok(())
}
