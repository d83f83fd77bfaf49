//! Phonetic index build.
//!
//! Streams every stored place through the encoders and rebuilds the
//! Beider-Morse, NYSIIS and Soundex indices. Runs with defaults when given no
//! arguments; exits non-zero if the build fails.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use placephone::config::{Config, MalformedPolicy};
use placephone::{IndexBuildPipeline, IndexStore};

#[derive(Parser, Debug)]
#[command(name = "encode")]
#[command(about = "Build the phonetic code indices from the place store")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// sled database directory (overrides config)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Places per committed batch (overrides config)
    #[arg(long)]
    batch_size: Option<usize>,

    /// What to do with malformed records (overrides config)
    #[arg(long, value_enum)]
    malformed_policy: Option<MalformedPolicy>,

    /// Refuse to build over existing indices instead of truncating them
    #[arg(long)]
    no_truncate: bool,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(path) = args.store {
        config.store.path = path;
    }
    if let Some(batch_size) = args.batch_size {
        config.build.batch_size = batch_size;
    }
    if let Some(policy) = args.malformed_policy {
        config.build.malformed_policy = policy;
    }
    if args.no_truncate {
        config.build.truncate_before_build = false;
    }

    info!("Placephone Index Build");
    info!("Store: {}", config.store.path.display());

    let store = IndexStore::open_config(&config.store).context("Failed to open place store")?;
    let total = store.place_count() as u64;
    info!("Places in store: {}", total);

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let summary = IndexBuildPipeline::new(&store, &store, config.build)
        .with_progress(pb)
        .run()
        .context("Index build failed")?;

    summary.log();
    info!(
        "Processed {} places: {} Beider-Morse, {} NYSIIS, {} Soundex codes ({} without Soundex, {} malformed)",
        summary.places_processed,
        summary.codes.beider_morse,
        summary.codes.nysiis,
        summary.codes.soundex,
        summary.skipped_soundex,
        summary.malformed_records
    );

    Ok(())
}
