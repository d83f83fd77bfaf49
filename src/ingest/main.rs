//! GeoNames gazetteer ingest.
//!
//! Loads one or more GeoNames dump files into the place store, optionally
//! building the phonetic indices afterwards.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use placephone::config::{Config, MalformedPolicy};
use placephone::gazetteer::load_into;
use placephone::{IndexBuildPipeline, IndexStore};

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Load GeoNames gazetteer files into the place store")]
struct Args {
    /// GeoNames dump files (.txt or .txt.gz)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// sled database directory (overrides config)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Places per insert batch (overrides config)
    #[arg(long)]
    batch_size: Option<usize>,

    /// What to do with malformed lines (overrides config)
    #[arg(long, value_enum)]
    malformed_policy: Option<MalformedPolicy>,

    /// Build the phonetic indices once loading finishes
    #[arg(long)]
    build: bool,
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
        config.ingest.batch_size = batch_size;
    }
    if let Some(policy) = args.malformed_policy {
        config.ingest.malformed_policy = policy;
    }

    info!("Placephone Gazetteer Ingest");
    info!("Store: {}", config.store.path.display());

    let store = IndexStore::open_config(&config.store).context("Failed to open place store")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Loading {} file(s)", args.files.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let summary = load_into(&store, &args.files, &config.ingest);
    spinner.finish_and_clear();
    let summary = summary.context("Gazetteer ingest failed")?;

    info!(
        "Inserted {} places from {} file(s), {} malformed lines skipped",
        summary.inserted, summary.files, summary.malformed
    );
    info!("Total places in store: {}", store.place_count());

    if args.build {
        info!("Building phonetic indices...");
        let build = IndexBuildPipeline::new(&store, &store, config.build.clone())
            .run()
            .context("Index build failed")?;
        build.log();
    }

    Ok(())
}
