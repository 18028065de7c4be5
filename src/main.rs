//! # Warming-dl CLI
//!
//! Command-line interface for the warming-dl library.
//! Downloads a catalog of climate datasets one after another and prints a
//! summary of each series as it arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, warn};
use warming_dl::{DownloadQueue, FetchConfig, Fetcher, HttpFetcher};

mod cli;

use cli::{Catalog, CatalogObserver, DatasetSource, FollowUpObserver, ProgressManager, Reporter, StepReport};

/// Command-line interface for warming-dl
#[derive(Parser)]
#[command(name = "warming-dl")]
#[command(about = "Sequential climate dataset downloader")]
#[command(long_about = "Downloads climate datasets one at a time, in catalog order:
  warming-dl                          # Built-in datasets (temperature, CO2, arctic ice)
  warming-dl --catalog my.catalog     # Datasets listed in a catalog file
  warming-dl --delay 500 --json       # Pause 500ms between downloads, JSON lines output

Catalog format, one dataset per line:
  title,headerRowsToSkip,valueColumn,labelColumn,colorHex,url[,primary]
  url may be follow:<page-url>|<host>|<pattern> to scrape the CSV link from a page")]
#[command(version = env!("WARMING_DL_VERSION"))]
struct Cli {
    /// Dataset catalog file (defaults to the built-in datasets)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Milliseconds to wait after each download before starting the next
    #[arg(short, long, default_value_t = 0)]
    delay: u64,

    /// Per-request timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Print one JSON object per line instead of text
    #[arg(long)]
    json: bool,

    /// Show what would be downloaded without downloading
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    if cli.verbose {
        eprintln!("🌡️  Warming-dl v{} starting...", env!("WARMING_DL_VERSION"));
    }

    if cli.timeout == 0 {
        bail!("--timeout must be at least 1 second");
    }

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => Catalog::builtin().context("loading built-in catalog")?,
    };

    if catalog.is_empty() {
        warn!("Catalog is empty, nothing to download");
    }

    if cli.dry_run {
        show_plan(&catalog);
        return Ok(());
    }

    let config = FetchConfig::with_timeout(Duration::from_secs(cli.timeout));
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::with_config(&config)?);

    let mut queue = DownloadQueue::with_fetcher(Arc::clone(&fetcher))
        .with_delay(Duration::from_millis(cli.delay));
    for dataset in catalog.iter() {
        queue.add(dataset.fetch_url());
    }

    let progress = if cli.json {
        ProgressManager::hidden()
    } else {
        ProgressManager::new(catalog.len() as u64, "Downloading data...")
    };
    let reporter = Reporter::new(cli.json, progress);

    let mut observer = CatalogObserver::new(&catalog, fetcher, &reporter);
    let summary = queue.run(&mut observer).await;
    debug_assert!(observer.is_completed(), "queue finished without completion signal");

    for pending in observer.into_follow_ups() {
        let mut follow = FollowUpObserver::new(pending.index, pending.dataset, &reporter);
        pending.events.dispatch_to(&mut follow).await?;
    }

    info!("Processed {} dataset(s)", summary.total);
    reporter.emit(&StepReport::Completed { summary });
    reporter.progress().finish("All data downloaded");

    Ok(())
}

/// List the datasets a real run would download
fn show_plan(catalog: &Catalog) {
    eprintln!("🔍 [DRY RUN] Would download {} dataset(s):", catalog.len());
    for (index, dataset) in catalog.iter().enumerate() {
        match &dataset.source {
            DatasetSource::Direct(url) => {
                eprintln!("  [{index}] {} <- {url}", dataset.title);
            }
            DatasetSource::FollowUp(follow) => {
                eprintln!(
                    "  [{index}] {} <- link matching '{}' on {}",
                    dataset.title, follow.pattern, follow.page_url
                );
            }
        }
    }
}
