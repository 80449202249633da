//! Motoscrape main entry point
//!
//! This is the command-line interface for the Motoscrape listing scraper.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use motoscrape::config::{load_config_with_hash, Config};
use motoscrape::crawler::{Progress, ProgressTracker, ScrapeCoordinator};
use motoscrape::output::{delimiter_byte, export_offers, print_summary};
use motoscrape::url::page_urls;
use motoscrape::ScrapeError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Motoscrape: scrape every offer of a vehicle listing
///
/// Resolves the number of listing pages, fetches them concurrently and
/// collects price, year, mileage, engine capacity, fuel type and region of
/// every offer. Pages that fail are reported, not fatal.
#[derive(Parser, Debug)]
#[command(name = "motoscrape")]
#[command(version)]
#[command(about = "Concurrent vehicle-listing scraper", long_about = None)]
struct Cli {
    /// Listing URL (page 1 of the search results)
    #[arg(value_name = "URL")]
    url: String,

    /// Write offers to this delimited file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Override the maximum number of concurrent page workers
    #[arg(short, long, value_name = "N")]
    workers: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resolve the page count and exit without scraping
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(workers) = cli.workers {
        anyhow::ensure!(workers >= 1, "--workers must be at least 1");
        config.scraper.max_workers = workers;
    }

    if cli.dry_run {
        handle_dry_run(&config, &cli.url).await
    } else {
        let output = cli
            .output
            .clone()
            .or_else(|| config.output.export_path.as_ref().map(PathBuf::from));
        handle_scrape(&config, &cli.url, output.as_deref(), cli.quiet).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("motoscrape=info,warn"),
            1 => EnvFilter::new("motoscrape=debug,info"),
            2 => EnvFilter::new("motoscrape=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: shows what would be scraped
async fn handle_dry_run(config: &Config, url: &str) -> Result<()> {
    let coordinator = ScrapeCoordinator::new(config)?;
    let pagination = coordinator.resolve(url).await?;
    let base = motoscrape::url::parse_base_url(url)?;

    println!("=== Motoscrape Dry Run ===\n");
    println!("Listing: {}", base);
    println!("  Pages: {}", pagination.page_count);
    println!("  Offers announced: {}", pagination.expected_offers);
    println!(
        "  Workers: {}",
        config
            .scraper
            .max_workers
            .min(pagination.page_count.saturating_sub(1))
    );

    println!("\nPage URLs:");
    let urls = page_urls(&base, pagination.page_count);
    for page in urls.iter().take(5) {
        println!("  * {}", page);
    }
    if urls.len() > 5 {
        println!("  ... and {} more", urls.len() - 5);
    }

    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(
    config: &Config,
    url: &str,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let delimiter = delimiter_byte(&config.output.delimiter)?;
    let mut coordinator = ScrapeCoordinator::new(config)?;

    tokio::spawn(cancel_on_ctrl_c(coordinator.cancellation_token()));

    // Hidden when stderr is not a terminal; progress is then logged instead
    let bar = (!quiet)
        .then(create_progress_bar)
        .filter(|bar| !bar.is_hidden());

    let ticker_stop = CancellationToken::new();
    let ticker = tokio::spawn(report_progress(
        coordinator.progress(),
        bar.clone(),
        ticker_stop.clone(),
    ));

    let result = coordinator.run(url).await;
    ticker_stop.cancel();
    if let Err(e) = ticker.await {
        tracing::debug!("Progress ticker failed: {}", e);
    }

    if let Some(bar) = &bar {
        update_bar(bar, coordinator.progress().snapshot());
        match &result {
            Ok(_) => bar.finish_with_message("done"),
            Err(ScrapeError::Cancelled { .. }) => bar.abandon_with_message("cancelled"),
            Err(_) => bar.abandon_with_message("failed"),
        }
    }

    match result {
        Ok(report) => {
            print_summary(&report);
            if let Some(path) = output {
                export_offers(path, &report.offers, delimiter)?;
                println!("Offers written to: {}", path.display());
            }
            Ok(())
        }
        Err(ScrapeError::Cancelled { partial }) => {
            tracing::warn!("Interrupted; {} offers were collected", partial.len());
            if let Some(path) = output {
                export_offers(path, &partial, delimiter)?;
                println!("Partial offers written to: {}", path.display());
            }
            anyhow::bail!("scrape cancelled after {} offers", partial.len())
        }
        Err(e) => Err(e).context("scrape failed"),
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Ctrl-C received, cancelling scrape");
        cancel.cancel();
    }
}

fn create_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.green/dim}] {pos}/{len} offers {msg}")
    {
        bar.set_style(
            style
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▓░"),
        );
    }
    bar
}

fn update_bar(bar: &ProgressBar, snapshot: Progress) {
    bar.set_length(snapshot.total.max(snapshot.processed));
    bar.set_position(snapshot.processed);
}

/// Drives the progress bar, or logs progress every second without one
async fn report_progress(
    progress: ProgressTracker,
    bar: Option<ProgressBar>,
    stop: CancellationToken,
) {
    let period = match &bar {
        Some(bar) => {
            bar.enable_steady_tick(Duration::from_millis(100));
            Duration::from_millis(200)
        }
        None => Duration::from_secs(1),
    };
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                let snapshot = progress.snapshot();
                match &bar {
                    Some(bar) => update_bar(bar, snapshot),
                    None => log_progress(snapshot),
                }
            }
        }
    }
}

fn log_progress(snapshot: Progress) {
    match snapshot.fraction() {
        Some(fraction) => tracing::info!(
            "Progress: {}/{} offers ({:.0}%)",
            snapshot.processed,
            snapshot.total,
            fraction * 100.0
        ),
        None => tracing::info!("Progress: {} offers", snapshot.processed),
    }
}
