//! Geocoding stage.
//!
//! Reads the raw store list, resolves every address through Nominatim,
//! and writes the coordinate-enriched table plus a log of dropped rows.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use storefinder::config::Config;
use storefinder::geocoder::{self, NominatimResolver};

#[derive(Parser, Debug)]
#[command(name = "geocode")]
#[command(about = "Resolve store addresses to coordinates")]
struct Args {
    /// TOML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raw store list
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Coordinate-enriched output table
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log of addresses that could not be resolved
    #[arg(long)]
    unresolved: Option<PathBuf>,

    /// Geocoding endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Per-lookup timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Maximum outstanding lookups
    #[arg(long)]
    concurrency: Option<usize>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.input {
            config.paths.raw = path;
        }
        if let Some(path) = self.output {
            config.paths.geocoded = path;
        }
        if let Some(path) = self.unresolved {
            config.paths.unresolved = path;
        }
        if let Some(endpoint) = self.endpoint {
            config.geocoder.endpoint = endpoint;
        }
        if let Some(secs) = self.timeout_secs {
            config.geocoder.timeout_secs = secs;
        }
        if let Some(n) = self.concurrency {
            config.geocoder.concurrency = n;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    info!("Store Finder Geocoder");
    info!("Input: {}", config.paths.raw.display());
    info!(
        "Endpoint: {} (timeout {}s, concurrency {})",
        config.geocoder.endpoint, config.geocoder.timeout_secs, config.geocoder.concurrency
    );

    let resolver = NominatimResolver::new(&config.geocoder)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let report = geocoder::run(&config, &resolver, &pb)
        .await
        .context("Geocoding failed")?;
    pb.finish_and_clear();

    info!(
        "Done: {} resolved, {} dropped -> {}",
        report.resolved,
        report.dropped,
        config.paths.geocoded.display()
    );
    Ok(())
}
