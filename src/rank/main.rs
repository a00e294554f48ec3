//! Distance ranking stage.
//!
//! Reads the coordinate-enriched table and writes it back sorted by
//! great-circle distance from the configured origin.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use storefinder::config::Config;
use storefinder::ranking;

#[derive(Parser, Debug)]
#[command(name = "rank")]
#[command(about = "Rank geocoded stores by distance from the origin")]
struct Args {
    /// TOML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Coordinate-enriched input table
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Ranked output table
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Origin label
    #[arg(long)]
    origin_name: Option<String>,

    /// Origin latitude
    #[arg(long, requires = "origin_lon", allow_hyphen_values = true)]
    origin_lat: Option<f64>,

    /// Origin longitude
    #[arg(long, requires = "origin_lat", allow_hyphen_values = true)]
    origin_lon: Option<f64>,
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;

    if let Some(path) = args.input {
        config.paths.geocoded = path;
    }
    if let Some(path) = args.output {
        config.paths.ranked = path;
    }
    if let Some(name) = args.origin_name {
        config.origin.name = name;
    }
    if let (Some(lat), Some(lon)) = (args.origin_lat, args.origin_lon) {
        config.origin.lat = lat;
        config.origin.lon = lon;
    }
    config.validate()?;

    info!("Store Finder Ranker");
    info!(
        "Origin: {} ({}, {})",
        config.origin.name, config.origin.lat, config.origin.lon
    );

    let report = ranking::run(
        &config.paths.geocoded,
        &config.paths.ranked,
        &config.origin,
        config.output.write_bom,
    )
    .context("Ranking failed")?;

    info!(
        "Done: {} stores -> {}",
        report.stores,
        config.paths.ranked.display()
    );
    Ok(())
}
