//! Dashboard server.
//!
//! Serves filtered views of the ranked store table: facets for the filter
//! pickers, a ranked list with map marker hints, and per-store details.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use storefinder::config::Config;
use storefinder::geocoder::LandmarkResolver;
use storefinder::table;
use storefinder::PipelineError;

mod routes;
use routes::AppState;

#[derive(Parser, Debug)]
#[command(name = "dashboard")]
#[command(about = "Store finder dashboard server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// TOML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ranked store table
    #[arg(short, long)]
    ranked: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(path) = args.ranked {
        config.paths.ranked = path;
    }

    info!("Store Finder Dashboard");

    let stores = match table::read_ranked_stores(&config.paths.ranked) {
        Ok(stores) => stores,
        Err(e @ PipelineError::SourceMissing { .. }) => {
            error!(
                "데이터 파일을 찾을 수 없습니다. '{}' 파일이 필요합니다.",
                config.paths.ranked.display()
            );
            return Err(e.into());
        }
        Err(e) => return Err(e).context("Failed to load ranked stores"),
    };

    let mut landmarks = LandmarkResolver::seoul();
    landmarks.insert(config.origin.name.clone(), config.origin.point());
    info!(
        "Serving {} stores ranked from {} ({} landmarks known)",
        stores.len(),
        config.origin.name,
        landmarks.len()
    );

    let state = Arc::new(AppState {
        stores,
        origin: config.origin,
        landmarks,
    });

    let app = routes::router(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
