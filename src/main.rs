//! Hackathon Radar server binary.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use hackathon_radar::{config_path, run, AppConfig};

/// Aggregates hackathon and tech-event listings and serves them from cache.
#[derive(Parser, Debug)]
#[command(name = "hackathon-radar", about, long_about = None)]
struct Args {
    /// Path to a JSON config file (defaults to the per-user data directory).
    #[arg(long, env = "RADAR_CONFIG")]
    config: Option<PathBuf>,

    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = args.config.unwrap_or_else(config_path);
    let config = AppConfig::load(&path)?;

    run(config).await
}
