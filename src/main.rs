use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use theme_relay::config::Config;
use theme_relay::{server, telemetry};

#[derive(Parser)]
#[command(name = "theme-relay")]
#[command(version, about = "Webhook-driven theme download and coding-agent relay")]
pub struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Listen port. Overrides PORT.
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            // Optional.
            dotenvy::dotenv().ok();
        }
    }

    let _log_guard = telemetry::init(&telemetry::LogSettings::from_env());

    let config = Config::from_env().context("Invalid configuration")?;
    let port = cli.port.unwrap_or(config.port);
    tracing::info!(
        port,
        store = %config.store.store,
        download_root = %config.download_root.display(),
        model = %config.default_model,
        "starting theme-relay"
    );

    let orchestrator = server::build_orchestrator(&config)?;
    server::start_server(port, orchestrator).await
}
