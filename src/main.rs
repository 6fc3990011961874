//! Main entry point for the weather-archive-downloader CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use weather_archive_downloader::cli::{self, Cli};
use weather_archive_downloader::metrics;
use weather_archive_downloader::shutdown::{self, ShutdownCoordinator};

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("weather_archive_downloader=info"));

    // Logs go to stderr so JSON results on stdout stay machine readable
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr) {
            error!("Metrics exporter failed: {}", e);
            std::process::exit(1);
        }
    }

    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    shutdown::spawn_ctrl_c_listener(shutdown.clone());

    let result = cli::execute(&cli, shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e));

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
