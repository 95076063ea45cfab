//! Earnings Radar API Server
//!
//! Serves the most-anticipated earnings dashboard and per-ticker EPS pages.

use dotenvy::dotenv;
use earnings_radar::config::Config;
use earnings_radar::core::http::start_server;
use earnings_radar::logging;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env if present
    dotenv().ok();

    let config = Config::from_env()?;
    logging::init_logging_for(&config.environment);

    info!("Starting Earnings Radar API Server");
    info!(environment = %config.environment, "Environment");
    info!(
        port = config.port,
        chart_style = ?config.chart_style,
        cache_backend = ?config.cache.backend,
        cache_ttl_seconds = config.cache.ttl.as_secs(),
        summaries = config.summary.is_some(),
        "Configuration loaded"
    );

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(config).await {
            error!(error = %e, "HTTP server error");
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
            info!("API server stopped");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}
