//! Tether viewer binary (headless)
//!
//! Usage: `tether-viewer [config.toml]`

use std::process::ExitCode;

use tether_viewer::{ViewerClient, ViewerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Tether viewer v{}", env!("CARGO_PKG_VERSION"));

    let config = match ViewerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    config.log_summary();

    let client = match ViewerClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to create viewer: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match client.run().await {
        Ok(mirror) => {
            log::info!("Session ended with {} shadows", mirror.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Viewer error: {}", e);
            ExitCode::FAILURE
        }
    }
}
