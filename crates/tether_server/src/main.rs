//! Tether server binary
//!
//! Usage: `tether-server [config.toml]`

use std::process::ExitCode;

use tether_server::{Server, ServerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Tether server v{}", env!("CARGO_PKG_VERSION"));

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    config.log_summary();

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("Failed to start server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        log::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
