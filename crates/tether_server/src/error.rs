//! Server errors

use thiserror::Error;

/// Errors surfaced by the server binary and its setup path
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config file parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Physics error: {0}")]
    Physics(#[from] tether_physics::PhysicsError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] tether_protocol::ProtocolError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
