//! Protocol errors

use thiserror::Error;

/// Errors raised while encoding or decoding frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message has no string `type` field")]
    MissingType,

    #[error("Invalid body description: {0}")]
    InvalidBody(#[from] tether_physics::PhysicsError),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
