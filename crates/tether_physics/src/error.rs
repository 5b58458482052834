//! Error types for the simulation world

use thiserror::Error;

use crate::body::ObjectId;

/// Simulation world errors
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// Body not present in the world
    #[error("Rigid body not found: {0}")]
    BodyNotFound(ObjectId),

    /// A body with this id is already present
    #[error("Rigid body already exists: {0}")]
    DuplicateBody(ObjectId),

    /// Shape kind or dimensions rejected
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Mass is negative or not finite
    #[error("Invalid mass: {0}")]
    InvalidMass(f32),

    /// Invalid configuration
    #[error("Invalid physics configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for simulation operations
pub type PhysicsResult<T> = std::result::Result<T, PhysicsError>;
