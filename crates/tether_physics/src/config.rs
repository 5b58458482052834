//! Physics configuration

use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// Simulation world configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity vector (default: -9.82 in Y)
    pub gravity: [f32; 3],

    /// Fixed timestep for one integrator step
    pub timestep: f32,

    /// Maximum number of substeps per `step` call
    pub max_substeps: u32,

    /// Add a static ground plane at y = 0
    pub ground_plane: bool,

    /// Friction coefficient applied to every collider
    pub friction: f32,

    /// Restitution (bounciness) applied to every collider
    pub restitution: f32,

    /// Solver iterations
    pub solver_iterations: usize,

    /// Enable sleeping for inactive bodies
    pub sleeping_enabled: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.82, 0.0],
            timestep: 1.0 / 60.0,
            max_substeps: 3,
            ground_plane: true,
            friction: 0.3,
            restitution: 0.0,
            solver_iterations: 4,
            sleeping_enabled: true,
        }
    }
}

impl PhysicsConfig {
    /// Set gravity
    pub fn with_gravity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.gravity = [x, y, z];
        self
    }

    /// Set timestep
    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Set the substep clamp
    pub fn with_max_substeps(mut self, max_substeps: u32) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    /// Enable or disable the ground plane
    pub fn with_ground_plane(mut self, enabled: bool) -> Self {
        self.ground_plane = enabled;
        self
    }

    /// Reject values the integrator cannot run with
    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        if self.max_substeps == 0 {
            return Err(PhysicsError::InvalidConfig(
                "max_substeps must be at least 1".to_string(),
            ));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PhysicsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_substeps, 3);
        assert!(config.ground_plane);
    }

    #[test]
    fn test_rejects_bad_timestep() {
        assert!(PhysicsConfig::default().with_timestep(0.0).validate().is_err());
        assert!(PhysicsConfig::default().with_timestep(f32::NAN).validate().is_err());
        assert!(PhysicsConfig::default().with_max_substeps(0).validate().is_err());
    }
}
