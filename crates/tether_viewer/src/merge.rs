//! Pose merge policies

use serde::{Deserialize, Serialize};

use crate::error::{ViewerError, ViewerResult};

/// Default blend factor per local step
pub const DEFAULT_BLEND_FACTOR: f32 = 0.2;

/// Default number of local steps before a blend snaps to its target
pub const DEFAULT_BLEND_MAX_STEPS: u32 = 30;

fn default_factor() -> f32 {
    DEFAULT_BLEND_FACTOR
}

fn default_max_steps() -> u32 {
    DEFAULT_BLEND_MAX_STEPS
}

/// How an authoritative pose is applied to a shadow body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum MergePolicy {
    /// Replace the shadow state immediately
    #[default]
    Overwrite,

    /// Move toward the received pose over subsequent local steps
    Blend {
        /// Fraction of the remaining distance covered per step, in (0, 1]
        #[serde(default = "default_factor")]
        factor: f32,
        /// Steps after which the target is written exactly
        #[serde(default = "default_max_steps")]
        max_steps: u32,
    },
}

impl MergePolicy {
    /// Blend with default factor and step bound
    pub fn blend() -> Self {
        Self::Blend {
            factor: DEFAULT_BLEND_FACTOR,
            max_steps: DEFAULT_BLEND_MAX_STEPS,
        }
    }

    /// Check if this policy defers merges to local steps
    pub fn is_blend(&self) -> bool {
        matches!(self, Self::Blend { .. })
    }

    pub fn validate(&self) -> ViewerResult<()> {
        if let Self::Blend { factor, max_steps } = *self {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(ViewerError::Config(format!(
                    "blend factor must be in (0, 1], got {}",
                    factor
                )));
            }
            if max_steps == 0 {
                return Err(ViewerError::Config("blend max_steps must be at least 1".into()));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overwrite => write!(f, "overwrite"),
            Self::Blend { factor, max_steps } => {
                write!(f, "blend (factor {}, max {} steps)", factor, max_steps)
            }
        }
    }
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" | "snap" => Ok(Self::Overwrite),
            "blend" | "smooth" => Ok(Self::blend()),
            _ => Err(format!("Unknown merge policy: {}", s)),
        }
    }
}
