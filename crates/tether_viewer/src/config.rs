//! Viewer Configuration
//!
//! Sources, lowest priority first: built-in defaults, a TOML file (first
//! positional argument, else `tether-viewer.toml` if present), then
//! `TETHER_SERVER_URL` and `TETHER_MERGE`.
//!
//! ```toml
//! server_url = "ws://127.0.0.1:8080"
//! prediction = true
//!
//! [merge]
//! mode = "blend"
//! factor = 0.2
//! max_steps = 30
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_physics::PhysicsConfig;

use crate::error::{ViewerError, ViewerResult};
use crate::merge::MergePolicy;
use crate::mirror::MirrorConfig;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tether-viewer.toml";

/// Complete viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// WebSocket URL of the server
    pub server_url: String,
    /// Pose merge policy
    pub merge: MergePolicy,
    /// Run local physics between server updates
    pub prediction: bool,
    /// Time between local steps
    pub frame_interval_ms: f64,
    /// Time between status reports
    pub report_interval_ms: u64,
    /// Local world settings
    pub physics: PhysicsConfig,
    /// Config file path (for reloading)
    #[serde(skip)]
    pub config_path: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080".to_string(),
            merge: MergePolicy::Overwrite,
            prediction: true,
            frame_interval_ms: 1000.0 / 60.0,
            report_interval_ms: 5000,
            physics: PhysicsConfig::default(),
            config_path: None,
        }
    }
}

impl ViewerConfig {
    /// Load configuration from all sources
    pub fn load() -> ViewerResult<Self> {
        let explicit = std::env::args()
            .skip(1)
            .find(|arg| !arg.starts_with("--"));

        let mut config = match explicit {
            Some(path) => Self::load_from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &str) -> ViewerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.config_path = Some(path.to_string());
        log::info!("Loaded viewer config from {}", path);
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ViewerResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TETHER_*` overrides looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> ViewerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TETHER_SERVER_URL") {
            if !url.is_empty() {
                log::info!("Server URL from env: {}", url);
                self.server_url = url;
            }
        }
        if let Some(merge) = lookup("TETHER_MERGE") {
            let policy: MergePolicy = merge.parse().map_err(ViewerError::Config)?;
            // Keep tuned blend parameters from the file
            if !(policy.is_blend() && self.merge.is_blend()) {
                self.merge = policy;
            }
            log::info!("Merge policy from env: {}", self.merge);
        }
        Ok(())
    }

    /// Reject settings the client cannot run with
    pub fn validate(&self) -> ViewerResult<()> {
        if self.server_url.starts_with("wss://") {
            return Err(ViewerError::Config(format!(
                "server_url '{}' needs TLS, which this build does not support; use ws://",
                self.server_url
            )));
        }
        if !self.server_url.starts_with("ws://") {
            return Err(ViewerError::Config(format!(
                "server_url must be a ws:// URL, got '{}'",
                self.server_url
            )));
        }
        frame_duration(self.frame_interval_ms)?;
        if self.report_interval_ms == 0 {
            return Err(ViewerError::Config("report_interval_ms must be positive".into()));
        }
        self.merge.validate()?;
        self.physics.validate()?;
        Ok(())
    }

    /// Settings for the mirror
    pub fn mirror_config(&self) -> MirrorConfig {
        MirrorConfig {
            merge: self.merge,
            prediction: self.prediction,
            physics: self.physics.clone(),
        }
    }

    /// Local step cadence. Falls back to 60 Hz if the value does not validate.
    pub fn frame_interval(&self) -> Duration {
        frame_duration(self.frame_interval_ms)
            .unwrap_or_else(|_| Duration::from_secs_f64(1.0 / 60.0))
    }

    /// Status report cadence
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// Log the effective settings
    pub fn log_summary(&self) {
        log::info!("Viewer configuration:");
        log::info!("  Server: {}", self.server_url);
        log::info!("  Merge: {}", self.merge);
        log::info!("  Prediction: {}", self.prediction);
        if let Some(path) = &self.config_path {
            log::info!("  Config file: {}", path);
        }
    }
}

fn frame_duration(ms: f64) -> ViewerResult<Duration> {
    match Duration::try_from_secs_f64(ms / 1000.0) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(ViewerError::Config(format!(
            "frame_interval_ms must be a positive duration of at least 1 ns, got {}",
            ms
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.server_url, "ws://127.0.0.1:8080");
        assert_eq!(config.merge, MergePolicy::Overwrite);
        assert!(config.prediction);
        assert_eq!(config.report_interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_blend_section() {
        let config = ViewerConfig::from_toml_str(
            r#"
            server_url = "ws://10.0.0.2:9000"

            [merge]
            mode = "blend"
            factor = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.server_url, "ws://10.0.0.2:9000");
        assert_eq!(
            config.merge,
            MergePolicy::Blend {
                factor: 0.5,
                max_steps: crate::merge::DEFAULT_BLEND_MAX_STEPS
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_merge_override() {
        let mut config = ViewerConfig::default();
        config
            .apply_env(|key| match key {
                "TETHER_MERGE" => Some("blend".to_string()),
                "TETHER_SERVER_URL" => Some("ws://example.test:1234".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.merge, MergePolicy::blend());
        assert_eq!(config.server_url, "ws://example.test:1234");
    }

    #[test]
    fn test_env_blend_keeps_file_parameters() {
        let mut config = ViewerConfig {
            merge: MergePolicy::Blend { factor: 0.7, max_steps: 4 },
            ..ViewerConfig::default()
        };
        config
            .apply_env(|key| (key == "TETHER_MERGE").then(|| "blend".to_string()))
            .unwrap();
        assert_eq!(config.merge, MergePolicy::Blend { factor: 0.7, max_steps: 4 });
    }

    #[test]
    fn test_unknown_merge_env_is_error() {
        let mut config = ViewerConfig::default();
        let result = config.apply_env(|key| (key == "TETHER_MERGE").then(|| "teleport".to_string()));
        assert!(matches!(result, Err(ViewerError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let config = ViewerConfig {
            server_url: "http://localhost".to_string(),
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ViewerConfig {
            server_url: "wss://example.test:443".to_string(),
            ..ViewerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ViewerError::Config(_))));

        // Positive but rounds to a zero period
        let config = ViewerConfig {
            frame_interval_ms: 1e-9,
            ..ViewerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ViewerError::Config(_))));
        assert!(!config.frame_interval().is_zero());

        let config = ViewerConfig {
            frame_interval_ms: 1e300,
            ..ViewerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ViewerError::Config(_))));

        let config = ViewerConfig {
            frame_interval_ms: -16.0,
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ViewerConfig {
            merge: MergePolicy::Blend { factor: 0.0, max_steps: 3 },
            ..ViewerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
