//! Server Configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables: `TETHER_BIND`, `TETHER_MAX_POPULATION`, ...
//! 2. Config file: first positional argument, else `tether-server.toml`
//! 3. Built-in defaults
//!
//! # Example Config File
//!
//! ```toml
//! bind_address = "0.0.0.0:8080"
//! max_population = 300
//! spawn_interval_ms = 1000
//! spawn_delay_ms = 10000
//! broadcast_interval_ms = 500
//!
//! [physics]
//! gravity = [0.0, -9.82, 0.0]
//! timestep = 0.016666668
//! max_substeps = 3
//!
//! [spawn]
//! shape = { kind = "box", half_extents = [0.2, 0.2, 0.2] }
//! mass = 1.0
//! color = 0x00ffff
//! position = [0.0, 1.0, 0.0]
//! velocity = [10.0, 0.0, 0.0]
//! angular_velocity = [0.0, 0.0, -5.0]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_physics::{BodyDescriptor, PhysicsConfig, Pose, ShapeDescriptor, DEFAULT_COLOR};

use crate::error::{ServerError, ServerResult};
use crate::registry::MAX_POPULATION;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tether-server.toml";

/// Initial state given to every timer-spawned body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnTemplate {
    /// Collision shape
    pub shape: ShapeDescriptor,
    /// Mass
    pub mass: f32,
    /// Render hint, 0xRRGGBB
    pub color: u32,
    /// Spawn position
    pub position: [f32; 3],
    /// Spawn orientation `[x, y, z, w]`
    pub orientation: [f32; 4],
    /// Initial linear velocity
    pub velocity: [f32; 3],
    /// Initial angular velocity
    pub angular_velocity: [f32; 3],
}

impl Default for SpawnTemplate {
    fn default() -> Self {
        Self {
            shape: ShapeDescriptor::cube(0.4),
            mass: 1.0,
            color: DEFAULT_COLOR,
            position: [0.0, 1.0, 0.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
            velocity: [10.0, 0.0, 0.0],
            angular_velocity: [0.0, 0.0, -5.0],
        }
    }
}

impl SpawnTemplate {
    /// Body descriptor for one spawn
    pub fn descriptor(&self) -> BodyDescriptor {
        BodyDescriptor::new(self.shape, self.mass)
            .with_color(self.color)
            .with_pose(Pose {
                position: self.position,
                orientation: self.orientation,
                linear_velocity: self.velocity,
                angular_velocity: self.angular_velocity,
            })
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for viewer connections
    pub bind_address: String,
    /// Live object cap; the oldest object is evicted beyond it
    pub max_population: usize,
    /// Time between timer spawns
    pub spawn_interval_ms: u64,
    /// Delay before the first timer spawn
    pub spawn_delay_ms: u64,
    /// Time between simulation steps
    pub step_interval_ms: f64,
    /// Time between pose broadcasts
    pub broadcast_interval_ms: u64,
    /// Authoritative world settings
    pub physics: PhysicsConfig,
    /// Timer spawn template
    pub spawn: SpawnTemplate,
    /// Config file path (for reloading)
    #[serde(skip)]
    pub config_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_population: MAX_POPULATION,
            spawn_interval_ms: 1000,
            spawn_delay_ms: 10_000,
            step_interval_ms: 1000.0 / 60.0,
            broadcast_interval_ms: 500,
            physics: PhysicsConfig::default(),
            spawn: SpawnTemplate::default(),
            config_path: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from all sources
    pub fn load() -> ServerResult<Self> {
        // First non-flag argument is the config path
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
    pub fn load_from_file(path: &str) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.config_path = Some(path.to_string());
        log::info!("Loaded server config from {}", path);
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ServerResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TETHER_*` overrides looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("TETHER_BIND") {
            if !bind.is_empty() {
                log::info!("Bind address from env: {}", bind);
                self.bind_address = bind;
            }
        }
        if let Some(value) = lookup("TETHER_MAX_POPULATION") {
            self.max_population = parse_env("TETHER_MAX_POPULATION", &value)?;
        }
        if let Some(value) = lookup("TETHER_SPAWN_INTERVAL_MS") {
            self.spawn_interval_ms = parse_env("TETHER_SPAWN_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("TETHER_SPAWN_DELAY_MS") {
            self.spawn_delay_ms = parse_env("TETHER_SPAWN_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("TETHER_BROADCAST_INTERVAL_MS") {
            self.broadcast_interval_ms = parse_env("TETHER_BROADCAST_INTERVAL_MS", &value)?;
        }
        Ok(())
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> ServerResult<()> {
        if self.max_population == 0 {
            return Err(ServerError::Config("max_population must be at least 1".into()));
        }
        if self.spawn_interval_ms == 0 {
            return Err(ServerError::Config("spawn_interval_ms must be positive".into()));
        }
        if self.broadcast_interval_ms == 0 {
            return Err(ServerError::Config("broadcast_interval_ms must be positive".into()));
        }
        step_duration(self.step_interval_ms)?;
        self.physics.validate()?;
        self.spawn.descriptor().validate()?;
        Ok(())
    }

    /// Spawn cadence
    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }

    /// Delay before the first spawn
    pub fn spawn_delay(&self) -> Duration {
        Duration::from_millis(self.spawn_delay_ms)
    }

    /// Step cadence. Falls back to 60 Hz if the value does not validate.
    pub fn step_interval(&self) -> Duration {
        step_duration(self.step_interval_ms)
            .unwrap_or_else(|_| Duration::from_secs_f64(1.0 / 60.0))
    }

    /// Broadcast cadence
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Log the effective settings
    pub fn log_summary(&self) {
        log::info!("Server configuration:");
        log::info!("  Bind: {}", self.bind_address);
        log::info!("  Max population: {}", self.max_population);
        log::info!(
            "  Spawn: every {} ms after {} ms",
            self.spawn_interval_ms,
            self.spawn_delay_ms
        );
        log::info!(
            "  Step: {:.2} ms (dt {:.4}s, max {} substeps)",
            self.step_interval_ms,
            self.physics.timestep,
            self.physics.max_substeps
        );
        log::info!("  Broadcast: every {} ms", self.broadcast_interval_ms);
        if let Some(path) = &self.config_path {
            log::info!("  Config file: {}", path);
        }
    }
}

/// Convert a millisecond period, rejecting values that round to zero or overflow
fn step_duration(ms: f64) -> ServerResult<Duration> {
    match Duration::try_from_secs_f64(ms / 1000.0) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(ServerError::Config(format!(
            "step_interval_ms must be a positive duration of at least 1 ns, got {}",
            ms
        ))),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ServerResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::Config(format!("{} has invalid value '{}'", key, value)))
}
