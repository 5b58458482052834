//! # Tether Server
//!
//! The authoritative side of a shared physics scene.
//!
//! ```text
//!   spawn timer ──► ObjectRegistry ──LifecycleEvent──► BroadcastChannel ──► viewers
//!                        │                                   ▲
//!   step timer ─────► SimulationWorld                         │
//!                        │                                   │
//!   broadcast timer ──► snapshot() ──── PoseSnapshot ─────────┘
//! ```
//!
//! Everything above runs on one cooperative loop ([`Server::run`]); the
//! registry and channel are never touched from anywhere else, so a snapshot
//! always sees either all or none of a spawn/eviction.
//!
//! ## Usage
//!
//! ```ignore
//! let config = ServerConfig::load()?;
//! let server = Server::bind(config).await?;
//! server.run().await?;
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;

pub use broadcast::{
    outbound_capacity, outbound_queue, BroadcastChannel, BroadcastStats, Outbound, PendingViewer,
    ViewerId, VIEWER_BACKLOG,
};
pub use config::{ServerConfig, SpawnTemplate};
pub use error::{ServerError, ServerResult};
pub use registry::{LifecycleSink, ObjectRegistry, RegistryStats, MAX_POPULATION};
pub use server::Server;
