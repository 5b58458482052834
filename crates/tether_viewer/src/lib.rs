//! # Tether Viewer
//!
//! A read-only mirror of the authoritative scene.
//!
//! The viewer keeps one shadow body per server object in a local
//! [`SimulationWorld`](tether_physics::SimulationWorld). Incoming frames are
//! decoded into [`ServerMessage`](tether_protocol::ServerMessage)s and routed by
//! [`dispatch`]; between frames the mirror may run its own physics for visual
//! continuity, but every authoritative pose wins in the end.
//!
//! | Message | Effect |
//! |---------|--------|
//! | `addCObject` | create shadow (duplicate ids ignored) |
//! | `removeCObject` | delete shadow (absent ids ignored) |
//! | `updatePoses` | merge poses per [`MergePolicy`] (unknown ids skipped) |

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod merge;
pub mod mirror;

pub use client::ViewerClient;
pub use config::ViewerConfig;
pub use dispatch::{dispatch, handle_binary, handle_frame, Dispatched};
pub use error::{ViewerError, ViewerResult};
pub use merge::MergePolicy;
pub use mirror::{ClientMirror, MergeReport, MirrorConfig, MirrorStats};
