//! Viewer fan-out
//!
//! [`BroadcastChannel`] is the connection manager for one server session. Each
//! viewer is an outbound queue of encoded text frames drained by that
//! viewer's socket task. Queues are bounded: a viewer whose task has ended, or
//! whose queue is full because it stopped reading, is pruned on the next send
//! without retry.

use std::net::SocketAddr;

use tether_physics::{PoseSnapshot, RigidBody};
use tether_protocol::{encode, LifecycleEvent, ServerMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::registry::LifecycleSink;

/// Queue of encoded frames for one viewer
pub type Outbound = mpsc::Sender<String>;

/// Frames a registered viewer may fall behind by before it is dropped
pub const VIEWER_BACKLOG: usize = 64;

/// Queue capacity for a viewer of a server capped at `max_population` bodies.
/// A full catch-up always fits with [`VIEWER_BACKLOG`] frames to spare.
pub fn outbound_capacity(max_population: usize) -> usize {
    max_population + VIEWER_BACKLOG
}

/// Create the outbound queue for one viewer
pub fn outbound_queue(max_population: usize) -> (Outbound, mpsc::Receiver<String>) {
    mpsc::channel(outbound_capacity(max_population))
}

/// Identifier of a registered viewer, unique per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(u64);

impl ViewerId {
    /// Raw counter value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// A handshaken connection waiting to be registered
#[derive(Debug)]
pub struct PendingViewer {
    pub peer: SocketAddr,
    pub outbound: Outbound,
}

impl PendingViewer {
    pub fn new(peer: SocketAddr, outbound: Outbound) -> Self {
        Self { peer, outbound }
    }
}

struct Viewer {
    id: ViewerId,
    peer: SocketAddr,
    outbound: Outbound,
}

/// Broadcast statistics
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    /// Frames queued to viewers
    pub frames_sent: u64,
    /// Bytes queued to viewers
    pub bytes_sent: u64,
    /// Viewers registered over the session
    pub viewers_connected: u64,
    /// Viewers dropped after a failed send
    pub viewers_pruned: u64,
    /// Of those, viewers dropped because their queue was full
    pub viewers_lagged: u64,
}

/// Set of connected viewers
#[derive(Default)]
pub struct BroadcastChannel {
    viewers: Vec<Viewer>,
    next_id: u64,
    stats: BroadcastStats,
}

impl BroadcastChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer after sending it one `addCObject` per live body.
    ///
    /// Returns `None` if the viewer went away during catch-up; it is then
    /// never part of the fan-out set.
    pub fn on_connect(&mut self, pending: PendingViewer, live: &[RigidBody]) -> Option<ViewerId> {
        let id = ViewerId(self.next_id);
        self.next_id += 1;

        for body in live {
            let frame = match encode(&ServerMessage::add(body)) {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("Failed to encode {}: {}", body.id, e);
                    continue;
                }
            };
            let bytes = frame.len() as u64;
            match pending.outbound.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log::warn!("{} ({}) queue full during catch-up, dropping", id, pending.peer);
                    self.stats.viewers_lagged += 1;
                    return None;
                }
                Err(TrySendError::Closed(_)) => {
                    log::info!("{} ({}) left during catch-up", id, pending.peer);
                    return None;
                }
            }
            self.stats.frames_sent += 1;
            self.stats.bytes_sent += bytes;
        }

        log::info!(
            "{} connected from {} ({} objects synced)",
            id,
            pending.peer,
            live.len()
        );
        self.viewers.push(Viewer {
            id,
            peer: pending.peer,
            outbound: pending.outbound,
        });
        self.stats.viewers_connected += 1;
        Some(id)
    }

    /// Send an add or remove to every viewer
    pub fn broadcast_lifecycle(&mut self, event: &LifecycleEvent) -> usize {
        self.broadcast(&ServerMessage::from(event))
    }

    /// Send the current poses to every viewer. Empty snapshots are not sent.
    pub fn broadcast_poses(&mut self, snapshot: &PoseSnapshot) -> usize {
        if snapshot.is_empty() {
            return 0;
        }
        self.broadcast(&ServerMessage::poses(snapshot))
    }

    /// Encode once and queue to every viewer. Returns how many received it.
    pub fn broadcast(&mut self, message: &ServerMessage) -> usize {
        if self.viewers.is_empty() {
            return 0;
        }

        let frame = match encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode {}: {}", message.type_name(), e);
                return 0;
            }
        };
        let bytes = frame.len() as u64;

        let stats = &mut self.stats;
        let mut delivered = 0;
        self.viewers.retain(|viewer| match viewer.outbound.try_send(frame.clone()) {
            Ok(()) => {
                stats.frames_sent += 1;
                stats.bytes_sent += bytes;
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("{} ({}) stopped reading, pruning", viewer.id, viewer.peer);
                stats.viewers_pruned += 1;
                stats.viewers_lagged += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::info!("{} ({}) disconnected, pruning", viewer.id, viewer.peer);
                stats.viewers_pruned += 1;
                false
            }
        });

        log::trace!("Sent {} to {} viewers", message.type_name(), delivered);
        delivered
    }

    /// Number of viewers in the fan-out set
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Registered viewer ids, in connection order
    pub fn viewer_ids(&self) -> Vec<ViewerId> {
        self.viewers.iter().map(|v| v.id).collect()
    }

    /// Drop every viewer, closing their queues
    pub fn disconnect_all(&mut self) {
        if !self.viewers.is_empty() {
            log::info!("Disconnecting {} viewers", self.viewers.len());
        }
        self.viewers.clear();
    }

    /// Statistics
    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }
}

impl LifecycleSink for BroadcastChannel {
    fn publish(&mut self, event: LifecycleEvent) {
        self.broadcast_lifecycle(&event);
    }
}
