//! Lifecycle events emitted by the authoritative registry

use tether_physics::{ObjectId, RigidBody};

use crate::messages::ServerMessage;

/// A change to the live object set
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Body spawned, with its state at spawn time
    Add(RigidBody),
    /// Body evicted or explicitly removed
    Remove(ObjectId),
}

impl LifecycleEvent {
    /// Id of the affected object
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Add(body) => body.id,
            Self::Remove(id) => *id,
        }
    }

    /// Check if this is an add
    pub fn is_add(&self) -> bool {
        matches!(self, Self::Add(_))
    }

    /// Check if this is a remove
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove(_))
    }
}

impl From<&LifecycleEvent> for ServerMessage {
    fn from(event: &LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Add(body) => ServerMessage::add(body),
            LifecycleEvent::Remove(id) => ServerMessage::remove(*id),
        }
    }
}
