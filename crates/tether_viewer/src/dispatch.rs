//! Message routing
//!
//! [`dispatch`] maps each decoded message to its mirror handler.
//! [`handle_frame`] and [`handle_binary`] sit in front of it and drop
//! anything that does not decode.

use tether_physics::ObjectId;
use tether_protocol::{decode, decode_bytes, ProtocolResult, ServerMessage};

use crate::mirror::{ClientMirror, MergeReport};

/// What a dispatched message did to the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Add { id: ObjectId, applied: bool },
    Remove { id: ObjectId, applied: bool },
    Poses(MergeReport),
}

/// Apply one message to the mirror
pub fn dispatch(mirror: &mut ClientMirror, message: &ServerMessage) -> Dispatched {
    match message {
        ServerMessage::AddObject(add) => Dispatched::Add {
            id: add.id,
            applied: mirror.apply_add(add),
        },
        ServerMessage::RemoveObject(remove) => Dispatched::Remove {
            id: remove.id,
            applied: mirror.apply_remove(remove.id),
        },
        ServerMessage::UpdatePoses(update) => Dispatched::Poses(mirror.apply_poses(update)),
    }
}

/// Decode and apply a text frame. Malformed frames and unknown types yield `None`.
pub fn handle_frame(mirror: &mut ClientMirror, text: &str) -> Option<Dispatched> {
    route(mirror, decode(text), text.len())
}

/// Decode and apply a binary frame holding UTF-8 JSON
pub fn handle_binary(mirror: &mut ClientMirror, bytes: &[u8]) -> Option<Dispatched> {
    route(mirror, decode_bytes(bytes), bytes.len())
}

fn route(
    mirror: &mut ClientMirror,
    decoded: ProtocolResult<Option<ServerMessage>>,
    len: usize,
) -> Option<Dispatched> {
    match decoded {
        Ok(Some(message)) => Some(dispatch(mirror, &message)),
        Ok(None) => {
            mirror.record_unknown();
            log::debug!("Ignoring message of unknown type ({} bytes)", len);
            None
        }
        Err(e) => {
            mirror.record_malformed();
            log::warn!("Discarding malformed frame ({} bytes): {}", len, e);
            None
        }
    }
}
