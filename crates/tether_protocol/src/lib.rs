//! # Tether Protocol
//!
//! Messages the authoritative server pushes to viewers. Every frame is a JSON
//! object tagged by a `type` field:
//!
//! | type            | payload                                                 |
//! |-----------------|---------------------------------------------------------|
//! | `addCObject`    | id, shapeType, dimensions, mass, color, pose            |
//! | `removeCObject` | id                                                      |
//! | `updatePoses`   | `poses: { id: { position, quaternion, velocity?, angularVelocity? } }` |
//!
//! Decoding is tolerant: an unknown `type` decodes to `None` so the caller can
//! ignore it, and anything unparseable is an error the caller discards.

pub mod codec;
pub mod error;
pub mod lifecycle;
pub mod messages;

pub use codec::{decode, decode_bytes, encode};
pub use error::{ProtocolError, ProtocolResult};
pub use lifecycle::LifecycleEvent;
pub use messages::{AddObject, Quat, RemoveObject, ServerMessage, UpdatePoses, Vec3, WirePose};
