//! JSON framing

use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};
use crate::messages::ServerMessage;

/// Encode a message as a JSON text frame
pub fn encode(message: &ServerMessage) -> ProtocolResult<String> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a text frame.
///
/// Returns `Ok(None)` for a well-formed frame whose `type` is not one of ours.
pub fn decode(text: &str) -> ProtocolResult<Option<ServerMessage>> {
    from_value(serde_json::from_str(text)?)
}

/// Decode a binary frame holding UTF-8 JSON
pub fn decode_bytes(bytes: &[u8]) -> ProtocolResult<Option<ServerMessage>> {
    from_value(serde_json::from_slice(bytes)?)
}

fn from_value(value: Value) -> ProtocolResult<Option<ServerMessage>> {
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    if !ServerMessage::is_known_type(tag) {
        return Ok(None);
    }

    Ok(Some(serde_json::from_value(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_physics::{ObjectId, Pose, PoseSnapshot};

    #[test]
    fn test_remove_survives_framing() {
        let id = ObjectId::new();
        let text = encode(&ServerMessage::remove(id)).unwrap();
        let decoded = decode(&text).unwrap();
        assert_eq!(decoded, Some(ServerMessage::remove(id)));
    }

    #[test]
    fn test_poses_survive_binary_framing() {
        let mut snapshot = PoseSnapshot::new();
        snapshot.insert(ObjectId::new(), Pose::at(0.5, 0.25, -1.0));
        let message = ServerMessage::poses(&snapshot);
        let text = encode(&message).unwrap();
        assert_eq!(decode_bytes(text.as_bytes()).unwrap(), Some(message));
    }

    #[test]
    fn test_unknown_type_is_none() {
        let decoded = decode(r#"{"type":"chat","text":"hello"}"#).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(matches!(decode("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(decode(r#"{"id":"x"}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(decode(r#"{"type":7}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(decode("[1,2,3]"), Err(ProtocolError::MissingType)));
        // Known type, wrong payload
        assert!(matches!(
            decode(r#"{"type":"removeCObject","id":"not-a-uuid"}"#),
            Err(ProtocolError::Json(_))
        ));
        assert!(decode(r#"{"type":"updatePoses"}"#).is_err());
    }
}
