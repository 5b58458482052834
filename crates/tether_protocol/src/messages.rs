//! Wire message types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tether_physics::{BodyDescriptor, ObjectId, Pose, PoseSnapshot, RigidBody, ShapeDescriptor};

use crate::error::ProtocolResult;

/// 3-vector as `{x, y, z}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self { x: v[0], y: v[1], z: v[2] }
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Quaternion as `{x, y, z, w}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }
}

impl From<[f32; 4]> for Quat {
    fn from(q: [f32; 4]) -> Self {
        Self { x: q[0], y: q[1], z: q[2], w: q[3] }
    }
}

impl From<Quat> for [f32; 4] {
    fn from(q: Quat) -> Self {
        [q.x, q.y, q.z, q.w]
    }
}

/// Pose entry inside `updatePoses`. Velocities may be left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePose {
    pub position: Vec3,
    pub quaternion: Quat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_velocity: Option<Vec3>,
}

impl WirePose {
    /// The pose this entry describes, keeping `current` velocities it leaves out
    pub fn merged_onto(&self, current: &Pose) -> Pose {
        Pose {
            position: self.position.into(),
            orientation: self.quaternion.into(),
            linear_velocity: self
                .velocity
                .map_or(current.linear_velocity, Into::into),
            angular_velocity: self
                .angular_velocity
                .map_or(current.angular_velocity, Into::into),
        }
    }
}

impl From<&Pose> for WirePose {
    fn from(pose: &Pose) -> Self {
        Self {
            position: pose.position.into(),
            quaternion: pose.orientation.into(),
            velocity: Some(pose.linear_velocity.into()),
            angular_velocity: Some(pose.angular_velocity.into()),
        }
    }
}

/// Missing velocities become zero
impl From<WirePose> for Pose {
    fn from(wire: WirePose) -> Self {
        wire.merged_onto(&Pose::default())
    }
}

/// `addCObject` payload: everything a viewer needs to build a shadow body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddObject {
    pub id: ObjectId,
    pub shape_type: String,
    pub dimensions: Vec<f32>,
    pub mass: f32,
    pub color: u32,
    pub position: Vec3,
    pub quaternion: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl AddObject {
    /// Describe a live body
    pub fn from_body(body: &RigidBody) -> Self {
        let pose = &body.pose;
        Self {
            id: body.id,
            shape_type: body.shape.kind().to_string(),
            dimensions: body.shape.dimensions(),
            mass: body.mass,
            color: body.color,
            position: pose.position.into(),
            quaternion: pose.orientation.into(),
            velocity: pose.linear_velocity.into(),
            angular_velocity: pose.angular_velocity.into(),
        }
    }

    /// Initial pose carried by the message
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position.into(),
            orientation: self.quaternion.into(),
            linear_velocity: self.velocity.into(),
            angular_velocity: self.angular_velocity.into(),
        }
    }

    /// Rebuild the body descriptor, validating shape and mass
    pub fn to_descriptor(&self) -> ProtocolResult<BodyDescriptor> {
        let shape = ShapeDescriptor::from_parts(&self.shape_type, &self.dimensions)?;
        let desc = BodyDescriptor::new(shape, self.mass)
            .with_color(self.color)
            .with_pose(self.pose());
        desc.validate()?;
        Ok(desc)
    }
}

/// `removeCObject` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveObject {
    pub id: ObjectId,
}

/// `updatePoses` payload.
///
/// Entries are decoded one by one: an entry whose key is not an id or whose
/// value is not a pose is dropped and counted in `rejected`, and the rest of
/// the frame still applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawUpdatePoses")]
pub struct UpdatePoses {
    pub poses: HashMap<ObjectId, WirePose>,
    /// Entries dropped while decoding
    #[serde(skip)]
    pub rejected: usize,
}

#[derive(Deserialize)]
struct RawUpdatePoses {
    poses: HashMap<String, serde_json::Value>,
}

impl From<RawUpdatePoses> for UpdatePoses {
    fn from(raw: RawUpdatePoses) -> Self {
        let mut poses = HashMap::with_capacity(raw.poses.len());
        let mut rejected = 0;
        for (key, value) in raw.poses {
            let entry = ObjectId::parse(&key)
                .ok()
                .zip(serde_json::from_value::<WirePose>(value).ok());
            match entry {
                Some((id, pose)) => {
                    poses.insert(id, pose);
                }
                None => rejected += 1,
            }
        }
        Self { poses, rejected }
    }
}

impl From<&PoseSnapshot> for UpdatePoses {
    fn from(snapshot: &PoseSnapshot) -> Self {
        Self {
            poses: snapshot
                .iter()
                .map(|(id, pose)| (*id, WirePose::from(pose)))
                .collect(),
            rejected: 0,
        }
    }
}

impl UpdatePoses {
    /// Convert back into a snapshot
    pub fn to_snapshot(&self) -> PoseSnapshot {
        self.poses
            .iter()
            .map(|(id, wire)| (*id, Pose::from(*wire)))
            .collect()
    }
}

/// Every message the server sends, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A body came into existence
    #[serde(rename = "addCObject")]
    AddObject(AddObject),

    /// A body was evicted or removed
    #[serde(rename = "removeCObject")]
    RemoveObject(RemoveObject),

    /// Poses of all live bodies
    #[serde(rename = "updatePoses")]
    UpdatePoses(UpdatePoses),
}

impl ServerMessage {
    /// Tags this protocol understands
    pub const TYPES: [&'static str; 3] = ["addCObject", "removeCObject", "updatePoses"];

    /// Whether `tag` names a known message
    pub fn is_known_type(tag: &str) -> bool {
        Self::TYPES.contains(&tag)
    }

    /// The `type` tag of this message
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::AddObject(_) => "addCObject",
            Self::RemoveObject(_) => "removeCObject",
            Self::UpdatePoses(_) => "updatePoses",
        }
    }

    /// `addCObject` for a live body
    pub fn add(body: &RigidBody) -> Self {
        Self::AddObject(AddObject::from_body(body))
    }

    /// `removeCObject` for an id
    pub fn remove(id: ObjectId) -> Self {
        Self::RemoveObject(RemoveObject { id })
    }

    /// `updatePoses` for a snapshot
    pub fn poses(snapshot: &PoseSnapshot) -> Self {
        Self::UpdatePoses(UpdatePoses::from(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> RigidBody {
        RigidBody {
            id: ObjectId::new(),
            shape: ShapeDescriptor::cube(0.4),
            mass: 1.0,
            color: 0x00ffff,
            pose: Pose {
                position: [0.0, 1.0, 0.0],
                orientation: [0.0, 0.0, 0.0, 1.0],
                linear_velocity: [10.0, 0.0, 0.0],
                angular_velocity: [0.0, 0.0, -5.0],
            },
        }
    }

    #[test]
    fn test_add_object_field_names() {
        let body = body();
        let json = serde_json::to_value(ServerMessage::add(&body)).unwrap();

        assert_eq!(json["type"], "addCObject");
        assert_eq!(json["id"], body.id.to_string());
        assert_eq!(json["shapeType"], "box");
        assert_eq!(json["color"], 0x00ffff);
        assert_eq!(json["velocity"]["x"], 10.0);
        assert_eq!(json["angularVelocity"]["z"], -5.0);
        assert_eq!(json["quaternion"]["w"], 1.0);
        assert_eq!(json["dimensions"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_add_object_rebuilds_descriptor() {
        let body = body();
        let add = AddObject::from_body(&body);
        let desc = add.to_descriptor().unwrap();
        assert_eq!(desc.mass, 1.0);
        assert_eq!(desc.color, 0x00ffff);
        assert_eq!(desc.pose, body.pose);
        match desc.shape {
            ShapeDescriptor::Box { half_extents } => {
                approx::assert_relative_eq!(half_extents[0], 0.2, epsilon = 1.0e-6)
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_add_object_with_bad_shape_is_rejected() {
        let mut add = AddObject::from_body(&body());
        add.shape_type = "teapot".to_string();
        assert!(add.to_descriptor().is_err());
    }

    #[test]
    fn test_update_poses_shape() {
        let id = ObjectId::new();
        let mut snapshot = PoseSnapshot::new();
        snapshot.insert(id, Pose::at(1.0, 2.0, 3.0));

        let json = serde_json::to_value(ServerMessage::poses(&snapshot)).unwrap();
        assert_eq!(json["type"], "updatePoses");
        let entry = &json["poses"][id.to_string()];
        assert_eq!(entry["position"]["y"], 2.0);
        assert!(entry.get("angularVelocity").is_some());
    }

    #[test]
    fn test_remove_object_shape() {
        let id = ObjectId::new();
        let json = serde_json::to_string(&ServerMessage::remove(id)).unwrap();
        assert_eq!(json, format!(r#"{{"type":"removeCObject","id":"{}"}}"#, id));
    }

    #[test]
    fn test_pose_without_velocities_keeps_current() {
        let wire: WirePose = serde_json::from_str(
            r#"{"position":{"x":1,"y":2,"z":3},"quaternion":{"x":0,"y":0,"z":0,"w":1}}"#,
        )
        .unwrap();
        assert_eq!(wire.velocity, None);
        assert_eq!(wire.angular_velocity, None);

        let current = body().pose;
        let merged = wire.merged_onto(&current);
        assert_eq!(merged.position, [1.0, 2.0, 3.0]);
        assert_eq!(merged.linear_velocity, current.linear_velocity);
        assert_eq!(merged.angular_velocity, current.angular_velocity);

        assert_eq!(Pose::from(wire).linear_velocity, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bad_pose_entries_are_dropped_alone() {
        let good = ObjectId::new();
        let partial = ObjectId::new();
        let broken = ObjectId::new();
        let frame = format!(
            r#"{{"type":"updatePoses","poses":{{
                "{good}":{{"position":{{"x":1,"y":0,"z":0}},"quaternion":{{"x":0,"y":0,"z":0,"w":1}},
                    "velocity":{{"x":2,"y":0,"z":0}},"angularVelocity":{{"x":0,"y":0,"z":0}}}},
                "{partial}":{{"position":{{"x":5,"y":0,"z":0}},"quaternion":{{"x":0,"y":0,"z":0,"w":1}}}},
                "{broken}":{{"position":"here"}},
                "not-an-id":{{"position":{{"x":0,"y":0,"z":0}},"quaternion":{{"x":0,"y":0,"z":0,"w":1}}}}
            }}}}"#
        );

        let message: ServerMessage = serde_json::from_str(&frame).unwrap();
        let ServerMessage::UpdatePoses(update) = message else {
            panic!("expected updatePoses");
        };

        assert_eq!(update.poses.len(), 2);
        assert_eq!(update.rejected, 2);
        assert_eq!(update.poses[&good].velocity, Some(Vec3 { x: 2.0, y: 0.0, z: 0.0 }));
        assert_eq!(update.poses[&partial].velocity, None);
        assert!(!update.poses.contains_key(&broken));
    }
}
