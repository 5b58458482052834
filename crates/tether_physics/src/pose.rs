//! Kinematic state of a body and per-tick snapshots

use std::collections::HashMap;

use rapier3d::na::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::body::ObjectId;

/// Position, orientation and velocities of a body at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World position
    pub position: [f32; 3],
    /// Orientation quaternion (x, y, z, w)
    pub orientation: [f32; 4],
    /// Linear velocity
    pub linear_velocity: [f32; 3],
    /// Angular velocity
    pub angular_velocity: [f32; 3],
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
            linear_velocity: [0.0; 3],
            angular_velocity: [0.0; 3],
        }
    }
}

impl Pose {
    /// Pose at rest at a position
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            ..Default::default()
        }
    }

    /// Orientation as a unit quaternion. Degenerate input maps to identity.
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        let [x, y, z, w] = self.orientation;
        let q = Quaternion::new(w, x, y, z);
        if !q.coords.iter().all(|c| c.is_finite()) || q.norm_squared() < 1.0e-12 {
            return UnitQuaternion::identity();
        }
        UnitQuaternion::from_quaternion(q)
    }

    /// Move a fraction `t` of the way toward `target`.
    ///
    /// Position and velocities are linearly interpolated; orientation uses
    /// slerp, falling back to the target when the two are antipodal.
    pub fn blend_toward(&self, target: &Pose, t: f32) -> Pose {
        let t = t.clamp(0.0, 1.0);
        let from = self.rotation();
        let to = target.rotation();
        let rotation = from.try_slerp(&to, t, 1.0e-6).unwrap_or(to);
        Pose {
            position: lerp3(self.position, target.position, t),
            orientation: quat_to_array(&rotation),
            linear_velocity: lerp3(self.linear_velocity, target.linear_velocity, t),
            angular_velocity: lerp3(self.angular_velocity, target.angular_velocity, t),
        }
    }

    /// Whether position and orientation are within `tolerance` of `other`
    pub fn approx_eq(&self, other: &Pose, tolerance: f32) -> bool {
        let dp = Vector3::from(self.position) - Vector3::from(other.position);
        dp.norm() <= tolerance && self.rotation().angle_to(&other.rotation()) <= tolerance
    }
}

pub(crate) fn quat_to_array(q: &UnitQuaternion<f32>) -> [f32; 4] {
    [q.i, q.j, q.k, q.w]
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    Vector3::from(a).lerp(&Vector3::from(b), t).into()
}

/// Pose of every body at one broadcast tick
///
/// Built fresh from the world on each call to
/// [`SimulationWorld::snapshot`](crate::world::SimulationWorld::snapshot).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseSnapshot {
    poses: HashMap<ObjectId, Pose>,
}

impl PoseSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pose
    pub fn insert(&mut self, id: ObjectId, pose: Pose) {
        self.poses.insert(id, pose);
    }

    /// Look up a pose
    pub fn get(&self, id: &ObjectId) -> Option<&Pose> {
        self.poses.get(id)
    }

    /// Iterate all entries
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &Pose)> {
        self.poses.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }
}

impl FromIterator<(ObjectId, Pose)> for PoseSnapshot {
    fn from_iter<I: IntoIterator<Item = (ObjectId, Pose)>>(iter: I) -> Self {
        Self {
            poses: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PoseSnapshot {
    type Item = (ObjectId, Pose);
    type IntoIter = std::collections::hash_map::IntoIter<ObjectId, Pose>;

    fn into_iter(self) -> Self::IntoIter {
        self.poses.into_iter()
    }
}
