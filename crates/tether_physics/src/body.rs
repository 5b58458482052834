//! Rigid body identity and descriptors

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PhysicsError, PhysicsResult};
use crate::pose::Pose;
use crate::shape::ShapeDescriptor;

/// Default render hint colour (cyan)
pub const DEFAULT_COLOR: u32 = 0x00ffff;

/// Stable identity of a simulated object, shared by the server and every viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Create a new random object ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Description for creating a body: shape, mass, colour and initial state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDescriptor {
    /// Collision shape
    pub shape: ShapeDescriptor,
    /// Mass (0 = immovable)
    pub mass: f32,
    /// Render hint, 0xRRGGBB
    pub color: u32,
    /// Initial kinematic state
    pub pose: Pose,
}

impl Default for BodyDescriptor {
    fn default() -> Self {
        Self::new(ShapeDescriptor::default(), 1.0)
    }
}

impl BodyDescriptor {
    /// Create a descriptor at rest at the origin
    pub fn new(shape: ShapeDescriptor, mass: f32) -> Self {
        Self {
            shape,
            mass,
            color: DEFAULT_COLOR,
            pose: Pose::default(),
        }
    }

    /// Create an immovable body description
    pub fn fixed(shape: ShapeDescriptor) -> Self {
        Self::new(shape, 0.0)
    }

    /// Set position
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.pose.position = [x, y, z];
        self
    }

    /// Set linear velocity
    pub fn with_velocity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.pose.linear_velocity = [x, y, z];
        self
    }

    /// Set angular velocity
    pub fn with_angular_velocity(mut self, x: f32, y: f32, z: f32) -> Self {
        self.pose.angular_velocity = [x, y, z];
        self
    }

    /// Set colour
    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    /// Replace the whole initial state
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Whether the body is immovable
    pub fn is_fixed(&self) -> bool {
        self.mass == 0.0
    }

    /// Check shape and mass before the body reaches the integrator
    pub fn validate(&self) -> PhysicsResult<()> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(PhysicsError::InvalidMass(self.mass));
        }
        self.shape.validate()
    }
}

/// A body as seen from outside the world: identity, shape, mass and current state
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    /// Stable identity
    pub id: ObjectId,
    /// Collision shape
    pub shape: ShapeDescriptor,
    /// Mass (0 = immovable)
    pub mass: f32,
    /// Render hint
    pub color: u32,
    /// Current kinematic state
    pub pose: Pose,
}

impl RigidBody {
    /// The descriptor that would recreate this body in its current state
    pub fn descriptor(&self) -> BodyDescriptor {
        BodyDescriptor {
            shape: self.shape,
            mass: self.mass,
            color: self.color,
            pose: self.pose,
        }
    }
}
