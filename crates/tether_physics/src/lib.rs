//! Tether Physics - Rapier 3D Integration
//!
//! The simulation world shared by the authoritative server and every viewer
//! mirror. It owns an insertion-ordered set of rigid bodies, keeps them in
//! lock-step with the Rapier body/collider sets, and advances them with a
//! clamped fixed-timestep loop.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 SimulationWorld                   │
//! │  ┌──────────────┐   ┌────────────────────────┐   │
//! │  │ ObjectId ->  │   │ RigidBodySet           │   │
//! │  │ BodyEntry    │<->│ ColliderSet            │   │
//! │  │ (ordered)    │   │ PhysicsPipeline        │   │
//! │  └──────────────┘   └────────────────────────┘   │
//! └──────────────────────────────────────────────────┘
//!          │                          │
//!          ▼                          ▼
//!    ┌───────────┐             ┌──────────────┐
//!    │ RigidBody │             │ PoseSnapshot │
//!    └───────────┘             └──────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tether_physics::prelude::*;
//!
//! let mut world = SimulationWorld::new(PhysicsConfig::default())?;
//!
//! let id = world.add_body(
//!     BodyDescriptor::new(ShapeDescriptor::cube(0.4), 1.0)
//!         .with_position(0.0, 1.0, 0.0)
//!         .with_velocity(10.0, 0.0, 0.0),
//! )?;
//!
//! // One call, at most three 1/60 s substeps.
//! world.step(1.0 / 60.0, 0.5, 3);
//!
//! let snapshot = world.snapshot();
//! assert!(snapshot.get(&id).is_some());
//! ```

pub mod body;
pub mod config;
pub mod error;
pub mod pose;
pub mod shape;
pub mod world;

pub mod prelude {
    //! Common imports for simulation functionality
    pub use crate::body::{BodyDescriptor, ObjectId, RigidBody, DEFAULT_COLOR};
    pub use crate::config::PhysicsConfig;
    pub use crate::error::{PhysicsError, PhysicsResult};
    pub use crate::pose::{Pose, PoseSnapshot};
    pub use crate::shape::ShapeDescriptor;
    pub use crate::world::SimulationWorld;
}

pub use prelude::*;
