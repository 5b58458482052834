//! Simulation world - ordered body collection over a Rapier pipeline

use crate::body::{BodyDescriptor, ObjectId, RigidBody};
use crate::config::PhysicsConfig;
use crate::error::{PhysicsError, PhysicsResult};
use crate::pose::{quat_to_array, Pose, PoseSnapshot};
use crate::shape::ShapeDescriptor;
use rapier3d::prelude as rapier;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Bookkeeping for one body owned by the world
struct BodyEntry {
    shape: ShapeDescriptor,
    mass: f32,
    color: u32,
    handle: rapier::RigidBodyHandle,
}

/// The simulation world containing all bodies and integrator state
///
/// Every entry in the id map has exactly one Rapier body (plus its collider);
/// insertion and removal always touch both.
pub struct SimulationWorld {
    /// Configuration
    config: PhysicsConfig,

    /// Rapier physics pipeline
    pipeline: rapier::PhysicsPipeline,

    /// Gravity
    gravity: rapier::Vector<f32>,

    /// Integration parameters
    integration_params: rapier::IntegrationParameters,

    /// Island manager
    islands: rapier::IslandManager,

    /// Broad phase
    broad_phase: rapier::DefaultBroadPhase,

    /// Narrow phase
    narrow_phase: rapier::NarrowPhase,

    /// Impulse joint set
    impulse_joints: rapier::ImpulseJointSet,

    /// Multibody joint set
    multibody_joints: rapier::MultibodyJointSet,

    /// CCD solver
    ccd_solver: rapier::CCDSolver,

    /// Rigid body set
    bodies: rapier::RigidBodySet,

    /// Collider set
    colliders: rapier::ColliderSet,

    /// Id to body mapping
    entries: HashMap<ObjectId, BodyEntry>,

    /// Ids in insertion order
    order: Vec<ObjectId>,

    /// Static ground, if configured. Never part of `entries`.
    ground: Option<rapier::RigidBodyHandle>,

    /// Accumulated time not yet simulated
    accumulated_time: f32,

    /// Timestep used by the last `step` call
    last_timestep: f32,

    /// Total simulated time
    simulated_time: f64,
}

impl SimulationWorld {
    /// Create a new simulation world
    pub fn new(config: PhysicsConfig) -> PhysicsResult<Self> {
        config.validate()?;

        let gravity = rapier::Vector::new(config.gravity[0], config.gravity[1], config.gravity[2]);

        let mut integration_params = rapier::IntegrationParameters::default();
        integration_params.dt = config.timestep;
        integration_params.num_solver_iterations =
            NonZeroUsize::new(config.solver_iterations).unwrap_or(NonZeroUsize::MIN);

        let mut world = Self {
            last_timestep: config.timestep,
            config,
            pipeline: rapier::PhysicsPipeline::new(),
            gravity,
            integration_params,
            islands: rapier::IslandManager::new(),
            broad_phase: rapier::DefaultBroadPhase::new(),
            narrow_phase: rapier::NarrowPhase::new(),
            impulse_joints: rapier::ImpulseJointSet::new(),
            multibody_joints: rapier::MultibodyJointSet::new(),
            ccd_solver: rapier::CCDSolver::new(),
            bodies: rapier::RigidBodySet::new(),
            colliders: rapier::ColliderSet::new(),
            entries: HashMap::new(),
            order: Vec::new(),
            ground: None,
            accumulated_time: 0.0,
            simulated_time: 0.0,
        };

        if world.config.ground_plane {
            world.ground = Some(world.insert_rapier_body(&BodyDescriptor::fixed(ShapeDescriptor::Plane)));
        }

        Ok(world)
    }

    /// Get the physics configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Set gravity
    pub fn set_gravity(&mut self, x: f32, y: f32, z: f32) {
        self.gravity = rapier::Vector::new(x, y, z);
    }

    /// Get gravity
    pub fn gravity(&self) -> [f32; 3] {
        [self.gravity.x, self.gravity.y, self.gravity.z]
    }

    // ==================== Bodies ====================

    /// Add a body under a freshly generated id
    pub fn add_body(&mut self, desc: BodyDescriptor) -> PhysicsResult<ObjectId> {
        let id = ObjectId::new();
        self.insert_body(id, desc)?;
        Ok(id)
    }

    /// Add a body under a caller-chosen id
    pub fn insert_body(&mut self, id: ObjectId, desc: BodyDescriptor) -> PhysicsResult<()> {
        if self.entries.contains_key(&id) {
            return Err(PhysicsError::DuplicateBody(id));
        }
        desc.validate()?;

        let handle = self.insert_rapier_body(&desc);
        self.entries.insert(
            id,
            BodyEntry {
                shape: desc.shape,
                mass: desc.mass,
                color: desc.color,
                handle,
            },
        );
        self.order.push(id);
        Ok(())
    }

    /// Remove a body. Returns false if the id was not present.
    pub fn remove_body(&mut self, id: ObjectId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        self.order.retain(|other| *other != id);
        self.bodies.remove(
            entry.handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true, // Remove attached colliders
        );
        true
    }

    /// Whether a body is present
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ids in insertion order
    pub fn ids(&self) -> &[ObjectId] {
        &self.order
    }

    /// Get one body with its current state
    pub fn body(&self, id: ObjectId) -> Option<RigidBody> {
        let entry = self.entries.get(&id)?;
        let pose = self.read_pose(entry.handle)?;
        Some(RigidBody {
            id,
            shape: entry.shape,
            mass: entry.mass,
            color: entry.color,
            pose,
        })
    }

    /// All bodies in insertion order
    pub fn bodies(&self) -> Vec<RigidBody> {
        self.order.iter().filter_map(|id| self.body(*id)).collect()
    }

    /// Current kinematic state of a body
    pub fn pose(&self, id: ObjectId) -> Option<Pose> {
        let entry = self.entries.get(&id)?;
        self.read_pose(entry.handle)
    }

    /// Overwrite the kinematic state of a body
    pub fn set_pose(&mut self, id: ObjectId, pose: &Pose) -> PhysicsResult<()> {
        let handle = self
            .entries
            .get(&id)
            .map(|e| e.handle)
            .ok_or(PhysicsError::BodyNotFound(id))?;

        self.bodies
            .get_mut(handle)
            .map(|b| {
                b.set_translation(vector(pose.position), true);
                b.set_rotation(pose.rotation(), true);
                b.set_linvel(vector(pose.linear_velocity), true);
                b.set_angvel(vector(pose.angular_velocity), true);
            })
            .ok_or(PhysicsError::BodyNotFound(id))
    }

    /// Number of bodies (the ground plane is not counted)
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the world holds no bodies
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ==================== Simulation ====================

    /// Advance by `elapsed` seconds in steps of `fixed_dt`, running at most
    /// `max_substeps` integrator steps. Returns the number of steps run.
    ///
    /// Time left over once the clamp is hit is discarded rather than carried
    /// into the next call.
    pub fn step(&mut self, fixed_dt: f32, elapsed: f32, max_substeps: u32) -> u32 {
        if !(fixed_dt.is_finite() && fixed_dt > 0.0) {
            return 0;
        }
        if elapsed.is_finite() && elapsed > 0.0 {
            self.accumulated_time += elapsed;
        }

        self.integration_params.dt = fixed_dt;
        self.last_timestep = fixed_dt;

        let mut steps = 0;
        while self.accumulated_time >= fixed_dt && steps < max_substeps {
            self.step_internal();
            self.accumulated_time -= fixed_dt;
            steps += 1;
        }

        if self.accumulated_time >= fixed_dt {
            log::trace!(
                "Substep clamp hit, dropping {:.4}s of simulation time",
                self.accumulated_time - self.accumulated_time % fixed_dt
            );
        }
        self.accumulated_time %= fixed_dt;

        steps
    }

    /// Advance by `elapsed` seconds using the configured timestep and clamp
    pub fn advance(&mut self, elapsed: f32) -> u32 {
        self.step(self.config.timestep, elapsed, self.config.max_substeps)
    }

    /// Run exactly one integrator step of `dt`
    pub fn step_fixed(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        self.integration_params.dt = dt;
        self.last_timestep = dt;
        self.step_internal();
    }

    /// Leftover accumulated time as a fraction of the last timestep
    pub fn interpolation_alpha(&self) -> f32 {
        (self.accumulated_time / self.last_timestep).clamp(0.0, 1.0)
    }

    /// Total simulated time in seconds
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    /// Pose of every body
    pub fn snapshot(&self) -> PoseSnapshot {
        self.order
            .iter()
            .filter_map(|id| self.pose(*id).map(|pose| (*id, pose)))
            .collect()
    }

    /// Number of bodies registered with the integrator, ground included
    pub fn integrator_body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of colliders registered with the integrator, ground included
    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Internal fixed timestep
    fn step_internal(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
        self.simulated_time += f64::from(self.integration_params.dt);
    }

    fn insert_rapier_body(&mut self, desc: &BodyDescriptor) -> rapier::RigidBodyHandle {
        // Half-spaces have no finite mass
        let fixed = desc.is_fixed() || desc.shape == ShapeDescriptor::Plane;
        let body_type = if fixed {
            rapier::RigidBodyType::Fixed
        } else {
            rapier::RigidBodyType::Dynamic
        };

        let pose = &desc.pose;
        let builder = rapier::RigidBodyBuilder::new(body_type)
            .position(rapier::Isometry::from_parts(
                rapier::Translation::new(pose.position[0], pose.position[1], pose.position[2]),
                pose.rotation(),
            ))
            .linvel(vector(pose.linear_velocity))
            .angvel(vector(pose.angular_velocity))
            .can_sleep(self.config.sleeping_enabled);
        let handle = self.bodies.insert(builder);

        let mut collider = desc
            .shape
            .to_rapier_builder()
            .friction(self.config.friction)
            .restitution(self.config.restitution);
        if !fixed {
            collider = collider.mass(desc.mass);
        }
        self.colliders.insert_with_parent(collider, handle, &mut self.bodies);

        handle
    }

    fn read_pose(&self, handle: rapier::RigidBodyHandle) -> Option<Pose> {
        self.bodies.get(handle).map(|b| {
            let pos = b.translation();
            let linvel = b.linvel();
            let angvel = b.angvel();
            Pose {
                position: [pos.x, pos.y, pos.z],
                orientation: quat_to_array(b.rotation()),
                linear_velocity: [linvel.x, linvel.y, linvel.z],
                angular_velocity: [angvel.x, angvel.y, angvel.z],
            }
        })
    }
}

fn vector(v: [f32; 3]) -> rapier::Vector<f32> {
    rapier::Vector::new(v[0], v[1], v[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn world() -> SimulationWorld {
        SimulationWorld::new(PhysicsConfig::default()).unwrap()
    }

    fn cube() -> BodyDescriptor {
        BodyDescriptor::new(ShapeDescriptor::cube(0.4), 1.0).with_position(0.0, 1.0, 0.0)
    }

    #[test]
    fn test_create_world() {
        let world = world();
        assert!(world.is_empty());
        // Ground plane only
        assert_eq!(world.integrator_body_count(), 1);
        assert_eq!(world.collider_count(), 1);
    }

    #[test]
    fn test_world_without_ground() {
        let world = SimulationWorld::new(PhysicsConfig::default().with_ground_plane(false)).unwrap();
        assert_eq!(world.integrator_body_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(SimulationWorld::new(PhysicsConfig::default().with_timestep(-1.0)).is_err());
    }

    #[test]
    fn test_add_and_remove_keep_integrator_in_sync() {
        let mut world = world();
        let a = world.add_body(cube()).unwrap();
        let b = world.add_body(cube()).unwrap();
        let c = world.add_body(cube()).unwrap();
        assert_eq!(world.ids(), &[a, b, c]);
        assert_eq!(world.integrator_body_count(), 4);

        assert!(world.remove_body(b));
        assert_eq!(world.ids(), &[a, c]);
        assert_eq!(world.integrator_body_count(), 3);
        assert_eq!(world.collider_count(), 3);
        assert!(world.body(b).is_none());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut world = world();
        let id = world.add_body(cube()).unwrap();
        assert!(world.remove_body(id));
        assert!(!world.remove_body(id));
        assert!(!world.remove_body(ObjectId::new()));
        assert_eq!(world.integrator_body_count(), 1);
    }

    #[test]
    fn test_insert_duplicate_id_fails() {
        let mut world = world();
        let id = ObjectId::new();
        world.insert_body(id, cube()).unwrap();
        let err = world.insert_body(id, cube()).unwrap_err();
        assert!(matches!(err, PhysicsError::DuplicateBody(dup) if dup == id));
        assert_eq!(world.len(), 1);
        assert_eq!(world.integrator_body_count(), 2);
    }

    #[test]
    fn test_invalid_descriptor_leaves_world_untouched() {
        let mut world = world();
        assert!(world.add_body(BodyDescriptor::new(ShapeDescriptor::cube(0.4), -2.0)).is_err());
        assert!(world.add_body(BodyDescriptor::new(ShapeDescriptor::sphere(0.0), 1.0)).is_err());
        assert!(world.is_empty());
        assert_eq!(world.integrator_body_count(), 1);
    }

    #[test]
    fn test_body_reports_initial_state() {
        let mut world = world();
        let id = world
            .add_body(cube().with_velocity(10.0, 0.0, 0.0).with_angular_velocity(0.0, 0.0, -5.0))
            .unwrap();
        let body = world.body(id).unwrap();
        assert_eq!(body.shape, ShapeDescriptor::cube(0.4));
        assert_relative_eq!(body.mass, 1.0);
        assert_relative_eq!(body.pose.position[1], 1.0);
        assert_relative_eq!(body.pose.linear_velocity[0], 10.0);
        assert_relative_eq!(body.pose.angular_velocity[2], -5.0);
        assert_relative_eq!(body.pose.orientation[3], 1.0);
    }

    #[test]
    fn test_step_clamps_substeps() {
        let mut world = world();
        world.add_body(cube()).unwrap();

        let steps = world.step(1.0 / 60.0, 0.5, 3);
        assert_eq!(steps, 3);
        // Excess time is dropped, not carried over
        assert!(world.interpolation_alpha() < 1.0);
        assert_eq!(world.step(1.0 / 60.0, 0.0, 3), 0);
        assert_relative_eq!(world.simulated_time(), 3.0 / 60.0, epsilon = 1.0e-6);
    }

    #[test]
    fn test_step_accumulates_small_deltas() {
        let mut world = world();
        assert_eq!(world.step(0.1, 0.06, 3), 0);
        assert_eq!(world.step(0.1, 0.06, 3), 1);
        assert_relative_eq!(world.interpolation_alpha(), 0.2, epsilon = 1.0e-4);
    }

    #[test]
    fn test_step_ignores_bad_timestep() {
        let mut world = world();
        assert_eq!(world.step(0.0, 1.0, 3), 0);
        assert_eq!(world.step(f32::NAN, 1.0, 3), 0);
    }

    #[test]
    fn test_gravity_fall() {
        let mut world = SimulationWorld::new(PhysicsConfig::default().with_ground_plane(false)).unwrap();
        let id = world.add_body(cube().with_position(0.0, 10.0, 0.0)).unwrap();

        for _ in 0..60 {
            world.step_fixed(1.0 / 60.0);
        }

        let y = world.pose(id).unwrap().position[1];
        assert!(y < 10.0, "Body should fall due to gravity");
    }

    #[test]
    fn test_ground_plane_stops_fall() {
        let mut world = world();
        let id = world.add_body(cube()).unwrap();

        for _ in 0..180 {
            world.advance(1.0 / 60.0);
        }

        let y = world.pose(id).unwrap().position[1];
        assert!(y > 0.0 && y < 1.0, "cube should rest on the ground, y = {}", y);
    }

    #[test]
    fn test_fixed_body_does_not_move() {
        let mut world = world();
        let id = world
            .add_body(BodyDescriptor::fixed(ShapeDescriptor::cube(1.0)).with_position(0.0, 5.0, 0.0))
            .unwrap();
        for _ in 0..30 {
            world.step_fixed(1.0 / 60.0);
        }
        assert_relative_eq!(world.pose(id).unwrap().position[1], 5.0);
    }

    #[test]
    fn test_set_pose_overwrites_state() {
        let mut world = world();
        let id = world.add_body(cube()).unwrap();

        let mut pose = Pose::at(3.0, 4.0, 5.0);
        pose.linear_velocity = [1.0, 2.0, 3.0];
        world.set_pose(id, &pose).unwrap();

        let read = world.pose(id).unwrap();
        assert_relative_eq!(read.position[0], 3.0);
        assert_relative_eq!(read.position[2], 5.0);
        assert_relative_eq!(read.linear_velocity[1], 2.0);

        assert!(matches!(
            world.set_pose(ObjectId::new(), &pose),
            Err(PhysicsError::BodyNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_lists_every_body() {
        let mut world = world();
        let a = world.add_body(cube()).unwrap();
        let b = world.add_body(cube().with_position(2.0, 1.0, 0.0)).unwrap();

        let snapshot = world.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_relative_eq!(snapshot.get(&b).unwrap().position[0], 2.0);

        world.remove_body(a);
        let snapshot = world.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get(&a).is_none());
    }
}
