//! Authoritative object registry
//!
//! Owns the simulation world and the FIFO spawn queue. Every mutation reports
//! its [`LifecycleEvent`] to the sink passed into the call, in the order the
//! mutations happen.

use std::collections::VecDeque;

use tether_physics::{
    BodyDescriptor, ObjectId, PhysicsResult, PoseSnapshot, RigidBody, SimulationWorld,
};
use tether_protocol::LifecycleEvent;

use crate::config::ServerConfig;
use crate::error::ServerResult;

/// Default live object cap
pub const MAX_POPULATION: usize = 300;

/// Receiver of lifecycle events
pub trait LifecycleSink {
    /// Called once per add or remove, immediately after the mutation
    fn publish(&mut self, event: LifecycleEvent);
}

impl LifecycleSink for Vec<LifecycleEvent> {
    fn publish(&mut self, event: LifecycleEvent) {
        self.push(event);
    }
}

/// Registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub spawned: u64,
    pub evicted: u64,
    pub removed: u64,
}

/// Live object set with FIFO eviction
pub struct ObjectRegistry {
    world: SimulationWorld,
    /// Live ids, oldest first
    queue: VecDeque<ObjectId>,
    max_population: usize,
    template: BodyDescriptor,
    stats: RegistryStats,
}

impl ObjectRegistry {
    /// Wrap a world. `template` is used by [`spawn_on_timer`](Self::spawn_on_timer).
    pub fn new(world: SimulationWorld, max_population: usize, template: BodyDescriptor) -> Self {
        Self {
            world,
            queue: VecDeque::with_capacity(max_population + 1),
            max_population,
            template,
            stats: RegistryStats::default(),
        }
    }

    /// Build the world and registry described by a server config
    pub fn from_config(config: &ServerConfig) -> ServerResult<Self> {
        let world = SimulationWorld::new(config.physics.clone())?;
        Ok(Self::new(
            world,
            config.max_population,
            config.spawn.descriptor(),
        ))
    }

    /// Spawn one body from the template
    pub fn spawn_on_timer(&mut self, sink: &mut dyn LifecycleSink) -> PhysicsResult<ObjectId> {
        self.spawn(self.template.clone(), sink)
    }

    /// Spawn one body, then evict down to capacity
    pub fn spawn(
        &mut self,
        desc: BodyDescriptor,
        sink: &mut dyn LifecycleSink,
    ) -> PhysicsResult<ObjectId> {
        let id = self.world.add_body(desc)?;
        self.queue.push_back(id);
        self.stats.spawned += 1;
        log::debug!("Spawned {} ({} live)", id, self.queue.len());

        if let Some(body) = self.world.body(id) {
            sink.publish(LifecycleEvent::Add(body));
        }

        self.enforce_capacity(sink);
        Ok(id)
    }

    /// Evict oldest bodies until the cap holds. Returns how many were evicted.
    pub fn enforce_capacity(&mut self, sink: &mut dyn LifecycleSink) -> usize {
        let mut evicted = 0;
        while self.queue.len() > self.max_population {
            let Some(oldest) = self.queue.pop_front() else {
                break;
            };
            self.world.remove_body(oldest);
            self.stats.evicted += 1;
            evicted += 1;
            log::debug!("Evicted {}", oldest);
            sink.publish(LifecycleEvent::Remove(oldest));
        }
        evicted
    }

    /// Remove a body if it is live. Absent ids are a no-op.
    pub fn remove_explicit(&mut self, id: ObjectId, sink: &mut dyn LifecycleSink) -> bool {
        let Some(index) = self.queue.iter().position(|live| *live == id) else {
            return false;
        };
        self.queue.remove(index);
        self.world.remove_body(id);
        self.stats.removed += 1;
        log::debug!("Removed {}", id);
        sink.publish(LifecycleEvent::Remove(id));
        true
    }

    /// Live ids, oldest first
    pub fn live_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.queue.iter()
    }

    /// Live bodies with their current state, oldest first
    pub fn live_bodies(&self) -> Vec<RigidBody> {
        self.queue
            .iter()
            .filter_map(|id| self.world.body(*id))
            .collect()
    }

    /// Check if an id is live
    pub fn contains(&self, id: ObjectId) -> bool {
        self.world.contains(id)
    }

    /// Number of live bodies
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is live
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Live object cap
    pub fn max_population(&self) -> usize {
        self.max_population
    }

    /// Replace the spawn template
    pub fn set_template(&mut self, template: BodyDescriptor) {
        self.template = template;
    }

    /// Step the world with explicit parameters
    pub fn step(&mut self, fixed_dt: f32, elapsed: f32, max_substeps: u32) -> u32 {
        self.world.step(fixed_dt, elapsed, max_substeps)
    }

    /// Step the world with its configured timestep
    pub fn advance(&mut self, elapsed: f32) -> u32 {
        self.world.advance(elapsed)
    }

    /// Poses of every live body
    pub fn snapshot(&self) -> PoseSnapshot {
        self.world.snapshot()
    }

    /// The owned world
    pub fn world(&self) -> &SimulationWorld {
        &self.world
    }

    /// Counters
    pub fn stats(&self) -> RegistryStats {
        self.stats
    }
}
