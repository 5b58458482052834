//! Client-side mirror of the authoritative scene

use std::collections::HashMap;

use tether_physics::{
    ObjectId, PhysicsConfig, PhysicsError, Pose, RigidBody, SimulationWorld,
};
use tether_protocol::{AddObject, UpdatePoses};

use crate::error::ViewerResult;
use crate::merge::MergePolicy;

/// Distance under which a blend is considered converged
const SNAP_TOLERANCE: f32 = 1.0e-3;

/// Mirror settings
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// How authoritative poses are applied
    pub merge: MergePolicy,
    /// Run local physics between server updates
    pub prediction: bool,
    /// Local world settings (timestep 1/60, 3 substeps by default)
    pub physics: PhysicsConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            merge: MergePolicy::Overwrite,
            prediction: true,
            physics: PhysicsConfig::default(),
        }
    }
}

/// Mirror counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub adds_applied: u64,
    pub duplicate_adds: u64,
    pub removes_applied: u64,
    pub removes_ignored: u64,
    pub poses_merged: u64,
    pub poses_skipped: u64,
    pub poses_rejected: u64,
    pub malformed_frames: u64,
    pub unknown_messages: u64,
}

/// Outcome of one `updatePoses`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Poses applied or queued as blend targets
    pub merged: usize,
    /// Poses for ids with no shadow
    pub skipped: usize,
    /// Entries that did not decode
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy)]
struct BlendTarget {
    pose: Pose,
    steps: u32,
}

/// Shadow bodies keyed by server id
pub struct ClientMirror {
    world: SimulationWorld,
    merge: MergePolicy,
    prediction: bool,
    targets: HashMap<ObjectId, BlendTarget>,
    stats: MirrorStats,
}

impl ClientMirror {
    pub fn new(config: MirrorConfig) -> ViewerResult<Self> {
        config.merge.validate()?;
        let world = SimulationWorld::new(config.physics)?;
        log::debug!("Mirror created with {} merge", config.merge);

        Ok(Self {
            world,
            merge: config.merge,
            prediction: config.prediction,
            targets: HashMap::new(),
            stats: MirrorStats::default(),
        })
    }

    // ==================== Messages ====================

    /// Create a shadow body. Returns false for duplicates and invalid bodies.
    pub fn apply_add(&mut self, add: &AddObject) -> bool {
        let desc = match add.to_descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                log::warn!("Discarding add for {}: {}", add.id, e);
                self.stats.malformed_frames += 1;
                return false;
            }
        };

        match self.world.insert_body(add.id, desc) {
            Ok(()) => {
                self.stats.adds_applied += 1;
                log::debug!("Shadow {} added ({} total)", add.id, self.world.len());
                true
            }
            Err(PhysicsError::DuplicateBody(id)) => {
                self.stats.duplicate_adds += 1;
                log::warn!("Ignoring duplicate add for {}", id);
                false
            }
            Err(e) => {
                self.stats.malformed_frames += 1;
                log::warn!("Discarding add for {}: {}", add.id, e);
                false
            }
        }
    }

    /// Delete a shadow body. Absent ids are a no-op.
    pub fn apply_remove(&mut self, id: ObjectId) -> bool {
        self.targets.remove(&id);
        if self.world.remove_body(id) {
            self.stats.removes_applied += 1;
            log::debug!("Shadow {} removed", id);
            true
        } else {
            self.stats.removes_ignored += 1;
            log::debug!("Remove for unknown shadow {}", id);
            false
        }
    }

    /// Merge authoritative poses. Ids without a shadow are skipped.
    pub fn apply_poses(&mut self, update: &UpdatePoses) -> MergeReport {
        let mut report = MergeReport {
            rejected: update.rejected,
            ..MergeReport::default()
        };
        if update.rejected > 0 {
            log::warn!("Dropped {} undecodable pose entries", update.rejected);
        }

        for (id, wire) in &update.poses {
            let Some(current) = self.world.pose(*id) else {
                report.skipped += 1;
                continue;
            };
            let pose = wire.merged_onto(&current);

            match self.merge {
                MergePolicy::Overwrite => {
                    if let Err(e) = self.world.set_pose(*id, &pose) {
                        log::warn!("Failed to merge pose for {}: {}", id, e);
                        report.skipped += 1;
                        continue;
                    }
                }
                // A newer target replaces the older one
                MergePolicy::Blend { .. } => {
                    self.targets.insert(*id, BlendTarget { pose, steps: 0 });
                }
            }
            report.merged += 1;
        }

        self.stats.poses_merged += report.merged as u64;
        self.stats.poses_skipped += report.skipped as u64;
        self.stats.poses_rejected += report.rejected as u64;
        log::trace!("Merged {} poses, skipped {}", report.merged, report.skipped);
        report
    }

    // ==================== Simulation ====================

    /// Advance local prediction by `elapsed` seconds, then advance blends.
    /// Returns the number of physics substeps run.
    pub fn local_step(&mut self, elapsed: f32) -> u32 {
        let steps = if self.prediction {
            self.world.advance(elapsed)
        } else {
            0
        };
        self.advance_blends();
        steps
    }

    fn advance_blends(&mut self) {
        let MergePolicy::Blend { factor, max_steps } = self.merge else {
            self.targets.clear();
            return;
        };

        let world = &mut self.world;
        self.targets.retain(|id, target| {
            let Some(current) = world.pose(*id) else {
                return false;
            };
            target.steps += 1;

            let next = current.blend_toward(&target.pose, factor);
            let done = next.approx_eq(&target.pose, SNAP_TOLERANCE) || target.steps >= max_steps;
            let written = if done { target.pose } else { next };

            if let Err(e) = world.set_pose(*id, &written) {
                log::warn!("Failed to blend {}: {}", id, e);
                return false;
            }
            !done
        });
    }

    // ==================== Queries ====================

    /// Current shadow bodies, in arrival order
    pub fn shadows(&self) -> Vec<RigidBody> {
        self.world.bodies()
    }

    /// One shadow body
    pub fn shadow(&self, id: ObjectId) -> Option<RigidBody> {
        self.world.body(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.world.contains(id)
    }

    /// Number of shadows
    pub fn len(&self) -> usize {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    /// Check if a shadow still has a blend target
    pub fn is_blending(&self, id: ObjectId) -> bool {
        self.targets.contains_key(&id)
    }

    /// Active merge policy
    pub fn merge_policy(&self) -> MergePolicy {
        self.merge
    }

    /// Change the merge policy. Pending blends are dropped when leaving blend mode.
    pub fn set_merge_policy(&mut self, merge: MergePolicy) -> ViewerResult<()> {
        merge.validate()?;
        if !merge.is_blend() {
            self.targets.clear();
        }
        self.merge = merge;
        Ok(())
    }

    /// The local world
    pub fn world(&self) -> &SimulationWorld {
        &self.world
    }

    pub fn stats(&self) -> MirrorStats {
        self.stats
    }

    pub(crate) fn record_malformed(&mut self) {
        self.stats.malformed_frames += 1;
    }

    pub(crate) fn record_unknown(&mut self) {
        self.stats.unknown_messages += 1;
    }
}
