//! Integration tests for the registry and broadcast channel together

use std::net::SocketAddr;

use tether_physics::{ObjectId, PhysicsConfig, SimulationWorld};
use tether_protocol::{decode, LifecycleEvent, ServerMessage};
use tether_server::*;
use tokio::sync::mpsc;

fn peer() -> SocketAddr {
    "127.0.0.1:50000".parse().unwrap()
}

fn registry(cap: usize) -> ObjectRegistry {
    let world = SimulationWorld::new(PhysicsConfig::default()).unwrap();
    ObjectRegistry::new(world, cap, SpawnTemplate::default().descriptor())
}

fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        messages.push(decode(&frame).unwrap().unwrap());
    }
    messages
}

#[test]
fn test_spawn_301_evicts_first() {
    let mut registry = registry(MAX_POPULATION);
    let mut channel = BroadcastChannel::new();
    // Room for every add plus the eviction
    let (tx, mut rx) = mpsc::channel(302);
    channel.on_connect(PendingViewer::new(peer(), tx), &[]).unwrap();

    let mut spawned = Vec::new();
    for _ in 0..301 {
        spawned.push(registry.spawn_on_timer(&mut channel).unwrap());
    }

    assert_eq!(registry.len(), 300);
    assert!(!registry.contains(spawned[0]));
    assert!(registry.contains(spawned[300]));

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 302);
    // The eviction follows the add that caused it
    match &messages[300] {
        ServerMessage::AddObject(add) => assert_eq!(add.id, spawned[300]),
        other => panic!("expected add, got {:?}", other),
    }
    assert_eq!(messages[301], ServerMessage::remove(spawned[0]));

    // Ground plane plus live bodies, nothing orphaned
    assert_eq!(registry.world().integrator_body_count(), 301);
    assert_eq!(registry.world().collider_count(), 301);
}

#[test]
fn test_population_never_exceeds_cap() {
    let mut registry = registry(7);
    let mut events: Vec<LifecycleEvent> = Vec::new();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;

    for _ in 0..500 {
        // xorshift
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;

        if seed % 4 == 0 && !registry.is_empty() {
            let ids: Vec<ObjectId> = registry.live_ids().copied().collect();
            let victim = ids[(seed as usize / 4) % ids.len()];
            assert!(registry.remove_explicit(victim, &mut events));
        } else {
            registry.spawn_on_timer(&mut events).unwrap();
        }

        assert!(registry.len() <= 7);
        assert_eq!(registry.world().len(), registry.len());
        assert_eq!(registry.world().integrator_body_count(), registry.len() + 1);
    }

    let stats = registry.stats();
    assert_eq!(
        stats.spawned - stats.evicted - stats.removed,
        registry.len() as u64
    );
}

#[test]
fn test_eviction_order_matches_spawn_order() {
    let mut registry = registry(3);
    let mut events: Vec<LifecycleEvent> = Vec::new();

    let spawned: Vec<ObjectId> = (0..10)
        .map(|_| registry.spawn_on_timer(&mut events).unwrap())
        .collect();

    let evicted: Vec<ObjectId> = events
        .iter()
        .filter(|e| e.is_remove())
        .map(LifecycleEvent::id)
        .collect();
    assert_eq!(evicted, spawned[..7].to_vec());
}

#[test]
fn test_remove_never_precedes_add() {
    let mut registry = registry(2);
    let mut events: Vec<LifecycleEvent> = Vec::new();
    for _ in 0..20 {
        registry.spawn_on_timer(&mut events).unwrap();
    }

    let mut added = std::collections::HashSet::new();
    for event in &events {
        match event {
            LifecycleEvent::Add(body) => {
                added.insert(body.id);
            }
            LifecycleEvent::Remove(id) => assert!(added.contains(id)),
        }
    }
}

#[test]
fn test_late_viewer_only_learns_live_objects() {
    let mut registry = registry(2);
    let mut channel = BroadcastChannel::new();

    let first = registry.spawn_on_timer(&mut channel).unwrap();
    let second = registry.spawn_on_timer(&mut channel).unwrap();
    let third = registry.spawn_on_timer(&mut channel).unwrap();
    registry.remove_explicit(second, &mut channel);

    let (tx, mut rx) = outbound_queue(registry.max_population());
    channel
        .on_connect(PendingViewer::new(peer(), tx), &registry.live_bodies())
        .unwrap();

    // Poses follow catch-up on the same queue
    channel.broadcast_poses(&registry.snapshot());

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 2);
    match &messages[0] {
        ServerMessage::AddObject(add) => assert_eq!(add.id, third),
        other => panic!("expected catch-up add, got {:?}", other),
    }
    match &messages[1] {
        ServerMessage::UpdatePoses(update) => {
            assert_eq!(update.poses.len(), 1);
            assert!(update.poses.contains_key(&third));
            assert!(!update.poses.contains_key(&first));
        }
        other => panic!("expected poses, got {:?}", other),
    }
}

#[test]
fn test_catch_up_carries_current_pose() {
    let mut registry = registry(10);
    let mut channel = BroadcastChannel::new();
    let id = registry.spawn_on_timer(&mut channel).unwrap();

    for _ in 0..30 {
        registry.step(1.0 / 60.0, 1.0 / 60.0, 3);
    }

    let (tx, mut rx) = outbound_queue(registry.max_population());
    channel
        .on_connect(PendingViewer::new(peer(), tx), &registry.live_bodies())
        .unwrap();

    let messages = drain(&mut rx);
    let current = registry.world().pose(id).unwrap();
    match &messages[0] {
        ServerMessage::AddObject(add) => {
            approx::assert_relative_eq!(add.position.x, current.position[0], epsilon = 1.0e-5);
            // Moving along +x at 10 m/s from the origin
            assert!(add.position.x > 1.0);
        }
        other => panic!("expected add, got {:?}", other),
    }
}
