//! Integration tests for pipe-net topology changes through the engine.
//!
//! Exercises: spawn → tick (join) → unanchor / despawn / move → tick (split)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stationatmos_core::prelude::*;
use stationatmos_logic::constants::T20C;

// ── Helpers ────────────────────────────────────────────────────────────

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 1e-3 * a.abs().max(b.abs()).max(1.0)
}

fn lateral(volume: f32, gas: Gas, moles: f32) -> Vec<PipeNode> {
    let air = GasMixture::new(volume)
        .with_temperature(T20C)
        .with_moles(gas, moles);
    vec![PipeNode::new("pipe", PipeDirection::LATERAL)
        .with_volume(volume)
        .with_air(&air)]
}

fn moles(engine: &AtmosEngine, entity: hecs::Entity) -> f32 {
    engine
        .node_air(entity, "pipe")
        .map(|a| a.total_moles())
        .unwrap_or(-1.0)
}

// ── Join / split ───────────────────────────────────────────────────────

#[test]
fn test_two_pipe_roundtrip_conserves_species() {
    let mut engine = AtmosEngine::new();
    let a = engine.spawn_pipe(TilePos::new(0, 0), lateral(10.0, Gas::Oxygen, 4.0));
    let b = engine.spawn_pipe(TilePos::new(1, 0), lateral(10.0, Gas::Plasma, 2.0));

    engine.tick();
    let net = engine.node_air(a, "pipe").unwrap();
    assert_eq!(net.volume(), 20.0);
    assert!(close(net.moles(Gas::Oxygen), 4.0));
    assert!(close(net.moles(Gas::Plasma), 2.0));

    engine.unanchor(a).unwrap();
    engine.tick();

    let air_a = engine.node_air(a, "pipe").unwrap();
    let air_b = engine.node_air(b, "pipe").unwrap();
    assert!(close(air_a.moles(Gas::Oxygen) + air_b.moles(Gas::Oxygen), 4.0));
    assert!(close(air_a.moles(Gas::Plasma) + air_b.moles(Gas::Plasma), 2.0));
    assert_eq!(air_a.volume(), 10.0);
    assert_eq!(air_b.volume(), 10.0);
}

#[test]
fn test_removing_middle_pipe_splits_net() {
    let mut engine = AtmosEngine::new();
    let left = engine.spawn_pipe(TilePos::new(0, 0), lateral(10.0, Gas::Nitrogen, 3.0));
    let middle = engine.spawn_pipe(TilePos::new(1, 0), lateral(10.0, Gas::Nitrogen, 3.0));
    let right = engine.spawn_pipe(TilePos::new(2, 0), lateral(10.0, Gas::Nitrogen, 3.0));

    engine.tick();
    assert_eq!(engine.net_count(), 1);
    let total = engine.total_moles();

    engine.unanchor(middle).unwrap();
    engine.tick();

    assert_eq!(engine.net_count(), 0);
    assert_ne!(engine.net_of(left, "pipe"), engine.net_of(right, "pipe"));
    assert!(close(engine.total_moles(), total));
    for e in [left, middle, right] {
        assert!(close(moles(&engine, e), 3.0));
    }
}

#[test]
fn test_removing_middle_of_long_line_leaves_two_nets() {
    let mut engine = AtmosEngine::new();
    let pipes: Vec<_> = (0..7)
        .map(|x| engine.spawn_pipe(TilePos::new(x, 0), lateral(20.0, Gas::Oxygen, 1.0)))
        .collect();
    engine.tick();
    let total = engine.total_moles();

    engine.unanchor(pipes[3]).unwrap();
    engine.tick();

    assert_eq!(engine.net_count(), 2);
    assert_eq!(engine.net_of(pipes[0], "pipe"), engine.net_of(pipes[2], "pipe"));
    assert_eq!(engine.net_of(pipes[4], "pipe"), engine.net_of(pipes[6], "pipe"));
    assert!(close(engine.total_moles(), total));
    let left = engine.node_air(pipes[0], "pipe").unwrap();
    assert_eq!(left.volume(), 60.0);
    assert!(close(left.total_moles(), 3.0));
}

#[test]
fn test_despawned_entity_takes_volume_share() {
    let mut engine = AtmosEngine::new();
    let pipes: Vec<_> = (0..4)
        .map(|x| engine.spawn_pipe(TilePos::new(x, 0), lateral(10.0, Gas::Oxygen, 2.0)))
        .collect();
    engine.tick();

    engine.despawn(pipes[3]).unwrap();
    engine.tick();

    assert_eq!(engine.net_count(), 1);
    assert!(close(engine.total_moles(), 6.0));
    assert_eq!(engine.node_air(pipes[0], "pipe").unwrap().volume(), 30.0);
}

#[test]
fn test_rotation_changes_connectivity() {
    let mut engine = AtmosEngine::new();
    let prototypes = PrototypeSet::builtin().unwrap();
    let a = engine
        .spawn_prototype(&prototypes, "pipe_straight", TilePos::new(0, 0), 0)
        .unwrap();
    let b = engine
        .spawn_prototype(&prototypes, "pipe_straight", TilePos::new(1, 0), 1)
        .unwrap();
    engine.tick();
    assert_eq!(engine.net_count(), 0);

    engine.set_rotation(a, 1).unwrap();
    engine.tick();
    assert_eq!(engine.net_count(), 1);
    assert_eq!(engine.net_of(a, "pipe"), engine.net_of(b, "pipe"));
}

// ── Randomized conservation ────────────────────────────────────────────

#[test]
fn test_random_topology_churn_conserves_moles() {
    let mut rng = StdRng::seed_from_u64(0xA7);
    let mut engine = AtmosEngine::new();
    let mut pipes = Vec::new();
    for y in 0..4 {
        for x in 0..6 {
            let volume = rng.gen_range(5.0..50.0);
            let amount = rng.gen_range(0.0..10.0);
            let nodes = vec![PipeNode::new("pipe", PipeDirection::FOURWAY)
                .with_volume(volume)
                .with_air(
                    &GasMixture::new(volume)
                        .with_temperature(T20C)
                        .with_moles(Gas::Nitrogen, amount),
                )];
            pipes.push(engine.spawn_pipe(TilePos::new(x, y), nodes));
        }
    }
    let total = engine.total_moles();

    for _ in 0..60 {
        let target = pipes[rng.gen_range(0..pipes.len())];
        match rng.gen_range(0..3) {
            0 => engine.unanchor(target).unwrap(),
            1 => engine.anchor(target).unwrap(),
            _ => engine
                .set_node_connections(target, "pipe", rng.gen_bool(0.5))
                .unwrap(),
        }
        engine.tick();
        assert!(close(engine.total_moles(), total));
        for &pipe in &pipes {
            let air = engine.node_air(pipe, "pipe").unwrap();
            assert!(air.iter().all(|(_, m)| m >= 0.0));
        }
    }
}
