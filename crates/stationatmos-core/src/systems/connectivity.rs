//! Pipe-net rebuild.
//!
//! Runs at the start of a tick whenever topology is dirty. Every existing net
//! hands its gas back to its members, volume-proportionally, then the flood
//! fill regroups the nodes and each group of two or more forms a fresh net by
//! merging its members' local gas once. Gas is neither created nor lost.

use crate::components::{Anchored, NodeContainer, Position, Rotation};
use crate::pipenet::{NetId, NodeRef, PipeNets};
use hecs::{Entity, World};
use stationatmos_logic::network::{connected_groups, NodeSpec};
use stationatmos_logic::{GasMixture, PipeDirection};
use std::collections::HashMap;

/// What a rebuild did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub nodes: usize,
    pub nets: usize,
    pub isolated: usize,
}

/// Hand every net's gas back to its live members and clear their net ids.
///
/// Each member takes `volume / remaining_volume` of what is left, so the last
/// one takes the exact remainder. Node ids pointing at no live net are
/// cleared as well.
fn dissolve_nets(world: &mut World, nets: &mut PipeNets) {
    let mut drained = nets.drain();
    let slots: HashMap<NetId, usize> = drained
        .iter()
        .enumerate()
        .map(|(slot, (id, _))| (*id, slot))
        .collect();

    let mut remaining = vec![0.0f32; drained.len()];
    for (entity, container) in world.query_mut::<&mut NodeContainer>() {
        for (index, node) in container.nodes.iter().enumerate() {
            if let Some(&slot) = node.net.as_ref().and_then(|id| slots.get(id)) {
                if drained[slot].1.contains(NodeRef::new(entity, index)) {
                    remaining[slot] += node.volume();
                }
            }
        }
    }

    for (entity, container) in world.query_mut::<&mut NodeContainer>() {
        for (index, node) in container.nodes.iter_mut().enumerate() {
            let Some(id) = node.net.take() else {
                continue;
            };
            let Some(&slot) = slots.get(&id) else {
                continue;
            };
            let net = &mut drained[slot].1;
            if !net.contains(NodeRef::new(entity, index)) || remaining[slot] <= 0.0 {
                continue;
            }
            let volume = node.volume();
            let ratio = if remaining[slot] - volume <= remaining[slot] * 1e-6 {
                1.0
            } else {
                volume / remaining[slot]
            };
            remaining[slot] -= volume;
            let portion = net.air.remove_ratio(ratio);
            node.air.merge(&portion);
        }
    }
}

struct NodeEntry {
    entity: Entity,
    x: i32,
    y: i32,
    turns: i32,
    anchored: bool,
    nodes: Vec<(PipeDirection, bool)>,
}

/// Rebuild every pipe net from scratch.
pub fn rebuild_pipe_nets(world: &mut World, nets: &mut PipeNets) -> RebuildStats {
    dissolve_nets(world, nets);

    let mut entries: Vec<NodeEntry> = Vec::new();
    for (entity, (container, position, rotation, anchored)) in world
        .query::<(&NodeContainer, &Position, Option<&Rotation>, Option<&Anchored>)>()
        .iter()
    {
        entries.push(NodeEntry {
            entity,
            x: position.tile.x,
            y: position.tile.y,
            turns: rotation.map(|r| r.0).unwrap_or(0),
            anchored: anchored.is_some(),
            nodes: container
                .nodes
                .iter()
                .map(|n| (n.directions, n.connection_enabled && n.volume() > 0.0))
                .collect(),
        });
    }
    entries.sort_by_key(|entry| entry.entity.to_bits());

    let mut refs: Vec<NodeRef> = Vec::new();
    let mut specs: Vec<NodeSpec> = Vec::new();
    for entry in &entries {
        for (index, (directions, enabled)) in entry.nodes.iter().enumerate() {
            refs.push(NodeRef::new(entry.entity, index));
            specs.push(NodeSpec {
                x: entry.x,
                y: entry.y,
                directions: directions.rotated(entry.turns),
                enabled: entry.anchored && *enabled,
            });
        }
    }

    let groups = connected_groups(&specs);
    let mut stats = RebuildStats {
        nodes: specs.len(),
        ..Default::default()
    };

    for group in groups {
        if group.len() < 2 {
            stats.isolated += 1;
            continue;
        }
        let members: Vec<NodeRef> = group.iter().map(|&i| refs[i]).collect();
        let id = nets.create(GasMixture::new(0.0), members.clone());

        let mut air = GasMixture::new(0.0);
        let mut volume = 0.0;
        for member in &members {
            let Ok(mut container) = world.get::<&mut NodeContainer>(member.entity) else {
                continue;
            };
            let Some(node) = container.nodes.get_mut(member.index) else {
                continue;
            };
            volume += node.volume();
            air.merge(&node.air);
            node.air.clear();
            node.net = Some(id);
        }
        air.set_volume(volume);

        if let Some(net) = nets.get_mut(id) {
            net.air = air;
        }
        stats.nets += 1;
    }

    nets.clear_dirty();
    log::debug!(
        "Rebuilt pipe nets: {} nodes, {} nets, {} isolated",
        stats.nodes,
        stats.nets,
        stats.isolated
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{PipeNode, TilePos};
    use stationatmos_logic::constants::T20C;
    use stationatmos_logic::Gas;

    fn spawn_pipe(world: &mut World, x: i32, volume: f32, oxygen: f32) -> Entity {
        let air = GasMixture::new(volume)
            .with_temperature(T20C)
            .with_moles(Gas::Oxygen, oxygen);
        let node = PipeNode::new("pipe", PipeDirection::LATERAL)
            .with_volume(volume)
            .with_air(&air);
        world.spawn((
            Position::new(TilePos::new(x, 0)),
            NodeContainer::new(vec![node]),
            Anchored,
        ))
    }

    fn local_moles(world: &World) -> f32 {
        world
            .query::<&NodeContainer>()
            .iter()
            .map(|(_, c)| c.local_moles())
            .sum()
    }

    fn node_moles(world: &World, entity: Entity) -> f32 {
        world
            .get::<&NodeContainer>(entity)
            .map(|c| c.nodes[0].air.total_moles())
            .unwrap_or(-1.0)
    }

    #[test]
    fn test_join_merges_and_zeroes_locals() {
        let mut world = World::new();
        let a = spawn_pipe(&mut world, 0, 10.0, 4.0);
        let b = spawn_pipe(&mut world, 1, 10.0, 6.0);
        let mut nets = PipeNets::new();

        let stats = rebuild_pipe_nets(&mut world, &mut nets);

        assert_eq!(stats.nets, 1);
        let (_, net) = nets.iter().next().unwrap();
        assert!((net.air.total_moles() - 10.0).abs() < 1e-4);
        assert_eq!(net.air.volume(), 20.0);
        assert_eq!(local_moles(&world), 0.0);
        for e in [a, b] {
            let container = world.get::<&NodeContainer>(e).unwrap();
            assert!(container.nodes[0].is_networked());
        }
    }

    #[test]
    fn test_unanchor_splits_back_out() {
        let mut world = World::new();
        let a = spawn_pipe(&mut world, 0, 10.0, 4.0);
        let b = spawn_pipe(&mut world, 1, 10.0, 6.0);
        let mut nets = PipeNets::new();
        rebuild_pipe_nets(&mut world, &mut nets);

        world.remove_one::<Anchored>(a).unwrap();
        let stats = rebuild_pipe_nets(&mut world, &mut nets);

        assert_eq!(stats.nets, 0);
        assert_eq!(stats.isolated, 2);
        assert!(nets.is_empty());
        assert!((local_moles(&world) - 10.0).abs() < 1e-4);
        assert!((node_moles(&world, a) - 5.0).abs() < 1e-4);
        assert!((node_moles(&world, b) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_split_is_volume_proportional() {
        let mut world = World::new();
        let small = spawn_pipe(&mut world, 0, 10.0, 0.0);
        let large = spawn_pipe(&mut world, 1, 20.0, 9.0);
        let mut nets = PipeNets::new();
        rebuild_pipe_nets(&mut world, &mut nets);

        world.remove_one::<Anchored>(large).unwrap();
        rebuild_pipe_nets(&mut world, &mut nets);

        assert!((node_moles(&world, small) - 3.0).abs() < 1e-4);
        assert!((node_moles(&world, large) - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_rebuild_twice_is_stable() {
        let mut world = World::new();
        for x in 0..4 {
            spawn_pipe(&mut world, x, 10.0, 1.0);
        }
        let mut nets = PipeNets::new();
        rebuild_pipe_nets(&mut world, &mut nets);
        let first = nets.total_moles();
        rebuild_pipe_nets(&mut world, &mut nets);
        assert_eq!(nets.len(), 1);
        assert!((nets.total_moles() - first).abs() < 1e-4);
        assert!(!nets.is_dirty());
    }
}
