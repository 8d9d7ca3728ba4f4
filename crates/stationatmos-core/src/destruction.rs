//! Destruction behaviors - gas released when an entity breaks.
//!
//! These sit outside normal device operation and only use the public
//! `merge` API on tile and node mixtures.

use crate::components::{NodeContainer, Position};
use crate::engine::AtmosEngine;
use crate::error::AtmosError;
use crate::systems::rebuild_pipe_nets;
use hecs::Entity;
use serde::{Deserialize, Serialize};
use stationatmos_logic::GasMixture;

/// Gas spawned once when the entity is destroyed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnGasBehavior {
    pub mixture: GasMixture,
}

/// Release an entity's `SpawnGasBehavior` into its tile, or into its first
/// pipe node when the tile is not simulated. The behavior is consumed.
/// Returns the moles that landed somewhere.
pub fn trigger_spawn_gas(engine: &mut AtmosEngine, entity: Entity) -> Result<f32, AtmosError> {
    let pos = engine.world.get::<&Position>(entity)?.tile;
    let behavior = engine.world.remove_one::<SpawnGasBehavior>(entity)?;
    let moles = behavior.mixture.total_moles();

    if let Some(tile) = engine.tile_air_mut(pos) {
        tile.merge(&behavior.mixture);
        return Ok(moles);
    }

    let first_node = engine
        .world
        .get::<&NodeContainer>(entity)
        .ok()
        .and_then(|c| c.nodes.first().map(|n| n.name.clone()));
    if let Some(air) = first_node.and_then(|name| engine.node_air_mut(entity, &name)) {
        air.merge(&behavior.mixture);
        return Ok(moles);
    }

    log::debug!("Spawn gas of {:?} released into space", entity);
    Ok(0.0)
}

/// Release everything an entity's nodes hold into its tile. A networked node
/// gives up its volume share of the net. No-op when the tile is not simulated.
pub fn vent_entity_gas(engine: &mut AtmosEngine, entity: Entity) -> Result<f32, AtmosError> {
    let pos = engine.world.get::<&Position>(entity)?.tile;
    if engine.tile_air(pos).is_none() {
        return Ok(0.0);
    }

    let nodes: Vec<(String, f32)> = engine
        .world
        .get::<&NodeContainer>(entity)?
        .nodes
        .iter()
        .map(|n| (n.name.clone(), n.volume()))
        .collect();

    let mut released = GasMixture::new(0.0);
    for (name, volume) in nodes {
        let networked = engine.net_of(entity, &name).is_some();
        let Some(air) = engine.node_air_mut(entity, &name) else {
            continue;
        };
        let ratio = if networked && air.volume() > 0.0 {
            volume / air.volume()
        } else {
            1.0
        };
        released.merge(&air.remove_ratio(ratio));
    }

    let moles = released.total_moles();
    if let Some(tile) = engine.tile_air_mut(pos) {
        tile.merge(&released);
    }
    Ok(moles)
}

/// Break an entity: spawn its gas, vent its nodes, then despawn it.
///
/// The entity is cut out of its nets first so each node holds exactly its
/// share locally and nothing is left for `despawn` to destroy.
pub fn destroy_entity(engine: &mut AtmosEngine, entity: Entity) -> Result<f32, AtmosError> {
    let mut released = 0.0;
    if engine.world.get::<&SpawnGasBehavior>(entity).is_ok() {
        released += trigger_spawn_gas(engine, entity)?;
    }
    if engine.world.get::<&NodeContainer>(entity).is_ok() {
        engine.unanchor(entity)?;
        rebuild_pipe_nets(&mut engine.world, &mut engine.nets);
        released += vent_entity_gas(engine, entity)?;
    }
    engine.despawn(entity)?;
    log::info!("Destroyed {:?}, released {:.2} mol", entity, released);
    Ok(released)
}
