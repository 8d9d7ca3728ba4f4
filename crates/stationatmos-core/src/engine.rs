//! Atmos engine - main entry point for running the simulation

use crate::components::*;
use crate::config::AtmosConfig;
use crate::destruction::SpawnGasBehavior;
use crate::error::AtmosError;
use crate::grid::GridAtmosphere;
use crate::pipenet::{NetId, NodeRef, PipeNets};
use crate::prototype::PrototypeSet;
use crate::snapshot::AtmosSnapshot;
use crate::systems::*;
use hecs::{Entity, World};
use stationatmos_logic::GasMixture;

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Set when topology was dirty and the nets were rebuilt.
    pub rebuilt: Option<RebuildStats>,
    pub tile_moles_moved: f32,
    pub devices_run: usize,
    pub atmos_devices_run: usize,
}

/// Main simulation engine
pub struct AtmosEngine {
    /// ECS world holding pipe, device and behavior components
    pub world: World,
    /// Live pipe nets
    pub nets: PipeNets,
    /// Tile air and device registries
    pub grid: GridAtmosphere,
    config: AtmosConfig,
    /// Frame time not yet consumed by whole ticks
    accumulator: f32,
}

impl Default for AtmosEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AtmosEngine {
    /// Create an empty engine with default config
    pub fn new() -> Self {
        Self::with_config(AtmosConfig::default())
    }

    pub fn with_config(config: AtmosConfig) -> Self {
        Self {
            world: World::new(),
            nets: PipeNets::new(),
            grid: GridAtmosphere::new(),
            config,
            accumulator: 0.0,
        }
    }

    pub fn config(&self) -> &AtmosConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: AtmosConfig) {
        self.config = config;
    }

    // ── Spawning ───────────────────────────────────────────────────────

    /// Spawn an anchored pipe entity. It joins a net on the next tick.
    pub fn spawn_pipe(&mut self, pos: TilePos, nodes: Vec<PipeNode>) -> Entity {
        let entity = self.world.spawn((
            Position::new(pos),
            Rotation(0),
            NodeContainer::new(nodes),
            Anchored,
        ));
        self.nets.mark_dirty();
        entity
    }

    /// Spawn an anchored device, resolve its ports and register it.
    pub fn spawn_device(&mut self, pos: TilePos, nodes: Vec<PipeNode>, kind: DeviceKind) -> Entity {
        self.spawn_device_rotated(pos, 0, nodes, kind)
    }

    fn spawn_device_rotated(
        &mut self,
        pos: TilePos,
        rotation: i32,
        nodes: Vec<PipeNode>,
        kind: DeviceKind,
    ) -> Entity {
        let entity = self.world.spawn((
            Position::new(pos),
            Rotation(rotation),
            NodeContainer::new(nodes),
            Anchored,
            AtmosDevice::new(kind),
        ));
        self.nets.mark_dirty();
        initialize_device(&self.world, entity);
        self.register_device(entity);
        entity
    }

    /// Spawn an entity from a prototype, rotated by `rotation` quarter turns.
    pub fn spawn_prototype(
        &mut self,
        set: &PrototypeSet,
        id: &str,
        pos: TilePos,
        rotation: i32,
    ) -> Result<Entity, AtmosError> {
        let proto = set.get(id)?;
        let nodes = proto.build_nodes();

        let entity = match &proto.device {
            Some(kind) => self.spawn_device_rotated(pos, rotation, nodes, kind.clone()),
            None => {
                let entity = self.spawn_pipe(pos, nodes);
                self.world.insert_one(entity, Rotation(rotation))?;
                entity
            }
        };

        if let Some(air) = &proto.spawn_gas {
            self.world.insert_one(
                entity,
                SpawnGasBehavior {
                    mixture: air.build(),
                },
            )?;
        }
        Ok(entity)
    }

    fn register_device(&mut self, entity: Entity) {
        let atmos = match self.world.get::<&AtmosDevice>(entity) {
            Ok(device) => device.kind.is_atmos_device(),
            Err(_) => return,
        };
        if atmos {
            self.grid.add_atmos_device(entity);
        } else {
            self.grid.add_pipe_net_device(entity);
        }
    }

    fn unregister_device(&mut self, entity: Entity) {
        self.grid.remove_pipe_net_device(entity);
        self.grid.remove_atmos_device(entity);
    }

    // ── Construction ───────────────────────────────────────────────────

    /// Fix an entity to the grid so its pipes can connect.
    pub fn anchor(&mut self, entity: Entity) -> Result<(), AtmosError> {
        if !self.world.contains(entity) {
            return Err(AtmosError::NoSuchEntity);
        }
        self.world.insert_one(entity, Anchored)?;
        self.register_device(entity);
        self.nets.mark_dirty();
        Ok(())
    }

    /// Free an entity from the grid. Its nodes leave their nets on the next tick.
    pub fn unanchor(&mut self, entity: Entity) -> Result<(), AtmosError> {
        if !self.world.contains(entity) {
            return Err(AtmosError::NoSuchEntity);
        }
        // Already loose is fine.
        let _ = self.world.remove_one::<Anchored>(entity);
        self.unregister_device(entity);
        self.nets.mark_dirty();
        Ok(())
    }

    pub fn move_entity(&mut self, entity: Entity, pos: TilePos) -> Result<(), AtmosError> {
        {
            let mut position = self.world.get::<&mut Position>(entity)?;
            position.tile = pos;
        }
        self.nets.mark_dirty();
        Ok(())
    }

    pub fn set_rotation(&mut self, entity: Entity, quarter_turns: i32) -> Result<(), AtmosError> {
        self.world.insert_one(entity, Rotation(quarter_turns))?;
        self.nets.mark_dirty();
        Ok(())
    }

    /// Remove an entity. Its nodes leave their nets first, and the gas that
    /// was their volume share goes with the entity.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), AtmosError> {
        if !self.world.contains(entity) {
            return Err(AtmosError::NoSuchEntity);
        }

        if let Ok(container) = self.world.get::<&NodeContainer>(entity) {
            for (index, node) in container.nodes.iter().enumerate() {
                let node_ref = NodeRef::new(entity, index);
                let Some(net) = node.net.and_then(|id| self.nets.get_mut(id)) else {
                    continue;
                };
                if !net.contains(node_ref) {
                    continue;
                }
                let net_volume = net.air.volume();
                if net_volume > 0.0 {
                    net.air.remove_ratio(node.volume() / net_volume);
                }
                net.air.set_volume((net_volume - node.volume()).max(0.0));
                net.members.retain(|m| *m != node_ref);
            }
        }

        self.unregister_device(entity);
        self.world.despawn(entity)?;
        self.nets.mark_dirty();
        Ok(())
    }

    /// Turn a device on or off. It keeps its ports and its registration.
    pub fn set_device_enabled(&mut self, entity: Entity, enabled: bool) -> Result<(), AtmosError> {
        let mut device = self.world.get::<&mut AtmosDevice>(entity)?;
        device.enabled = enabled;
        Ok(())
    }

    /// Switch a node's connections on or off (portable connectors).
    pub fn set_node_connections(
        &mut self,
        entity: Entity,
        node: &str,
        enabled: bool,
    ) -> Result<(), AtmosError> {
        let mut container = self.world.get::<&mut NodeContainer>(entity)?;
        let pipe = container
            .get_mut(node)
            .ok_or_else(|| AtmosError::NoSuchNode(node.to_string()))?;
        if pipe.connection_enabled != enabled {
            pipe.connection_enabled = enabled;
            self.nets.mark_dirty();
        }
        Ok(())
    }

    // ── Gas access ─────────────────────────────────────────────────────

    /// A copy of the gas a node currently uses: its net's when networked,
    /// its own otherwise.
    pub fn node_air(&self, entity: Entity, node: &str) -> Option<GasMixture> {
        let container = self.world.get::<&NodeContainer>(entity).ok()?;
        let index = container.index_of(node)?;
        let pipe = &container.nodes[index];
        let net = pipe
            .net
            .and_then(|id| self.nets.get(id))
            .filter(|n| n.contains(NodeRef::new(entity, index)));
        Some(match net {
            Some(net) => net.air.clone(),
            None => pipe.air.clone(),
        })
    }

    /// Mutable access to the gas a node currently uses.
    pub fn node_air_mut(&mut self, entity: Entity, node: &str) -> Option<&mut GasMixture> {
        let (index, net) = {
            let container = self.world.query_one_mut::<&NodeContainer>(entity).ok()?;
            let index = container.index_of(node)?;
            (index, container.nodes[index].net)
        };
        let node_ref = NodeRef::new(entity, index);
        let live_net = net.filter(|id| {
            self.nets
                .get(*id)
                .map(|n| n.contains(node_ref))
                .unwrap_or(false)
        });

        match live_net {
            Some(id) => self.nets.get_mut(id).map(|n| &mut n.air),
            None => {
                let container = self.world.query_one_mut::<&mut NodeContainer>(entity).ok()?;
                container.nodes.get_mut(index).map(|n| &mut n.air)
            }
        }
    }

    /// The net a node belongs to, if any.
    pub fn net_of(&self, entity: Entity, node: &str) -> Option<NetId> {
        let container = self.world.get::<&NodeContainer>(entity).ok()?;
        container
            .get(node)?
            .net
            .filter(|id| self.nets.contains(*id))
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn tile_air(&self, pos: TilePos) -> Option<&GasMixture> {
        self.grid.get_tile(pos)
    }

    pub fn tile_air_mut(&mut self, pos: TilePos) -> Option<&mut GasMixture> {
        self.grid.get_tile_mut(pos)
    }

    pub fn set_tile(&mut self, pos: TilePos, air: GasMixture) {
        self.grid.set_tile(pos, air);
    }

    pub fn set_space(&mut self, pos: TilePos) {
        self.grid.set_space(pos);
    }

    pub fn set_airblocked(&mut self, pos: TilePos, blocked: bool) -> bool {
        self.grid.set_airblocked(pos, blocked)
    }

    /// Moles in tiles, nets and isolated node buffers.
    pub fn total_moles(&self) -> f32 {
        let local: f32 = self
            .world
            .query::<&NodeContainer>()
            .iter()
            .map(|(_, c)| c.local_moles())
            .sum();
        self.grid.total_moles() + self.nets.total_moles() + local
    }

    // ── Simulation ─────────────────────────────────────────────────────

    /// Run exactly one simulation tick.
    ///
    /// Order: pending device init, net rebuild if topology is dirty, tile
    /// equalization, pipe-net devices, then atmos devices with their `dt`.
    pub fn tick(&mut self) -> TickReport {
        initialize_pending_devices(&self.world);

        let rebuilt = if self.nets.is_dirty() {
            Some(rebuild_pipe_nets(&mut self.world, &mut self.nets))
        } else {
            None
        };

        let tile_moles_moved = if self.config.tile_equalization {
            equalize_tiles(&mut self.grid)
        } else {
            0.0
        };

        let interval = self.config.tick_interval() as f64;
        let devices_run = process_pipe_net_devices(&self.world, &mut self.nets, &mut self.grid);
        let now = self.grid.elapsed() + interval;
        let atmos_devices_run =
            process_atmos_devices(&self.world, &mut self.nets, &mut self.grid, now);

        self.grid.advance(interval);

        TickReport {
            rebuilt,
            tile_moles_moved,
            devices_run,
            atmos_devices_run,
        }
    }

    /// Advance by `frame_time` seconds, running whole ticks at the configured
    /// rate. At most `max_frame_ticks` run per call; any further backlog is
    /// dropped. Returns the number of ticks run.
    pub fn update(&mut self, frame_time: f32) -> u32 {
        let interval = self.config.tick_interval();
        self.accumulator += frame_time.max(0.0);

        let mut ticks = 0;
        while self.accumulator >= interval && ticks < self.config.max_frame_ticks {
            self.tick();
            self.accumulator -= interval;
            ticks += 1;
        }

        if self.accumulator >= interval {
            log::debug!(
                "Atmos fell behind by {:.3}s, dropping backlog",
                self.accumulator
            );
            self.accumulator %= interval;
        }
        ticks
    }

    /// Ticks processed so far
    pub fn update_counter(&self) -> u64 {
        self.grid.update_counter()
    }

    /// Per-net and per-tile gas summaries for synchronization
    pub fn snapshot(&self) -> AtmosSnapshot {
        AtmosSnapshot::capture(&self.nets, &self.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationatmos_logic::constants::{CELL_VOLUME, T20C};
    use stationatmos_logic::{Gas, PipeDirection};

    fn pipe(volume: f32, gas: Gas, moles: f32) -> Vec<PipeNode> {
        let air = GasMixture::new(volume)
            .with_temperature(T20C)
            .with_moles(gas, moles);
        vec![PipeNode::new("pipe", PipeDirection::LATERAL)
            .with_volume(volume)
            .with_air(&air)]
    }

    #[test]
    fn test_two_pipes_join_and_split() {
        let mut engine = AtmosEngine::new();
        let a = engine.spawn_pipe(TilePos::new(0, 0), pipe(10.0, Gas::Oxygen, 3.0));
        let b = engine.spawn_pipe(TilePos::new(1, 0), pipe(10.0, Gas::Nitrogen, 5.0));

        engine.tick();
        assert_eq!(engine.net_count(), 1);
        let joined = engine.node_air(a, "pipe").unwrap();
        assert!((joined.total_moles() - 8.0).abs() < 1e-4);
        assert_eq!(joined.volume(), 20.0);
        assert_eq!(engine.net_of(a, "pipe"), engine.net_of(b, "pipe"));

        engine.unanchor(b).unwrap();
        engine.tick();
        assert_eq!(engine.net_count(), 0);
        let after_a = engine.node_air(a, "pipe").unwrap().total_moles();
        let after_b = engine.node_air(b, "pipe").unwrap().total_moles();
        assert!((after_a + after_b - 8.0).abs() < 1e-4);
        assert!((after_a - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_despawn_takes_its_share() {
        let mut engine = AtmosEngine::new();
        let a = engine.spawn_pipe(TilePos::new(0, 0), pipe(10.0, Gas::Oxygen, 6.0));
        let b = engine.spawn_pipe(TilePos::new(1, 0), pipe(20.0, Gas::Oxygen, 0.0));
        engine.tick();

        engine.despawn(b).unwrap();
        assert!((engine.total_moles() - 2.0).abs() < 1e-4);
        engine.tick();

        assert_eq!(engine.net_count(), 0);
        assert!((engine.node_air(a, "pipe").unwrap().total_moles() - 2.0).abs() < 1e-4);
        assert!(matches!(engine.despawn(b), Err(AtmosError::NoSuchEntity)));
    }

    #[test]
    fn test_disconnected_node_leaves_net() {
        let mut engine = AtmosEngine::new();
        let a = engine.spawn_pipe(TilePos::new(0, 0), pipe(10.0, Gas::Oxygen, 2.0));
        let b = engine.spawn_pipe(TilePos::new(1, 0), pipe(10.0, Gas::Oxygen, 2.0));
        engine.tick();
        assert!(engine.net_of(a, "pipe").is_some());

        engine.set_node_connections(b, "pipe", false).unwrap();
        engine.tick();
        assert!(engine.net_of(a, "pipe").is_none());
        assert!(matches!(
            engine.set_node_connections(b, "valve", true),
            Err(AtmosError::NoSuchNode(_))
        ));
    }

    #[test]
    fn test_move_reconnects() {
        let mut engine = AtmosEngine::new();
        let a = engine.spawn_pipe(TilePos::new(0, 0), pipe(10.0, Gas::Oxygen, 1.0));
        let b = engine.spawn_pipe(TilePos::new(5, 0), pipe(10.0, Gas::Oxygen, 1.0));
        engine.tick();
        assert_eq!(engine.net_count(), 0);

        engine.move_entity(b, TilePos::new(1, 0)).unwrap();
        engine.tick();
        assert_eq!(engine.net_count(), 1);
        assert_eq!(engine.net_of(a, "pipe"), engine.net_of(b, "pipe"));
    }

    #[test]
    fn test_node_air_mut_edits_the_net() {
        let mut engine = AtmosEngine::new();
        let a = engine.spawn_pipe(TilePos::new(0, 0), pipe(10.0, Gas::Oxygen, 1.0));
        let b = engine.spawn_pipe(TilePos::new(1, 0), pipe(10.0, Gas::Oxygen, 1.0));
        engine.tick();

        if let Some(air) = engine.node_air_mut(a, "pipe") {
            air.adjust_moles(Gas::Plasma, 4.0);
        }
        assert_eq!(engine.node_air(b, "pipe").unwrap().moles(Gas::Plasma), 4.0);
    }

    #[test]
    fn test_update_caps_catch_up() {
        let mut engine = AtmosEngine::new();
        engine.set_tile(TilePos::new(0, 0), GasMixture::standard_air(CELL_VOLUME, T20C));

        let interval = engine.config().tick_interval();
        assert_eq!(engine.update(interval * 0.5), 0);
        assert_eq!(engine.update(interval * 0.6), 1);
        assert_eq!(engine.update(interval * 100.0), engine.config().max_frame_ticks);
        assert_eq!(engine.update(0.0), 0);
        assert_eq!(engine.update_counter(), 1 + engine.config().max_frame_ticks as u64);
    }

    #[test]
    fn test_unanchored_device_is_unregistered() {
        let mut engine = AtmosEngine::new();
        let heater = engine.spawn_device(
            TilePos::new(0, 0),
            pipe(10.0, Gas::Oxygen, 1.0),
            DeviceKind::Heater {
                pipe: "pipe".into(),
                target_temperature: 500.0,
            },
        );
        assert!(engine.grid.is_registered(heater));

        engine.unanchor(heater).unwrap();
        assert!(!engine.grid.is_registered(heater));
        engine.tick();
        assert_eq!(engine.node_air(heater, "pipe").unwrap().temperature(), T20C);

        engine.anchor(heater).unwrap();
        engine.tick();
        assert_eq!(engine.node_air(heater, "pipe").unwrap().temperature(), 500.0);
    }

    #[test]
    fn test_device_can_be_switched_at_runtime() {
        let mut engine = AtmosEngine::new();
        let heater = engine.spawn_device(
            TilePos::new(0, 0),
            pipe(10.0, Gas::Oxygen, 1.0),
            DeviceKind::Heater {
                pipe: "pipe".into(),
                target_temperature: 500.0,
            },
        );
        engine.set_device_enabled(heater, false).unwrap();
        assert_eq!(engine.tick().devices_run, 0);
        assert_eq!(engine.node_air(heater, "pipe").unwrap().temperature(), T20C);

        engine.set_device_enabled(heater, true).unwrap();
        assert_eq!(engine.tick().devices_run, 1);
        assert_eq!(engine.node_air(heater, "pipe").unwrap().temperature(), 500.0);

        let plain = engine.spawn_pipe(TilePos::new(3, 0), pipe(10.0, Gas::Oxygen, 1.0));
        assert!(matches!(
            engine.set_device_enabled(plain, true),
            Err(AtmosError::NoSuchEntity)
        ));
    }
}
