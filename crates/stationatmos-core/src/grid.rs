//! Grid atmosphere coordinator.
//!
//! Owns the tile air of one grid and the two device registries the tick loop
//! walks: pipe-net devices (one discrete step per tick) and atmos devices
//! (given the elapsed time since their last update). Registries keep
//! registration order.

use crate::components::TilePos;
use hecs::Entity;
use serde::{Deserialize, Serialize};
use stationatmos_logic::constants::CELL_VOLUME;
use stationatmos_logic::GasMixture;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    /// Open air that takes part in the simulation.
    Simulated,
    /// A wall or closed door: keeps its air but exposes none.
    AirBlocked,
    /// Hard vacuum. Holds nothing.
    Space,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileAtmosphere {
    pub kind: TileKind,
    pub air: GasMixture,
}

#[derive(Debug, Clone, Copy)]
struct AtmosDeviceEntry {
    entity: Entity,
    last_update: f64,
}

/// Per-grid tile air and device registries
#[derive(Debug, Default)]
pub struct GridAtmosphere {
    tiles: HashMap<TilePos, TileAtmosphere>,
    pipe_net_devices: Vec<Entity>,
    atmos_devices: Vec<AtmosDeviceEntry>,
    update_counter: u64,
    /// Simulated seconds at the start of the next tick.
    elapsed: f64,
}

impl GridAtmosphere {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Tiles ──────────────────────────────────────────────────────────

    /// Gas of a simulated tile. `None` for space, air-blocked or unknown tiles.
    pub fn get_tile(&self, pos: TilePos) -> Option<&GasMixture> {
        self.tiles
            .get(&pos)
            .filter(|t| t.kind == TileKind::Simulated)
            .map(|t| &t.air)
    }

    pub fn get_tile_mut(&mut self, pos: TilePos) -> Option<&mut GasMixture> {
        self.tiles
            .get_mut(&pos)
            .filter(|t| t.kind == TileKind::Simulated)
            .map(|t| &mut t.air)
    }

    pub fn tile_kind(&self, pos: TilePos) -> Option<TileKind> {
        self.tiles.get(&pos).map(|t| t.kind)
    }

    /// Make `pos` a simulated tile holding `air`. A zero volume becomes one cell.
    pub fn set_tile(&mut self, pos: TilePos, mut air: GasMixture) {
        if air.volume() <= 0.0 {
            air.set_volume(CELL_VOLUME);
        }
        self.tiles.insert(
            pos,
            TileAtmosphere {
                kind: TileKind::Simulated,
                air,
            },
        );
    }

    /// Open `pos` to space. Whatever air it held is gone.
    pub fn set_space(&mut self, pos: TilePos) {
        self.tiles.insert(
            pos,
            TileAtmosphere {
                kind: TileKind::Space,
                air: GasMixture::space(),
            },
        );
    }

    /// Block or unblock a tile. Returns false for space or unknown tiles.
    pub fn set_airblocked(&mut self, pos: TilePos, blocked: bool) -> bool {
        match self.tiles.get_mut(&pos) {
            Some(tile) if tile.kind != TileKind::Space => {
                tile.kind = if blocked {
                    TileKind::AirBlocked
                } else {
                    TileKind::Simulated
                };
                true
            }
            _ => false,
        }
    }

    /// Positions of simulated tiles, sorted.
    pub fn simulated_tiles(&self) -> Vec<TilePos> {
        let mut positions: Vec<TilePos> = self
            .tiles
            .iter()
            .filter(|(_, t)| t.kind == TileKind::Simulated)
            .map(|(p, _)| *p)
            .collect();
        positions.sort_unstable();
        positions
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Moles held by every non-space tile, blocked ones included.
    pub fn total_moles(&self) -> f32 {
        self.tiles
            .values()
            .filter(|t| t.kind != TileKind::Space)
            .map(|t| t.air.total_moles())
            .sum()
    }

    pub(crate) fn take_tile_air(&mut self, pos: TilePos) -> Option<GasMixture> {
        self.get_tile_mut(pos).map(std::mem::take)
    }

    pub(crate) fn return_tile_air(&mut self, pos: TilePos, air: GasMixture) {
        if let Some(tile) = self.tiles.get_mut(&pos) {
            tile.air = air;
        }
    }

    // ── Device registries ──────────────────────────────────────────────

    /// Register a per-tick device. Returns false if it was already registered.
    pub fn add_pipe_net_device(&mut self, entity: Entity) -> bool {
        if self.pipe_net_devices.contains(&entity) {
            return false;
        }
        self.pipe_net_devices.push(entity);
        true
    }

    pub fn remove_pipe_net_device(&mut self, entity: Entity) -> bool {
        let before = self.pipe_net_devices.len();
        self.pipe_net_devices.retain(|e| *e != entity);
        self.pipe_net_devices.len() != before
    }

    /// Register a delta-time device. Its first `dt` counts from now.
    pub fn add_atmos_device(&mut self, entity: Entity) -> bool {
        if self.atmos_devices.iter().any(|d| d.entity == entity) {
            return false;
        }
        self.atmos_devices.push(AtmosDeviceEntry {
            entity,
            last_update: self.elapsed,
        });
        true
    }

    pub fn remove_atmos_device(&mut self, entity: Entity) -> bool {
        let before = self.atmos_devices.len();
        self.atmos_devices.retain(|d| d.entity != entity);
        self.atmos_devices.len() != before
    }

    pub fn pipe_net_devices(&self) -> &[Entity] {
        &self.pipe_net_devices
    }

    pub fn atmos_devices(&self) -> impl Iterator<Item = Entity> + '_ {
        self.atmos_devices.iter().map(|d| d.entity)
    }

    pub fn is_registered(&self, entity: Entity) -> bool {
        self.pipe_net_devices.contains(&entity)
            || self.atmos_devices.iter().any(|d| d.entity == entity)
    }

    /// Seconds since the device last ran, as of `now`, and reset its clock.
    pub(crate) fn take_atmos_dt(&mut self, entity: Entity, now: f64) -> f32 {
        match self.atmos_devices.iter_mut().find(|d| d.entity == entity) {
            Some(entry) => {
                let dt = (now - entry.last_update).max(0.0);
                entry.last_update = now;
                dt as f32
            }
            None => 0.0,
        }
    }

    // ── Clock ──────────────────────────────────────────────────────────

    /// Ticks processed so far.
    pub fn update_counter(&self) -> u64 {
        self.update_counter
    }

    /// Simulated seconds processed so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub(crate) fn advance(&mut self, interval: f64) {
        self.update_counter += 1;
        self.elapsed += interval;
    }
}
