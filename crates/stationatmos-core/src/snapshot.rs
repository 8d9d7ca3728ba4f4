//! Synchronization snapshots
//!
//! A snapshot is the state a remote observer needs to show gas: one summary per
//! pipe net and per simulated tile. It is encoded with bincode behind a format
//! version so stale payloads are rejected instead of misread.

use crate::components::TilePos;
use crate::error::AtmosError;
use crate::grid::GridAtmosphere;
use crate::pipenet::{NetId, PipeNets};
use serde::{Deserialize, Serialize};
use stationatmos_logic::{GasMixture, GAS_COUNT};
use std::io::{Read, Write};

/// Version number for the snapshot format (increment when format changes)
pub const SNAPSHOT_VERSION: u32 = 1;

/// Moles, temperature and pressure of one mixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasSummary {
    pub moles: [f32; GAS_COUNT],
    pub temperature: f32,
    pub pressure: f32,
}

impl GasSummary {
    pub fn of(air: &GasMixture) -> Self {
        let mut moles = [0.0; GAS_COUNT];
        for (gas, amount) in air.iter() {
            moles[gas.index()] = amount;
        }
        Self {
            moles,
            temperature: air.temperature(),
            pressure: air.pressure(),
        }
    }

    pub fn total_moles(&self) -> f32 {
        self.moles.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetSummary {
    pub id: NetId,
    /// `(entity bits, node index)` of every member
    pub members: Vec<(u64, u32)>,
    pub volume: f32,
    pub gas: GasSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSummary {
    pub pos: TilePos,
    pub gas: GasSummary,
}

/// Per-net and per-tile gas state at one tick
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AtmosSnapshot {
    pub update_counter: u64,
    pub nets: Vec<NetSummary>,
    pub tiles: Vec<TileSummary>,
}

impl AtmosSnapshot {
    /// Summarize the live nets and simulated tiles.
    pub fn capture(nets: &PipeNets, grid: &GridAtmosphere) -> Self {
        let nets = nets
            .iter()
            .map(|(id, net)| NetSummary {
                id,
                members: net
                    .members
                    .iter()
                    .map(|m| (m.entity.to_bits().get(), m.index as u32))
                    .collect(),
                volume: net.air.volume(),
                gas: GasSummary::of(&net.air),
            })
            .collect();

        let tiles = grid
            .simulated_tiles()
            .into_iter()
            .filter_map(|pos| {
                grid.get_tile(pos).map(|air| TileSummary {
                    pos,
                    gas: GasSummary::of(air),
                })
            })
            .collect();

        Self {
            update_counter: grid.update_counter(),
            nets,
            tiles,
        }
    }

    pub fn total_moles(&self) -> f32 {
        let nets: f32 = self.nets.iter().map(|n| n.gas.total_moles()).sum();
        let tiles: f32 = self.tiles.iter().map(|t| t.gas.total_moles()).sum();
        nets + tiles
    }

    /// Write the version header followed by the snapshot body.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), AtmosError> {
        bincode::serialize_into(&mut writer, &SNAPSHOT_VERSION)?;
        bincode::serialize_into(&mut writer, self)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, AtmosError> {
        let version: u32 = bincode::deserialize_from(&mut reader)?;
        if version != SNAPSHOT_VERSION {
            return Err(AtmosError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: version,
            });
        }
        Ok(bincode::deserialize_from(&mut reader)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, AtmosError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, AtmosError> {
        Self::read_from(bytes)
    }
}
