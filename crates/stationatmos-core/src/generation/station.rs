//! Station generation - a room with a supply line and a return line
//!
//! ```text
//!   y = h      . . . . . . . . . . space border
//!   y = h-1  T ═ ╦ ═ ═ ═ ╦ ═ ═ ═   return line, T = tank in space
//!   y = h-2      S       S         scrubbers
//!   ...                            room, standard air
//!   y = 1        V   V       V     vents
//!   y = 0      G ═ ╩ ═ ╩ ═ ═ ╩ ═   supply line, G = generator
//! ```

use crate::components::TilePos;
use crate::engine::AtmosEngine;
use crate::error::AtmosError;
use crate::prototype::PrototypeSet;
use hecs::Entity;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use stationatmos_logic::constants::{CELL_VOLUME, T20C};
use stationatmos_logic::{Gas, GasMixture};

/// Configuration for station generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Room width in tiles
    pub width: i32,
    /// Room height in tiles
    pub height: i32,
    pub vents: usize,
    pub scrubbers: usize,
    /// Room tiles seeded with extra carbon dioxide
    pub contaminated_tiles: usize,
    pub contamination_moles: f32,
    /// Feed the supply line from an oxygen generator
    pub generator: bool,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            width: 12,
            height: 8,
            vents: 3,
            scrubbers: 2,
            contaminated_tiles: 6,
            contamination_moles: 50.0,
            generator: true,
        }
    }
}

impl StationConfig {
    pub fn validate(&self) -> Result<(), AtmosError> {
        let fail = |msg: String| Err(AtmosError::InvalidConfig(msg));
        if self.width < 4 || self.height < 4 {
            return fail(format!(
                "room must be at least 4x4, got {}x{}",
                self.width, self.height
            ));
        }
        if self.vents > (self.width - 1) as usize {
            return fail(format!(
                "{} vents do not fit a supply line of {}",
                self.vents,
                self.width - 1
            ));
        }
        if self.scrubbers > self.width as usize {
            return fail(format!(
                "{} scrubbers do not fit a return line of {}",
                self.scrubbers, self.width
            ));
        }
        if self.contaminated_tiles > (self.width * self.height) as usize {
            return fail(format!(
                "{} contaminated tiles in a room of {}",
                self.contaminated_tiles,
                self.width * self.height
            ));
        }
        if !self.contamination_moles.is_finite() || self.contamination_moles < 0.0 {
            return fail(format!("contamination of {} mol", self.contamination_moles));
        }
        Ok(())
    }
}

/// Entities and tiles produced by `generate_station`
#[derive(Debug, Clone, Default)]
pub struct StationLayout {
    pub room: Vec<TilePos>,
    pub generator: Option<Entity>,
    pub supply_pipes: Vec<Entity>,
    pub return_pipes: Vec<Entity>,
    pub vents: Vec<Entity>,
    pub scrubbers: Vec<Entity>,
    pub tank: Option<Entity>,
}

impl StationLayout {
    pub fn device_count(&self) -> usize {
        self.vents.len() + self.scrubbers.len() + usize::from(self.generator.is_some())
    }
}

fn pick<T: Ord>(rng: &mut impl Rng, mut candidates: Vec<T>, count: usize) -> Vec<T> {
    candidates.shuffle(rng);
    candidates.truncate(count);
    candidates.sort();
    candidates
}

/// Generate a station room in the engine
pub fn generate_station(
    engine: &mut AtmosEngine,
    prototypes: &PrototypeSet,
    config: &StationConfig,
    rng: &mut impl Rng,
) -> Result<StationLayout, AtmosError> {
    config.validate()?;
    let (w, h) = (config.width, config.height);
    let mut layout = StationLayout::default();

    // Room and its space border
    for y in -1..=h {
        for x in -1..=w {
            let pos = TilePos::new(x, y);
            if x < 0 || y < 0 || x >= w || y >= h {
                engine.set_space(pos);
            } else {
                engine.set_tile(pos, GasMixture::standard_air(CELL_VOLUME, T20C));
                layout.room.push(pos);
            }
        }
    }

    for pos in pick(rng, layout.room.clone(), config.contaminated_tiles) {
        if let Some(air) = engine.tile_air_mut(pos) {
            air.adjust_moles(Gas::CarbonDioxide, config.contamination_moles);
        }
    }

    // Supply line
    let vent_columns = pick(rng, (1..w).collect(), config.vents);
    if config.generator {
        layout.generator =
            Some(engine.spawn_prototype(prototypes, "oxygen_generator", TilePos::new(0, 0), 0)?);
    }
    for x in 1..w {
        let pos = TilePos::new(x, 0);
        let pipe = if vent_columns.contains(&x) {
            layout
                .vents
                .push(engine.spawn_prototype(prototypes, "air_vent", TilePos::new(x, 1), 0)?);
            engine.spawn_prototype(prototypes, "pipe_tjunction", pos, 0)?
        } else {
            engine.spawn_prototype(prototypes, "pipe_straight", pos, 1)?
        };
        layout.supply_pipes.push(pipe);
    }

    // Return line
    let scrubber_columns = pick(rng, (0..w).collect(), config.scrubbers);
    for x in 0..w {
        let pos = TilePos::new(x, h - 1);
        let pipe = if scrubber_columns.contains(&x) {
            layout.scrubbers.push(engine.spawn_prototype(
                prototypes,
                "air_scrubber",
                TilePos::new(x, h - 2),
                0,
            )?);
            engine.spawn_prototype(prototypes, "pipe_tjunction", pos, 2)?
        } else {
            engine.spawn_prototype(prototypes, "pipe_straight", pos, 1)?
        };
        layout.return_pipes.push(pipe);
    }
    layout.tank = Some(engine.spawn_prototype(
        prototypes,
        "gas_tank",
        TilePos::new(-1, h - 1),
        0,
    )?);

    log::info!(
        "Generated {}x{} station: {} vents, {} scrubbers",
        w,
        h,
        layout.vents.len(),
        layout.scrubbers.len()
    );
    Ok(layout)
}
