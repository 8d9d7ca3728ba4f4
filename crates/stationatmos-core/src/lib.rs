//! StationAtmos Core - Station Atmospherics Engine
//!
//! An ECS-based simulation of gas moving through pipe networks, devices and
//! open-air tiles on a station grid.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Pipes, pumps, vents, scrubbers and anything else holding gas
//! - **Components**: Pure data attached to entities (Position, NodeContainer, AtmosDevice, etc.)
//! - **Systems**: Net rebuilds, tile equalization and per-tick device updates
//!
//! Pipe nets and tile air live outside the world, in [`pipenet::PipeNets`] and
//! [`grid::GridAtmosphere`]. Gas math comes from `stationatmos-logic`.
//!
//! # Example
//!
//! ```rust,no_run
//! use stationatmos_core::prelude::*;
//! use stationatmos_core::generation::{generate_station, StationConfig};
//! use rand::SeedableRng;
//!
//! let mut engine = AtmosEngine::new();
//! let prototypes = PrototypeSet::builtin().unwrap();
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//!
//! // Build a room with its pipework
//! generate_station(&mut engine, &prototypes, &StationConfig::default(), &mut rng).unwrap();
//!
//! // Run simulation
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//! }
//! ```

pub mod components;
pub mod config;
pub mod destruction;
pub mod engine;
pub mod error;
pub mod generation;
pub mod grid;
pub mod pipenet;
pub mod prototype;
pub mod snapshot;
pub mod systems;

pub use error::AtmosError;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::AtmosConfig;
    pub use crate::engine::{AtmosEngine, TickReport};
    pub use crate::error::AtmosError;
    pub use crate::pipenet::NetId;
    pub use crate::prototype::PrototypeSet;
    pub use crate::snapshot::AtmosSnapshot;
    pub use stationatmos_logic::{Direction, Gas, GasMixture, PipeDirection};
}
