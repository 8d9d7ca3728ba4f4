//! Pure gas simulation logic for StationAtmos.
//!
//! Everything here works on plain values: gas mixtures, direction masks and
//! node positions. There is no ECS, no grid and no clock, which keeps every
//! rule unit-testable. `stationatmos-core` owns the entities and decides
//! which mixtures a device touches; this crate decides what happens to them.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`constants`] | Physical constants, thresholds and device limits |
//! | [`gas`] | Gas species and their specific heats |
//! | [`mixture`] | `GasMixture`: merge, remove, pressure, pumping helpers |
//! | [`direction`] | Cardinal directions and pipe connection masks |
//! | [`network`] | Connected-group flood fill over pipe nodes |
//! | [`devices`] | Per-tick transfer rules for pumps, filters, vents and friends |

pub mod constants;
pub mod devices;
pub mod direction;
pub mod gas;
pub mod mixture;
pub mod network;

pub use direction::{Direction, PipeDirection};
pub use gas::{Gas, GAS_COUNT};
pub use mixture::GasMixture;
