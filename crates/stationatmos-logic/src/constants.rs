//! Atmospherics constants - physical values, thresholds and device limits.
//!
//! Plain `f32` constants with no engine dependency. Both the ECS core and
//! the headless simtest read these.

/// Ideal gas constant in kPa·L/(K·mol).
pub const R: f32 = 8.314_462_6;

/// One standard atmosphere in kPa.
pub const ONE_ATMOSPHERE: f32 = 101.325;

/// Cosmic microwave background temperature. Nothing is ever colder.
pub const TCMB: f32 = 2.7;

/// 0°C in Kelvin.
pub const T0C: f32 = 273.15;

/// 20°C in Kelvin (room temperature).
pub const T20C: f32 = 293.15;

/// Volume of one grid tile's air, in liters.
pub const CELL_VOLUME: f32 = 2500.0;

/// Default volume of a single pipe node, in liters.
pub const DEFAULT_PIPE_VOLUME: f32 = 200.0;

/// Moles in a standard tile at one atmosphere and 20°C.
pub const MOLES_CELL_STANDARD: f32 = ONE_ATMOSPHERE * CELL_VOLUME / (T20C * R);

/// Standard oxygen fraction of breathable air.
pub const O2_STANDARD: f32 = 0.21;

/// Standard nitrogen fraction of breathable air.
pub const N2_STANDARD: f32 = 0.79;

/// Residues below this are treated as zero.
pub const GAS_MIN_MOLES: f32 = 0.000_000_05;

/// Floor for the heat capacity of any mixture.
pub const MINIMUM_HEAT_CAPACITY: f32 = 0.0003;

/// Temperature differences smaller than this are ignored when merging.
pub const MINIMUM_TEMPERATURE_DELTA_TO_CONSIDER: f32 = 0.5;

/// Pressure above which filters refuse to push more gas.
pub const MAX_OUTPUT_PRESSURE: f32 = 45.0 * ONE_ATMOSPHERE;

/// Scrubbers stop once their outlet reaches this pressure.
pub const SCRUBBER_MAX_OUTLET_PRESSURE: f32 = 50.0 * ONE_ATMOSPHERE;

/// Most moles a scrubbing (not siphoning) scrubber samples from a tile per tick.
pub const SCRUBBER_MAX_MOLES_PER_TICK: f32 = 1.0;

/// Default per-tick volume a pump or filter may draw from its inlet, in liters.
pub const MAX_TRANSFER_RATE: f32 = 200.0;

/// Pumps treat pressure gaps smaller than this as "target reached".
pub const PUMP_PRESSURE_EPSILON: f32 = 0.01;

/// Per-tick pressure delta ceiling for active vents, in kPa.
pub const VENT_MAX_PRESSURE_DELTA: f32 = 10_000.0;

/// Volume pumps refuse when the outlet is above this (unless overclocked).
pub const VOLUME_PUMP_MAX_OUTLET_PRESSURE: f32 = 9000.0;

/// Overclocked volume pumps can push against at most this back-pressure.
pub const VOLUME_PUMP_OVERCLOCK_MAX_BACKPRESSURE: f32 = 1000.0;

/// Minimum difference required by a release-style transfer.
pub const RELEASE_FRICTION_PRESSURE: f32 = 10.0;

/// Passive vents ignore differences smaller than this.
pub const PASSIVE_VENT_MIN_DELTA: f32 = 0.5;

/// Default simulation tick rate in Hz.
pub const ATMOS_TICK_RATE: f32 = 15.0;
