//! Per-tick device transfer rules.
//!
//! Each function takes the mixtures a device is attached to plus its settings
//! and moves gas between them. None of them know about entities, nets or
//! tiles: the engine resolves ports to mixtures and calls in here. Every rule
//! is built from `remove`/`remove_ratio` + `merge`, so moles are conserved
//! unless a device explicitly creates gas (generator) or leaks it out.

use crate::constants::{
    MAX_OUTPUT_PRESSURE, MAX_TRANSFER_RATE, ONE_ATMOSPHERE, PASSIVE_VENT_MIN_DELTA,
    PUMP_PRESSURE_EPSILON, R, SCRUBBER_MAX_MOLES_PER_TICK, SCRUBBER_MAX_OUTLET_PRESSURE, T20C,
    VENT_MAX_PRESSURE_DELTA, VOLUME_PUMP_MAX_OUTLET_PRESSURE,
    VOLUME_PUMP_OVERCLOCK_MAX_BACKPRESSURE,
};
use crate::gas::Gas;
use crate::mixture::GasMixture;
use serde::{Deserialize, Serialize};

// ============================================================================
// PUMPS
// ============================================================================

/// Pressure pump: pushes gas until the outlet reaches `target_pressure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressurePumpSettings {
    pub target_pressure: f32,
    /// Most inlet volume (liters) drawn per tick.
    pub transfer_rate: f32,
}

impl Default for PressurePumpSettings {
    fn default() -> Self {
        Self {
            target_pressure: ONE_ATMOSPHERE,
            transfer_rate: MAX_TRANSFER_RATE,
        }
    }
}

/// Move gas from `inlet` to `outlet` toward the target pressure.
///
/// Transfers nothing once the outlet is at or above the target. The amount
/// is what PV = nRT says the outlet needs, capped at `transfer_rate` liters
/// of the inlet. Returns the moles moved.
pub fn pressure_pump(
    inlet: &mut GasMixture,
    outlet: &mut GasMixture,
    settings: &PressurePumpSettings,
) -> f32 {
    if settings.target_pressure - outlet.pressure() < PUMP_PRESSURE_EPSILON {
        return 0.0;
    }
    if !(inlet.total_moles() > 0.0) {
        return 0.0;
    }
    if inlet.volume() <= 0.0 {
        let before = inlet.total_moles();
        inlet.pump_gas_to(outlet, settings.target_pressure);
        return before - inlet.total_moles();
    }

    // Only the rate-limited slice of the inlet is offered to the outlet.
    let mut drawn = inlet.remove_ratio((settings.transfer_rate / inlet.volume()).min(1.0));
    let offered = drawn.total_moles();
    drawn.pump_gas_to(outlet, settings.target_pressure);
    let moved = offered - drawn.total_moles();
    inlet.merge(&drawn);
    moved
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumePumpSettings {
    /// Liters of inlet gas moved per tick.
    pub transfer_rate: f32,
    pub overclocked: bool,
    /// Fraction of the moved gas an overclocked pump loses to its tile.
    pub leak_ratio: f32,
}

impl Default for VolumePumpSettings {
    fn default() -> Self {
        Self {
            transfer_rate: MAX_TRANSFER_RATE,
            overclocked: false,
            leak_ratio: 0.1,
        }
    }
}

/// What a volume pump did this tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumePumpOutcome {
    pub moved: f32,
    /// Gas an overclocked pump spilled. The caller decides where it goes.
    pub leaked: Option<GasMixture>,
}

/// Move a fixed volume of inlet gas to the outlet regardless of pressure,
/// within the pump's outlet limits.
pub fn volume_pump(
    inlet: &mut GasMixture,
    outlet: &mut GasMixture,
    settings: &VolumePumpSettings,
) -> VolumePumpOutcome {
    let input_pressure = inlet.pressure();
    let output_pressure = outlet.pressure();

    if input_pressure < PUMP_PRESSURE_EPSILON
        || (output_pressure > VOLUME_PUMP_MAX_OUTLET_PRESSURE && !settings.overclocked)
    {
        return VolumePumpOutcome::default();
    }
    if settings.overclocked
        && output_pressure - input_pressure > VOLUME_PUMP_OVERCLOCK_MAX_BACKPRESSURE
    {
        return VolumePumpOutcome::default();
    }
    if inlet.volume() <= 0.0 {
        return VolumePumpOutcome::default();
    }

    let mut removed = inlet.remove_ratio(settings.transfer_rate / inlet.volume());
    let leaked = if settings.overclocked {
        Some(removed.remove_ratio(settings.leak_ratio))
    } else {
        None
    };

    let moved = removed.total_moles();
    outlet.merge(&removed);
    VolumePumpOutcome { moved, leaked }
}

/// Passive gate: a one-way valve that opens while the outlet is below target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassiveGateSettings {
    pub target_pressure: f32,
}

impl Default for PassiveGateSettings {
    fn default() -> Self {
        Self {
            target_pressure: ONE_ATMOSPHERE,
        }
    }
}

pub fn passive_gate(
    inlet: &mut GasMixture,
    outlet: &mut GasMixture,
    settings: &PassiveGateSettings,
) -> f32 {
    let before = outlet.total_moles();
    if !inlet.release_gas_to(Some(&mut *outlet), settings.target_pressure) {
        return 0.0;
    }
    (outlet.total_moles() - before).max(0.0)
}

// ============================================================================
// FILTER & MIXER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Liters of inlet gas processed per tick.
    pub transfer_rate: f32,
    pub gases: Vec<Gas>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            transfer_rate: MAX_TRANSFER_RATE,
            gases: Vec::new(),
        }
    }
}

/// Draw gas from `inlet`, route the filtered species to `filtered` and the
/// remainder to `outlet`.
///
/// Idles while the outlet is at `MAX_OUTPUT_PRESSURE`. When the filter side
/// is full the filtered species go back into the inlet instead, so nothing
/// is lost.
pub fn filter(
    inlet: &mut GasMixture,
    filtered: &mut GasMixture,
    outlet: &mut GasMixture,
    settings: &FilterSettings,
) -> f32 {
    if outlet.pressure() >= MAX_OUTPUT_PRESSURE || inlet.volume() <= 0.0 {
        return 0.0;
    }
    let ratio = settings.transfer_rate / inlet.volume();
    if !(ratio > 0.0) {
        return 0.0;
    }

    let mut removed = inlet.remove_ratio(ratio);
    let moved = removed.total_moles();
    if moved <= 0.0 {
        return 0.0;
    }

    if !settings.gases.is_empty() {
        let mut picked = GasMixture::new(removed.volume()).with_temperature(removed.temperature());
        for &gas in &settings.gases {
            picked.set_moles(gas, removed.moles(gas));
            removed.set_moles(gas, 0.0);
        }
        if filtered.pressure() < MAX_OUTPUT_PRESSURE {
            filtered.merge(&picked);
        } else {
            inlet.merge(&picked);
        }
    }

    outlet.merge(&removed);
    moved
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    pub target_pressure: f32,
    /// Share of the output taken from the first inlet, in `[0, 1]`.
    pub inlet_one_concentration: f32,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            target_pressure: ONE_ATMOSPHERE,
            inlet_one_concentration: 0.5,
        }
    }
}

/// Blend two inlets into the outlet at a fixed ratio, up to the target pressure.
pub fn mixer(
    inlet_one: &mut GasMixture,
    inlet_two: &mut GasMixture,
    outlet: &mut GasMixture,
    settings: &MixerSettings,
) -> f32 {
    let output_starting_pressure = outlet.pressure();
    if output_starting_pressure >= settings.target_pressure {
        return 0.0;
    }

    let concentration_one = settings.inlet_one_concentration.clamp(0.0, 1.0);
    let concentration_two = 1.0 - concentration_one;
    let pressure_delta = settings.target_pressure - output_starting_pressure;
    let mut transfer_one = 0.0;
    let mut transfer_two = 0.0;

    if concentration_one > 0.0 {
        if inlet_one.temperature() <= 0.0 {
            return 0.0;
        }
        transfer_one = concentration_one * pressure_delta * outlet.volume()
            / (inlet_one.temperature() * R);
    }
    if concentration_two > 0.0 {
        if inlet_two.temperature() <= 0.0 {
            return 0.0;
        }
        transfer_two = concentration_two * pressure_delta * outlet.volume()
            / (inlet_two.temperature() * R);
    }

    // Scale both sides down if either inlet cannot supply its share.
    let mut scale: f32 = 1.0;
    if transfer_one > 0.0 {
        scale = scale.min(inlet_one.total_moles() / transfer_one);
    }
    if transfer_two > 0.0 {
        scale = scale.min(inlet_two.total_moles() / transfer_two);
    }
    if !(scale > 0.0) {
        return 0.0;
    }
    transfer_one *= scale;
    transfer_two *= scale;

    let mut moved = 0.0;
    if transfer_one > 0.0 {
        let removed = inlet_one.remove(transfer_one);
        moved += removed.total_moles();
        outlet.merge(&removed);
    }
    if transfer_two > 0.0 {
        let removed = inlet_two.remove(transfer_two);
        moved += removed.total_moles();
        outlet.merge(&removed);
    }
    moved
}

// ============================================================================
// PIPE <-> TILE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VentDirection {
    /// Pipe to tile.
    Releasing,
    /// Tile to pipe.
    Siphoning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VentSettings {
    pub direction: VentDirection,
    /// Respect `external_pressure_bound` on the tile side.
    pub check_external: bool,
    /// Respect `internal_pressure_bound` on the pipe side.
    pub check_internal: bool,
    pub external_pressure_bound: f32,
    pub internal_pressure_bound: f32,
    pub max_pressure_delta: f32,
}

impl Default for VentSettings {
    fn default() -> Self {
        Self {
            direction: VentDirection::Releasing,
            check_external: true,
            check_internal: false,
            external_pressure_bound: ONE_ATMOSPHERE,
            internal_pressure_bound: 0.0,
            max_pressure_delta: VENT_MAX_PRESSURE_DELTA,
        }
    }
}

/// Active vent between a pipe and the tile it sits on.
pub fn vent(pipe: &mut GasMixture, tile: &mut GasMixture, settings: &VentSettings) -> f32 {
    let environment_pressure = tile.pressure();

    match settings.direction {
        VentDirection::Releasing => {
            let mut pressure_delta = settings.max_pressure_delta;
            if settings.check_external {
                pressure_delta =
                    pressure_delta.min(settings.external_pressure_bound - environment_pressure);
            }
            if settings.check_internal {
                pressure_delta =
                    pressure_delta.min(pipe.pressure() - settings.internal_pressure_bound);
            }
            if pressure_delta <= 0.0 || !(pipe.temperature() > 0.0) {
                return 0.0;
            }

            let transfer = pressure_delta * tile.volume() / (pipe.temperature() * R);
            let removed = pipe.remove(transfer);
            let moved = removed.total_moles();
            tile.merge(&removed);
            moved
        }
        VentDirection::Siphoning => {
            if environment_pressure <= 0.0 || !(tile.temperature() > 0.0) {
                return 0.0;
            }
            let our_multiplier = pipe.volume() / (tile.temperature() * R);
            let mut moles_delta = settings.max_pressure_delta * our_multiplier;
            if settings.check_external {
                moles_delta = moles_delta.min(
                    (environment_pressure - settings.external_pressure_bound) * tile.volume()
                        / (tile.temperature() * R),
                );
            }
            if settings.check_internal {
                moles_delta = moles_delta
                    .min((settings.internal_pressure_bound - pipe.pressure()) * our_multiplier);
            }
            if moles_delta <= 0.0 {
                return 0.0;
            }

            let removed = tile.remove(moles_delta);
            let moved = removed.total_moles();
            pipe.merge(&removed);
            moved
        }
    }
}

/// Passive vent: lets pipe and tile drift toward equal pressure.
///
/// Moves the moles that would equalize the two volumes, in whichever
/// direction the pressure points. Differences under `PASSIVE_VENT_MIN_DELTA`
/// are ignored.
pub fn passive_vent(pipe: &mut GasMixture, tile: &mut GasMixture) -> f32 {
    let environment_pressure = tile.pressure();
    let pipe_pressure = pipe.pressure();
    let pressure_delta = (environment_pressure - pipe_pressure).abs();
    if pressure_delta <= PASSIVE_VENT_MIN_DELTA {
        return 0.0;
    }
    let combined_volume = pipe.volume() + tile.volume();
    if combined_volume <= 0.0 {
        return 0.0;
    }
    let shared_volume = pipe.volume() * tile.volume() / combined_volume;

    let (source, sink) = if environment_pressure < pipe_pressure {
        (pipe, tile)
    } else {
        (tile, pipe)
    };
    if !(source.temperature() > 0.0) {
        return 0.0;
    }

    let transfer = pressure_delta * shared_volume / (source.temperature() * R);
    let removed = source.remove(transfer);
    let moved = removed.total_moles();
    sink.merge(&removed);
    moved
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrubberMode {
    /// Pull the listed species out of the tile, return the rest.
    Scrubbing,
    /// Pull everything.
    Siphoning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubberSettings {
    pub mode: ScrubberMode,
    /// Liters of tile air processed per tick.
    pub volume_rate: f32,
    pub gases: Vec<Gas>,
}

impl Default for ScrubberSettings {
    fn default() -> Self {
        Self {
            mode: ScrubberMode::Scrubbing,
            volume_rate: MAX_TRANSFER_RATE,
            gases: vec![Gas::CarbonDioxide, Gas::Plasma, Gas::Tritium, Gas::WaterVapor],
        }
    }
}

/// Scrubber: takes gas from the tile into its outlet pipe.
///
/// Scrubbing samples at most `SCRUBBER_MAX_MOLES_PER_TICK` of tile air and
/// puts back what it does not keep. Siphoning has no cap. Refuses once the
/// outlet reaches `SCRUBBER_MAX_OUTLET_PRESSURE`. Returns the moles that
/// ended up in the outlet.
pub fn scrub(tile: &mut GasMixture, outlet: &mut GasMixture, settings: &ScrubberSettings) -> f32 {
    if outlet.pressure() >= SCRUBBER_MAX_OUTLET_PRESSURE || tile.volume() <= 0.0 {
        return 0.0;
    }
    let ratio = settings.volume_rate / tile.volume();
    let before = outlet.total_moles();

    match settings.mode {
        ScrubberMode::Scrubbing => {
            let transfer = (ratio * tile.total_moles()).min(SCRUBBER_MAX_MOLES_PER_TICK);
            let mut removed = tile.remove(transfer);
            if removed.is_empty() {
                return 0.0;
            }
            removed.scrub_into(outlet, &settings.gases);
            tile.merge(&removed);
        }
        ScrubberMode::Siphoning => {
            let removed = tile.remove_ratio(ratio);
            outlet.merge(&removed);
        }
    }

    (outlet.total_moles() - before).max(0.0)
}

/// Outlet injector: pushes `volume_rate` liters of pipe gas into the tile each tick.
pub fn inject(pipe: &mut GasMixture, tile: &mut GasMixture, volume_rate: f32) -> f32 {
    if !(pipe.temperature() > 0.0) || volume_rate <= 0.0 {
        return 0.0;
    }
    let transfer = pipe.pressure() * volume_rate / (pipe.temperature() * R);
    let removed = pipe.remove(transfer);
    let moved = removed.total_moles();
    tile.merge(&removed);
    moved
}

// ============================================================================
// PORTS & CANISTERS
// ============================================================================

/// Pool two mixtures and hand each back its volume share, so both end at the
/// same pressure and temperature. Returns the moles that changed sides.
pub fn equalize(a: &mut GasMixture, b: &mut GasMixture) -> f32 {
    let total_volume = a.volume() + b.volume();
    if total_volume <= 0.0 || a.is_immutable() || b.is_immutable() {
        return 0.0;
    }
    let before = a.total_moles();

    let mut pooled = GasMixture::new(total_volume);
    pooled.merge(a);
    pooled.merge(b);
    let share = pooled.remove_ratio(a.volume() / total_volume);

    a.clear();
    a.merge(&share);
    b.clear();
    b.merge(&pooled);
    (a.total_moles() - before).abs()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanisterSettings {
    pub release_valve: bool,
    pub release_pressure: f32,
}

impl Default for CanisterSettings {
    fn default() -> Self {
        Self {
            release_valve: false,
            release_pressure: ONE_ATMOSPHERE,
        }
    }
}

/// Open the canister valve toward `environment`, never past the release
/// pressure. `None` is space: whatever leaves is gone. Returns the moles
/// that left the canister.
pub fn canister_release(
    canister: &mut GasMixture,
    environment: Option<&mut GasMixture>,
    settings: &CanisterSettings,
) -> f32 {
    if !settings.release_valve {
        return 0.0;
    }
    let before = canister.total_moles();
    canister.release_gas_to(environment, settings.release_pressure);
    (before - canister.total_moles()).max(0.0)
}

/// Gas miner: a tile-side source that stops when the tile gets too full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerSettings {
    pub gas: Gas,
    pub moles_per_tick: f32,
    pub temperature: f32,
    /// No bound when unset.
    pub max_external_pressure: Option<f32>,
    /// No bound when unset.
    pub max_external_moles: Option<f32>,
}

impl Default for MinerSettings {
    fn default() -> Self {
        Self {
            gas: Gas::Oxygen,
            moles_per_tick: 0.5,
            temperature: T20C,
            max_external_pressure: Some(6500.0),
            max_external_moles: None,
        }
    }
}

/// Add fresh gas to the tile. The pressure bound accounts for this tick's
/// own output, so the tile never ends above it. Returns whether it mined.
pub fn mine(tile: &mut GasMixture, settings: &MinerSettings) -> bool {
    if !(settings.moles_per_tick > 0.0) || tile.volume() <= 0.0 || tile.is_immutable() {
        return false;
    }
    if let Some(max_pressure) = settings.max_external_pressure {
        let added = settings.moles_per_tick * settings.temperature * R / tile.volume();
        if tile.pressure() > max_pressure - added {
            return false;
        }
    }
    if let Some(max_moles) = settings.max_external_moles {
        if tile.total_moles() > max_moles {
            return false;
        }
    }

    let mined = GasMixture::new(tile.volume())
        .with_temperature(settings.temperature)
        .with_moles(settings.gas, settings.moles_per_tick);
    tile.merge(&mined);
    true
}

// ============================================================================
// SOURCES & HEAT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub gas: Gas,
    pub moles_per_tick: f32,
    pub temperature: f32,
    /// Generation stops while the pipe is at or above this pressure.
    pub max_pressure: f32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            gas: Gas::Oxygen,
            moles_per_tick: 0.5,
            temperature: T20C,
            max_pressure: ONE_ATMOSPHERE,
        }
    }
}

/// Inject fresh gas into the pipe unless it is already at the cap.
///
/// A pipe without volume has no pressure to check against, so it gets
/// nothing. Returns whether anything was generated.
pub fn generate(pipe: &mut GasMixture, settings: &GeneratorSettings) -> bool {
    if !(settings.moles_per_tick > 0.0) || pipe.volume() <= 0.0 {
        return false;
    }
    if pipe.pressure() >= settings.max_pressure {
        return false;
    }
    let spawned = GasMixture::new(pipe.volume())
        .with_temperature(settings.temperature)
        .with_moles(settings.gas, settings.moles_per_tick);
    pipe.merge(&spawned);
    true
}

/// Heater: holds the pipe gas at `target_temperature`.
pub fn heat(pipe: &mut GasMixture, target_temperature: f32) {
    pipe.set_temperature(target_temperature);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermoMachineSettings {
    /// Heat capacity of the machine's exchanger per second of contact, in J/K.
    pub heat_capacity: f32,
    pub target_temperature: f32,
}

impl Default for ThermoMachineSettings {
    fn default() -> Self {
        Self {
            heat_capacity: 5000.0,
            target_temperature: T20C,
        }
    }
}

/// Thermo machine (freezer/heater): exchanges heat between the pipe gas and a
/// reservoir at `target_temperature`, scaled by `dt` seconds.
///
/// Returns the energy delivered to the gas in joules (negative when cooling).
pub fn thermo_exchange(pipe: &mut GasMixture, settings: &ThermoMachineSettings, dt: f32) -> f32 {
    if pipe.is_empty() {
        return 0.0;
    }
    let air_heat = pipe.heat_capacity();
    let machine_heat = settings.heat_capacity.max(0.0) * dt.max(0.0);
    if !(machine_heat > 0.0) {
        return 0.0;
    }
    let combined = air_heat + machine_heat;

    let old_temperature = pipe.temperature();
    let new_temperature =
        (machine_heat * settings.target_temperature + air_heat * old_temperature) / combined;
    pipe.set_temperature(new_temperature);
    (pipe.temperature() - old_temperature) * air_heat
}
