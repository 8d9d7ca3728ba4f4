//! StationAtmos Headless Simulation Harness
//!
//! Validates gas logic, pipe-net topology and whole-station scenarios.
//! Runs entirely in-process: no networking, no rendering.
//!
//! Usage:
//!   cargo run -p stationatmos-simtest
//!   cargo run -p stationatmos-simtest -- --verbose

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use stationatmos_core::generation::{generate_station, StationConfig};
use stationatmos_core::prelude::*;
use stationatmos_logic::constants::{CELL_VOLUME, R, T20C};
use stationatmos_logic::constants::SCRUBBER_MAX_MOLES_PER_TICK;
use stationatmos_logic::devices::{
    filter, generate, pressure_pump, scrub, FilterSettings, GeneratorSettings,
    PressurePumpSettings, ScrubberSettings,
};

// ── Scenario file ───────────────────────────────────────────────────────
const SCENARIOS_JSON: &str = include_str!("../../../data/scenarios.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    seed: u64,
    ticks: u32,
    #[serde(default)]
    config: AtmosConfig,
    #[serde(default)]
    station: StationConfig,
    #[serde(default)]
    expect: Expectations,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Expectations {
    /// Total moles unchanged across the run
    conserve: bool,
    /// Room carbon dioxide lower at the end than at the start
    co2_decreases: bool,
    /// No pipe net ever above this pressure
    max_net_pressure: Option<f32>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn close(a: f32, b: f32, tolerance: f32) -> bool {
    (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== StationAtmos Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Prototype data validation
    results.extend(validate_prototypes(verbose));

    // 2. Gas mixture invariants
    results.extend(validate_mixture_logic(verbose));

    // 3. Device transfer rules
    results.extend(validate_device_rules(verbose));

    // 4. Pipe-net topology
    results.extend(validate_pipe_nets(verbose));

    // 5. Snapshot encoding
    results.extend(validate_snapshots(verbose));

    // 6. Scenario runs
    results.extend(run_scenarios(verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Prototypes ───────────────────────────────────────────────────────

fn validate_prototypes(verbose: bool) -> Vec<TestResult> {
    println!("--- Prototypes ---");
    let mut results = Vec::new();

    let prototypes = match PrototypeSet::builtin() {
        Ok(p) => p,
        Err(e) => {
            results.push(TestResult {
                name: "prototypes_parse".into(),
                passed: false,
                detail: format!("{}", e),
            });
            return results;
        }
    };

    results.push(TestResult {
        name: "prototypes_not_empty".into(),
        passed: prototypes.len() >= 10,
        detail: format!("{} prototypes loaded", prototypes.len()),
    });

    // Every device prototype must resolve its ports once spawned
    let mut engine = AtmosEngine::new();
    let mut inert = Vec::new();
    let mut devices = 0;
    for (i, id) in prototypes.ids().enumerate() {
        let pos = TilePos::new(i as i32 * 3, 0);
        let entity = match engine.spawn_prototype(&prototypes, id, pos, 0) {
            Ok(e) => e,
            Err(e) => {
                inert.push(format!("{} ({})", id, e));
                continue;
            }
        };
        if let Ok(device) = engine.world.get::<&AtmosDevice>(entity) {
            devices += 1;
            if device.is_inert() {
                inert.push(id.to_string());
            }
        }
    }
    results.push(TestResult {
        name: "prototype_devices_resolve".into(),
        passed: inert.is_empty(),
        detail: if inert.is_empty() {
            format!("{} device prototypes resolved", devices)
        } else {
            format!("inert: {}", inert.join(", "))
        },
    });

    let missing = prototypes.get("no_such_prototype").is_err();
    results.push(TestResult {
        name: "prototype_unknown_rejected".into(),
        passed: missing,
        detail: "unknown id returns an error".into(),
    });

    if verbose {
        println!("  {} prototypes, {} devices", prototypes.len(), devices);
    }
    results
}

// ── 2. Mixture logic ────────────────────────────────────────────────────

fn validate_mixture_logic(verbose: bool) -> Vec<TestResult> {
    println!("--- Gas Mixtures ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(0x6A5);

    // Merge conserves every species and leaves the giver alone
    let mut merge_failures = 0;
    for _ in 0..500 {
        let mut a = GasMixture::new(rng.gen_range(1.0..5000.0))
            .with_temperature(rng.gen_range(50.0..1000.0));
        let mut b = GasMixture::new(rng.gen_range(1.0..5000.0))
            .with_temperature(rng.gen_range(50.0..1000.0));
        for gas in Gas::ALL {
            a.set_moles(gas, rng.gen_range(0.0..100.0));
            b.set_moles(gas, rng.gen_range(0.0..100.0));
        }
        let before = a.clone();
        let giver = b.clone();
        a.merge(&b);
        let species_ok = Gas::ALL
            .iter()
            .all(|&g| close(a.moles(g), before.moles(g) + giver.moles(g), 1e-5));
        if !species_ok || b != giver {
            merge_failures += 1;
        }
    }
    results.push(TestResult {
        name: "merge_conserves_species".into(),
        passed: merge_failures == 0,
        detail: format!("{} failures in 500 random merges", merge_failures),
    });

    // Random adjust/remove sequences never go negative
    let mut negatives = 0;
    let mut air = GasMixture::new(CELL_VOLUME).with_temperature(T20C);
    for _ in 0..5000 {
        let gas = Gas::ALL[rng.gen_range(0..Gas::ALL.len())];
        match rng.gen_range(0..3) {
            0 => air.adjust_moles(gas, rng.gen_range(-50.0..50.0)),
            1 => {
                air.remove_ratio(rng.gen_range(-0.5..1.5));
            }
            _ => {
                air.remove(rng.gen_range(0.0..30.0));
            }
        }
        if air.iter().any(|(_, m)| m < 0.0) {
            negatives += 1;
        }
    }
    results.push(TestResult {
        name: "moles_never_negative".into(),
        passed: negatives == 0,
        detail: format!("{} negative states in 5000 random ops", negatives),
    });

    // Tile sharing conserves moles and energy
    let mut a = GasMixture::standard_air(CELL_VOLUME, 400.0);
    let mut b = GasMixture::new(CELL_VOLUME).with_temperature(T20C);
    b.set_moles(Gas::CarbonDioxide, 20.0);
    let moles = a.total_moles() + b.total_moles();
    let energy = a.thermal_energy() + b.thermal_energy();
    a.share(&mut b, 4);
    let shared_ok = close(a.total_moles() + b.total_moles(), moles, 1e-5)
        && close(a.thermal_energy() + b.thermal_energy(), energy, 1e-3);
    results.push(TestResult {
        name: "share_conserves_moles_and_energy".into(),
        passed: shared_ok,
        detail: format!(
            "moles {:.3} -> {:.3}",
            moles,
            a.total_moles() + b.total_moles()
        ),
    });

    if verbose {
        println!("  final random mixture: {:.2} mol", air.total_moles());
    }
    results
}

// ── 3. Device rules ─────────────────────────────────────────────────────

fn nitrogen_at(volume: f32, pressure: f32) -> GasMixture {
    let moles = pressure * volume / (R * T20C);
    GasMixture::new(volume)
        .with_temperature(T20C)
        .with_moles(Gas::Nitrogen, moles)
}

fn validate_device_rules(verbose: bool) -> Vec<TestResult> {
    println!("--- Device Rules ---");
    let mut results = Vec::new();

    // Pump stops at its target
    let mut inlet = nitrogen_at(200.0, 200.0);
    let mut outlet = nitrogen_at(200.0, 190.0);
    let settings = PressurePumpSettings {
        target_pressure: 200.0,
        transfer_rate: 200.0,
    };
    let first = pressure_pump(&mut inlet, &mut outlet, &settings);
    let second = pressure_pump(&mut inlet, &mut outlet, &settings);
    results.push(TestResult {
        name: "pump_respects_target".into(),
        passed: first > 0.0 && second < 1e-3 && outlet.pressure() <= 200.0 + 0.1,
        detail: format!(
            "moved {:.3} then {:.5} mol, outlet at {:.2} kPa",
            first,
            second,
            outlet.pressure()
        ),
    });

    // Filter splits the inlet completely with an unbounded rate
    let mut inlet = GasMixture::new(200.0)
        .with_temperature(T20C)
        .with_moles(Gas::Plasma, 5.0)
        .with_moles(Gas::Nitrogen, 5.0);
    let mut filtered = GasMixture::new(200.0).with_temperature(T20C);
    let mut main_out = GasMixture::new(200.0).with_temperature(T20C);
    let settings = FilterSettings {
        transfer_rate: f32::MAX,
        gases: vec![Gas::Plasma],
    };
    filter(&mut inlet, &mut filtered, &mut main_out, &settings);
    let split_ok = close(filtered.moles(Gas::Plasma), 5.0, 1e-5)
        && filtered.moles(Gas::Nitrogen) == 0.0
        && main_out.moles(Gas::Plasma) == 0.0
        && close(main_out.moles(Gas::Nitrogen), 5.0, 1e-5);
    results.push(TestResult {
        name: "filter_split_complete".into(),
        passed: split_ok,
        detail: format!(
            "filtered {:.2} plasma, outlet {:.2} nitrogen",
            filtered.moles(Gas::Plasma),
            main_out.moles(Gas::Nitrogen)
        ),
    });

    // Generator stops at its cap, overshooting by at most one injection
    let settings = GeneratorSettings {
        gas: Gas::Oxygen,
        moles_per_tick: 0.001,
        temperature: T20C,
        max_pressure: 10.0,
    };
    let one_tick = settings.moles_per_tick * R * T20C;
    let mut pipe = GasMixture::new(1.0).with_temperature(T20C);
    let mut injections = 0;
    for _ in 0..100 {
        if generate(&mut pipe, &settings) {
            injections += 1;
        }
    }
    results.push(TestResult {
        name: "generator_pressure_cap".into(),
        passed: pipe.pressure() >= 10.0 && pipe.pressure() <= 10.0 + one_tick + 1e-3,
        detail: format!(
            "{} injections, {:.2} kPa",
            injections,
            pipe.pressure()
        ),
    });

    // A pipe without volume reads zero pressure, so it must get nothing
    let mut hollow = GasMixture::new(0.0).with_temperature(T20C);
    let runaway = (0..1000).filter(|_| generate(&mut hollow, &settings)).count();
    results.push(TestResult {
        name: "generator_zero_volume_idle".into(),
        passed: runaway == 0 && hollow.total_moles() == 0.0,
        detail: format!("{} injections, {:.3} mol", runaway, hollow.total_moles()),
    });

    // Scrubbing samples at most one mole of tile air per tick
    let mut room =
        GasMixture::standard_air(CELL_VOLUME, T20C).with_moles(Gas::CarbonDioxide, 50.0);
    let mut waste = GasMixture::new(200.0).with_temperature(T20C);
    let start = room.total_moles();
    let kept = scrub(&mut room, &mut waste, &ScrubberSettings::default());
    results.push(TestResult {
        name: "scrubber_sample_capped".into(),
        passed: kept > 0.0
            && kept <= SCRUBBER_MAX_MOLES_PER_TICK
            && close(start - room.total_moles(), kept, 1e-3),
        detail: format!("{:.3} mol scrubbed", kept),
    });

    if verbose {
        println!("  one generator tick = {:.3} kPa in 1 L", one_tick);
    }
    results
}

// ── 4. Pipe nets ────────────────────────────────────────────────────────

fn lateral_pipe(moles: f32) -> Vec<PipeNode> {
    let air = GasMixture::new(10.0)
        .with_temperature(T20C)
        .with_moles(Gas::Nitrogen, moles);
    vec![PipeNode::new("pipe", PipeDirection::LATERAL)
        .with_volume(10.0)
        .with_air(&air)]
}

fn validate_pipe_nets(verbose: bool) -> Vec<TestResult> {
    println!("--- Pipe Nets ---");
    let mut results = Vec::new();

    // Two pipes join and split
    let mut engine = AtmosEngine::new();
    let a = engine.spawn_pipe(TilePos::new(0, 0), lateral_pipe(3.0));
    let b = engine.spawn_pipe(TilePos::new(1, 0), lateral_pipe(7.0));
    engine.tick();
    let joined = engine.node_air(a, "pipe");
    let join_ok = joined
        .as_ref()
        .map(|j| close(j.total_moles(), 10.0, 1e-5) && j.volume() == 20.0)
        .unwrap_or(false);
    results.push(TestResult {
        name: "net_join".into(),
        passed: join_ok && engine.net_count() == 1,
        detail: format!("{} nets after join", engine.net_count()),
    });

    let _ = engine.unanchor(b);
    engine.tick();
    let split_total = engine.total_moles();
    results.push(TestResult {
        name: "net_split_conserves".into(),
        passed: engine.net_count() == 0 && close(split_total, 10.0, 1e-5),
        detail: format!("{:.4} mol after split", split_total),
    });

    // Removing the middle of three splits the net in two
    let mut engine = AtmosEngine::new();
    let pipes: Vec<_> = (0..5)
        .map(|x| engine.spawn_pipe(TilePos::new(x, 0), lateral_pipe(2.0)))
        .collect();
    engine.tick();
    let _ = engine.unanchor(pipes[2]);
    engine.tick();
    let apart = engine.net_of(pipes[0], "pipe") != engine.net_of(pipes[4], "pipe");
    results.push(TestResult {
        name: "net_middle_removal".into(),
        passed: engine.net_count() == 2 && apart && close(engine.total_moles(), 10.0, 1e-5),
        detail: format!(
            "{} nets, {:.4} mol",
            engine.net_count(),
            engine.total_moles()
        ),
    });

    if verbose {
        println!("  pipe-net checks ran on {} entities", pipes.len() + 2);
    }
    results
}

// ── 5. Snapshots ────────────────────────────────────────────────────────

fn validate_snapshots(_verbose: bool) -> Vec<TestResult> {
    println!("--- Snapshots ---");
    let mut results = Vec::new();

    let mut engine = AtmosEngine::new();
    for x in 0..4 {
        engine.set_tile(TilePos::new(x, 0), GasMixture::standard_air(CELL_VOLUME, T20C));
    }
    engine.spawn_pipe(TilePos::new(0, 1), lateral_pipe(1.0));
    engine.spawn_pipe(TilePos::new(1, 1), lateral_pipe(1.0));
    engine.tick();

    let snapshot = engine.snapshot();
    let roundtrip = snapshot
        .encode()
        .and_then(|bytes| AtmosSnapshot::decode(&bytes));
    results.push(TestResult {
        name: "snapshot_roundtrip".into(),
        passed: roundtrip.as_ref().map(|s| *s == snapshot).unwrap_or(false),
        detail: format!(
            "{} nets, {} tiles",
            snapshot.nets.len(),
            snapshot.tiles.len()
        ),
    });

    let rejected = match snapshot.encode() {
        Ok(mut bytes) => {
            bytes[0] = bytes[0].wrapping_add(1);
            matches!(
                AtmosSnapshot::decode(&bytes),
                Err(AtmosError::VersionMismatch { .. })
            )
        }
        Err(_) => false,
    };
    results.push(TestResult {
        name: "snapshot_version_checked".into(),
        passed: rejected,
        detail: "bumped version is rejected".into(),
    });

    results
}

// ── 6. Scenarios ────────────────────────────────────────────────────────

fn room_co2(engine: &AtmosEngine, room: &[TilePos]) -> f32 {
    room.iter()
        .filter_map(|p| engine.tile_air(*p))
        .map(|t| t.moles(Gas::CarbonDioxide))
        .sum()
}

fn max_net_pressure(engine: &AtmosEngine) -> f32 {
    engine
        .nets
        .iter()
        .map(|(_, net)| net.air.pressure())
        .fold(0.0, f32::max)
}

fn run_scenario(scenario: &Scenario, prototypes: &PrototypeSet, verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let mut engine = AtmosEngine::with_config(scenario.config.clone());
    let mut rng = StdRng::seed_from_u64(scenario.seed);

    let layout = match generate_station(&mut engine, prototypes, &scenario.station, &mut rng) {
        Ok(layout) => layout,
        Err(e) => {
            results.push(TestResult {
                name: format!("{}_generate", scenario.name),
                passed: false,
                detail: format!("{}", e),
            });
            return results;
        }
    };

    let start_moles = engine.total_moles();
    let start_co2 = room_co2(&engine, &layout.room);
    let mut peak_pressure = 0.0f32;

    // Drive through update() so the configured tick rate is exercised
    let interval = engine.config().tick_interval();
    let mut ticks = 0;
    while ticks < scenario.ticks {
        ticks += engine.update(interval);
        peak_pressure = peak_pressure.max(max_net_pressure(&engine));
    }

    results.push(TestResult {
        name: format!("{}_ran", scenario.name),
        passed: engine.update_counter() == scenario.ticks as u64,
        detail: format!(
            "{} ticks, {} nets, {} devices",
            engine.update_counter(),
            engine.net_count(),
            layout.device_count()
        ),
    });

    if scenario.expect.conserve {
        let end = engine.total_moles();
        results.push(TestResult {
            name: format!("{}_conserves", scenario.name),
            passed: close(end, start_moles, 1e-3),
            detail: format!("{:.2} -> {:.2} mol", start_moles, end),
        });
    }

    if scenario.expect.co2_decreases {
        let end = room_co2(&engine, &layout.room);
        results.push(TestResult {
            name: format!("{}_scrubbed", scenario.name),
            passed: end < start_co2,
            detail: format!("room CO2 {:.2} -> {:.2} mol", start_co2, end),
        });
    }

    if let Some(limit) = scenario.expect.max_net_pressure {
        results.push(TestResult {
            name: format!("{}_pressure_bounded", scenario.name),
            passed: peak_pressure <= limit,
            detail: format!("peak {:.2} kPa (limit {:.2})", peak_pressure, limit),
        });
    }

    if verbose {
        println!(
            "  {}: {} tiles, {:.1} mol total",
            scenario.name,
            layout.room.len(),
            engine.total_moles()
        );
    }
    results
}

fn run_scenarios(verbose: bool) -> Vec<TestResult> {
    println!("--- Scenarios ---");
    let mut results = Vec::new();

    let scenarios: Vec<Scenario> = match serde_json::from_str(SCENARIOS_JSON) {
        Ok(s) => s,
        Err(e) => {
            results.push(TestResult {
                name: "scenarios_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return results;
        }
    };
    let prototypes = match PrototypeSet::builtin() {
        Ok(p) => p,
        Err(e) => {
            results.push(TestResult {
                name: "scenarios_prototypes".into(),
                passed: false,
                detail: format!("{}", e),
            });
            return results;
        }
    };

    for scenario in &scenarios {
        results.extend(run_scenario(scenario, &prototypes, verbose));
    }
    results
}
