//! Device initialization and per-tick dispatch.
//!
//! Each port of a device resolves to an `AirRef`: the net its node belongs
//! to, the node's own buffer when isolated, or a tile. The referenced
//! mixtures are taken out of their owners, handed to the transfer rule from
//! `stationatmos_logic::devices`, and put back. A device whose ports alias
//! the same mixture skips the tick.

use crate::components::{AtmosDevice, DeviceKind, NodeContainer, PortState, Position, TilePos};
use crate::grid::{GridAtmosphere, TileKind};
use crate::pipenet::{NetId, NodeRef, PipeNets};
use hecs::{Entity, World};
use stationatmos_logic::devices;
use stationatmos_logic::GasMixture;

/// Where one port's gas lives this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirRef {
    Net(NetId),
    Local(NodeRef),
    Tile(TilePos),
}

fn resolve_ports(
    kind: &DeviceKind,
    container: Option<&NodeContainer>,
) -> Result<Vec<usize>, String> {
    kind.port_names()
        .into_iter()
        .map(|name| {
            container
                .and_then(|c| c.index_of(name))
                .ok_or_else(|| name.to_string())
        })
        .collect()
}

/// Resolve a device's port names to node indices.
///
/// Only unresolved devices are touched. A missing node is a configuration
/// error: it is logged here, once, and the device stays inert for good.
/// Returns whether the device ended up resolved.
pub fn initialize_device(world: &World, entity: Entity) -> bool {
    let Ok(mut device) = world.get::<&mut AtmosDevice>(entity) else {
        return false;
    };
    if device.ports != PortState::Unresolved {
        return device.resolved_ports().is_some();
    }

    let container = world.get::<&NodeContainer>(entity).ok();
    match resolve_ports(&device.kind, container.as_deref()) {
        Ok(indices) => {
            device.ports = PortState::Resolved(indices);
            true
        }
        Err(missing) => {
            log::warn!(
                "{} {:?} has no pipe node named '{}', device disabled",
                device.kind.label(),
                entity,
                missing
            );
            device.ports = PortState::Inert;
            false
        }
    }
}

/// Initialize every device still waiting for its ports.
pub fn initialize_pending_devices(world: &World) -> usize {
    let pending: Vec<Entity> = world
        .query::<&AtmosDevice>()
        .iter()
        .filter(|(_, d)| d.ports == PortState::Unresolved)
        .map(|(e, _)| e)
        .collect();
    pending
        .into_iter()
        .filter(|&e| initialize_device(world, e))
        .count()
}

/// The gas a node currently uses.
///
/// A node that names a net which does not list it is a topology bug: warn,
/// request a rebuild and fall back to the node's own buffer.
pub fn port_air(world: &World, nets: &mut PipeNets, node: NodeRef) -> Option<AirRef> {
    let container = world.get::<&NodeContainer>(node.entity).ok()?;
    let pipe = container.nodes.get(node.index)?;
    match pipe.net {
        Some(id) if nets.get(id).map(|n| n.contains(node)).unwrap_or(false) => {
            Some(AirRef::Net(id))
        }
        Some(id) => {
            log::warn!(
                "Pipe node {:?}#{} refers to stale net {:?}, scheduling rebuild",
                node.entity,
                node.index,
                id
            );
            nets.mark_dirty();
            Some(AirRef::Local(node))
        }
        None => Some(AirRef::Local(node)),
    }
}

fn take_air(
    world: &World,
    nets: &mut PipeNets,
    grid: &mut GridAtmosphere,
    air: AirRef,
) -> Option<GasMixture> {
    match air {
        AirRef::Net(id) => nets.get_mut(id).map(|n| std::mem::take(&mut n.air)),
        AirRef::Local(node) => world
            .get::<&mut NodeContainer>(node.entity)
            .ok()
            .and_then(|mut c| c.nodes.get_mut(node.index).map(|n| std::mem::take(&mut n.air))),
        AirRef::Tile(pos) => grid.take_tile_air(pos),
    }
}

fn put_air(
    world: &World,
    nets: &mut PipeNets,
    grid: &mut GridAtmosphere,
    at: AirRef,
    air: GasMixture,
) {
    match at {
        AirRef::Net(id) => {
            if let Some(net) = nets.get_mut(id) {
                net.air = air;
            }
        }
        AirRef::Local(node) => {
            if let Ok(mut container) = world.get::<&mut NodeContainer>(node.entity) {
                if let Some(pipe) = container.nodes.get_mut(node.index) {
                    pipe.air = air;
                }
            }
        }
        AirRef::Tile(pos) => grid.return_tile_air(pos, air),
    }
}

/// Borrow every referenced mixture at once, run `f`, and put them back.
///
/// Returns `None` without calling `f` if two refs alias or one is missing.
pub fn with_airs<T>(
    world: &World,
    nets: &mut PipeNets,
    grid: &mut GridAtmosphere,
    refs: &[AirRef],
    f: impl FnOnce(&mut [GasMixture]) -> T,
) -> Option<T> {
    for (i, r) in refs.iter().enumerate() {
        if refs[..i].contains(r) {
            return None;
        }
    }

    let mut taken = Vec::with_capacity(refs.len());
    for r in refs {
        match take_air(world, nets, grid, *r) {
            Some(air) => taken.push(air),
            None => {
                for (at, air) in refs.iter().zip(taken) {
                    put_air(world, nets, grid, *at, air);
                }
                return None;
            }
        }
    }

    let result = f(taken.as_mut_slice());
    for (at, air) in refs.iter().zip(taken) {
        put_air(world, nets, grid, *at, air);
    }
    Some(result)
}

/// Run one device once. Returns whether it did its gas operation.
pub fn run_device(
    world: &World,
    nets: &mut PipeNets,
    grid: &mut GridAtmosphere,
    entity: Entity,
    dt: f32,
) -> bool {
    let Ok(device) = world.get::<&AtmosDevice>(entity) else {
        return false;
    };
    if !device.enabled {
        return false;
    }
    let Some(ports) = device.resolved_ports() else {
        return false;
    };
    let tile = world.get::<&Position>(entity).ok().map(|p| p.tile);

    let mut airs = Vec::with_capacity(ports.len() + 1);
    for &index in ports {
        match port_air(world, nets, NodeRef::new(entity, index)) {
            Some(air) => airs.push(air),
            None => return false,
        }
    }

    match &device.kind {
        DeviceKind::PressurePump { settings, .. } => with_airs(world, nets, grid, &airs, |m| {
            if let [inlet, outlet] = m {
                devices::pressure_pump(inlet, outlet, settings);
            }
        })
        .is_some(),
        DeviceKind::VolumePump { settings, .. } => {
            let has_tile = tile.map(|t| grid.get_tile(t).is_some()).unwrap_or(false);
            let leaked = with_airs(world, nets, grid, &airs, |m| match m {
                [inlet, outlet] => {
                    let leaked = devices::volume_pump(inlet, outlet, settings).leaked?;
                    if has_tile {
                        Some(leaked)
                    } else {
                        inlet.merge(&leaked);
                        None
                    }
                }
                _ => None,
            });
            match (leaked, tile) {
                (None, _) => false,
                (Some(Some(gas)), Some(pos)) => {
                    if let Some(tile_air) = grid.get_tile_mut(pos) {
                        tile_air.merge(&gas);
                    }
                    true
                }
                (Some(_), _) => true,
            }
        }
        DeviceKind::PassiveGate { settings, .. } => with_airs(world, nets, grid, &airs, |m| {
            if let [inlet, outlet] = m {
                devices::passive_gate(inlet, outlet, settings);
            }
        })
        .is_some(),
        DeviceKind::Filter { settings, .. } => with_airs(world, nets, grid, &airs, |m| {
            if let [inlet, filtered, outlet] = m {
                devices::filter(inlet, filtered, outlet, settings);
            }
        })
        .is_some(),
        DeviceKind::Mixer { settings, .. } => with_airs(world, nets, grid, &airs, |m| {
            if let [one, two, outlet] = m {
                devices::mixer(one, two, outlet, settings);
            }
        })
        .is_some(),
        DeviceKind::Vent { settings, .. } => {
            let Some(pos) = tile else { return false };
            airs.push(AirRef::Tile(pos));
            with_airs(world, nets, grid, &airs, |m| {
                if let [pipe, tile_air] = m {
                    devices::vent(pipe, tile_air, settings);
                }
            })
            .is_some()
        }
        DeviceKind::PassiveVent { .. } => {
            let Some(pos) = tile else { return false };
            airs.push(AirRef::Tile(pos));
            with_airs(world, nets, grid, &airs, |m| {
                if let [pipe, tile_air] = m {
                    devices::passive_vent(pipe, tile_air);
                }
            })
            .is_some()
        }
        DeviceKind::OutletInjector { volume_rate, .. } => {
            let Some(pos) = tile else { return false };
            airs.push(AirRef::Tile(pos));
            with_airs(world, nets, grid, &airs, |m| {
                if let [pipe, tile_air] = m {
                    devices::inject(pipe, tile_air, *volume_rate);
                }
            })
            .is_some()
        }
        DeviceKind::Scrubber {
            wide_net, settings, ..
        } => {
            let Some(pos) = tile else { return false };
            let mut targets = vec![pos];
            if *wide_net {
                targets.extend(pos.neighbors());
            }
            let mut ran = false;
            for target in targets {
                let refs = [airs[0], AirRef::Tile(target)];
                ran |= with_airs(world, nets, grid, &refs, |m| {
                    if let [pipe, tile_air] = m {
                        devices::scrub(tile_air, pipe, settings);
                    }
                })
                .is_some();
            }
            ran
        }
        DeviceKind::Generator { settings, .. } => with_airs(world, nets, grid, &airs, |m| {
            if let [pipe] = m {
                devices::generate(pipe, settings);
            }
        })
        .is_some(),
        DeviceKind::Heater {
            target_temperature, ..
        } => with_airs(world, nets, grid, &airs, |m| {
            if let [pipe] = m {
                devices::heat(pipe, *target_temperature);
            }
        })
        .is_some(),
        DeviceKind::ThermoMachine { settings, .. } => with_airs(world, nets, grid, &airs, |m| {
            if let [pipe] = m {
                devices::thermo_exchange(pipe, settings, dt);
            }
        })
        .is_some(),
        DeviceKind::Port { .. } => with_airs(world, nets, grid, &airs, |m| {
            if let [pipe, connected] = m {
                devices::equalize(pipe, connected);
            }
        })
        .is_some(),
        DeviceKind::Canister { settings, .. } => {
            let (contents, port) = (airs[0], airs[1]);
            let mut ran = true;
            // A loose port holds nothing worth mixing with.
            if matches!(port, AirRef::Net(_)) {
                ran &= with_airs(world, nets, grid, &[contents, port], |m| {
                    if let [tank, net] = m {
                        devices::equalize(tank, net);
                    }
                })
                .is_some();
            }
            if settings.release_valve {
                let kind = tile.and_then(|pos| grid.tile_kind(pos).map(|k| (pos, k)));
                ran &= match kind {
                    Some((pos, TileKind::Simulated)) => {
                        with_airs(world, nets, grid, &[contents, AirRef::Tile(pos)], |m| {
                            if let [tank, room] = m {
                                devices::canister_release(tank, Some(room), settings);
                            }
                        })
                        .is_some()
                    }
                    Some((_, TileKind::Space)) => with_airs(world, nets, grid, &[contents], |m| {
                        if let [tank] = m {
                            devices::canister_release(tank, None, settings);
                        }
                    })
                    .is_some(),
                    _ => false,
                };
            }
            ran
        }
        DeviceKind::Miner { settings } => {
            let Some(pos) = tile else { return false };
            with_airs(world, nets, grid, &[AirRef::Tile(pos)], |m| {
                if let [room] = m {
                    devices::mine(room, settings);
                }
            })
            .is_some()
        }
    }
}

/// Run every registered pipe-net device once, in registration order.
pub fn process_pipe_net_devices(
    world: &World,
    nets: &mut PipeNets,
    grid: &mut GridAtmosphere,
) -> usize {
    let entities = grid.pipe_net_devices().to_vec();
    entities
        .into_iter()
        .filter(|&e| run_device(world, nets, grid, e, 0.0))
        .count()
}

/// Run every registered atmos device with the time since its last update.
pub fn process_atmos_devices(
    world: &World,
    nets: &mut PipeNets,
    grid: &mut GridAtmosphere,
    now: f64,
) -> usize {
    let entities: Vec<Entity> = grid.atmos_devices().collect();
    let mut ran = 0;
    for entity in entities {
        let dt = grid.take_atmos_dt(entity, now);
        if run_device(world, nets, grid, entity, dt) {
            ran += 1;
        }
    }
    ran
}
