//! Device components: pumps, filters, vents and the rest.
//!
//! A device names the pipe nodes it works on ("inlet", "outlet", ...). The
//! names are resolved to node indices once, when the device is initialized,
//! and the indices are used every tick afterwards.

use serde::{Deserialize, Serialize};
use stationatmos_logic::devices::{
    CanisterSettings, FilterSettings, GeneratorSettings, MinerSettings, MixerSettings,
    PassiveGateSettings, PressurePumpSettings, ScrubberSettings, ThermoMachineSettings,
    VentSettings, VolumePumpSettings,
};

fn default_injector_rate() -> f32 {
    50.0
}

fn default_heater_target() -> f32 {
    stationatmos_logic::constants::T20C
}

/// What a device does each tick, plus the node names it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceKind {
    PressurePump {
        inlet: String,
        outlet: String,
        #[serde(default)]
        settings: PressurePumpSettings,
    },
    VolumePump {
        inlet: String,
        outlet: String,
        #[serde(default)]
        settings: VolumePumpSettings,
    },
    PassiveGate {
        inlet: String,
        outlet: String,
        #[serde(default)]
        settings: PassiveGateSettings,
    },
    Filter {
        inlet: String,
        filter: String,
        outlet: String,
        #[serde(default)]
        settings: FilterSettings,
    },
    Mixer {
        inlet_one: String,
        inlet_two: String,
        outlet: String,
        #[serde(default)]
        settings: MixerSettings,
    },
    Vent {
        pipe: String,
        #[serde(default)]
        settings: VentSettings,
    },
    PassiveVent {
        pipe: String,
    },
    Scrubber {
        pipe: String,
        /// Also scrub the four neighbouring tiles.
        #[serde(default)]
        wide_net: bool,
        #[serde(default)]
        settings: ScrubberSettings,
    },
    OutletInjector {
        pipe: String,
        #[serde(default = "default_injector_rate")]
        volume_rate: f32,
    },
    Generator {
        pipe: String,
        #[serde(default)]
        settings: GeneratorSettings,
    },
    Heater {
        pipe: String,
        #[serde(default = "default_heater_target")]
        target_temperature: f32,
    },
    ThermoMachine {
        pipe: String,
        #[serde(default)]
        settings: ThermoMachineSettings,
    },
    /// Keeps two of its own nodes at the same pressure.
    Port {
        pipe: String,
        connected: String,
    },
    /// Portable storage. `tank` is an unconnected node holding the contents;
    /// `port` mixes with whatever net it is attached to.
    Canister {
        tank: String,
        port: String,
        #[serde(default)]
        settings: CanisterSettings,
    },
    /// Tile-side source with no pipe nodes.
    Miner {
        #[serde(default)]
        settings: MinerSettings,
    },
}

impl DeviceKind {
    /// Node names in the order the tick code expects them.
    pub fn port_names(&self) -> Vec<&str> {
        match self {
            DeviceKind::PressurePump { inlet, outlet, .. }
            | DeviceKind::VolumePump { inlet, outlet, .. }
            | DeviceKind::PassiveGate { inlet, outlet, .. } => {
                vec![inlet.as_str(), outlet.as_str()]
            }
            DeviceKind::Filter {
                inlet,
                filter,
                outlet,
                ..
            } => vec![inlet.as_str(), filter.as_str(), outlet.as_str()],
            DeviceKind::Mixer {
                inlet_one,
                inlet_two,
                outlet,
                ..
            } => vec![inlet_one.as_str(), inlet_two.as_str(), outlet.as_str()],
            DeviceKind::Vent { pipe, .. }
            | DeviceKind::PassiveVent { pipe }
            | DeviceKind::Scrubber { pipe, .. }
            | DeviceKind::OutletInjector { pipe, .. }
            | DeviceKind::Generator { pipe, .. }
            | DeviceKind::Heater { pipe, .. }
            | DeviceKind::ThermoMachine { pipe, .. } => vec![pipe.as_str()],
            DeviceKind::Port { pipe, connected } => vec![pipe.as_str(), connected.as_str()],
            DeviceKind::Canister { tank, port, .. } => vec![tank.as_str(), port.as_str()],
            DeviceKind::Miner { .. } => Vec::new(),
        }
    }

    /// Delta-time aware devices go in the atmos-device registry instead of
    /// the per-tick pipe-net one.
    pub fn is_atmos_device(&self) -> bool {
        matches!(self, DeviceKind::ThermoMachine { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::PressurePump { .. } => "pressure pump",
            DeviceKind::VolumePump { .. } => "volume pump",
            DeviceKind::PassiveGate { .. } => "passive gate",
            DeviceKind::Filter { .. } => "filter",
            DeviceKind::Mixer { .. } => "mixer",
            DeviceKind::Vent { .. } => "vent",
            DeviceKind::PassiveVent { .. } => "passive vent",
            DeviceKind::Scrubber { .. } => "scrubber",
            DeviceKind::OutletInjector { .. } => "outlet injector",
            DeviceKind::Generator { .. } => "generator",
            DeviceKind::Heater { .. } => "heater",
            DeviceKind::ThermoMachine { .. } => "thermo machine",
            DeviceKind::Port { .. } => "gas port",
            DeviceKind::Canister { .. } => "canister",
            DeviceKind::Miner { .. } => "gas miner",
        }
    }
}

/// Port resolution state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortState {
    /// Not initialized yet. The device does nothing until it is.
    #[default]
    Unresolved,
    /// Node indices, parallel to `DeviceKind::port_names`.
    Resolved(Vec<usize>),
    /// A port could not be found. Logged once, never retried.
    Inert,
}

/// Device component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmosDevice {
    pub kind: DeviceKind,
    pub enabled: bool,
    pub ports: PortState,
}

impl AtmosDevice {
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            enabled: true,
            ports: PortState::Unresolved,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_inert(&self) -> bool {
        self.ports == PortState::Inert
    }

    pub fn resolved_ports(&self) -> Option<&[usize]> {
        match &self.ports {
            PortState::Resolved(indices) => Some(indices),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stationatmos_logic::Gas;

    #[test]
    fn test_device_json_uses_type_tag_and_defaults() {
        let json = r#"{ "type": "Filter", "inlet": "in", "filter": "side", "outlet": "out",
                        "settings": { "gases": ["Plasma"] } }"#;
        let kind: DeviceKind = serde_json::from_str(json).unwrap();
        assert_eq!(kind.port_names(), vec!["in", "side", "out"]);
        match kind {
            DeviceKind::Filter { settings, .. } => {
                assert_eq!(settings.gases, vec![Gas::Plasma]);
                assert!(settings.transfer_rate > 0.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_only_thermo_machines_are_atmos_devices() {
        let thermo = DeviceKind::ThermoMachine {
            pipe: "pipe".into(),
            settings: ThermoMachineSettings::default(),
        };
        let vent = DeviceKind::PassiveVent { pipe: "pipe".into() };
        assert!(thermo.is_atmos_device());
        assert!(!vent.is_atmos_device());
    }

    #[test]
    fn test_miner_needs_no_ports() {
        let kind: DeviceKind = serde_json::from_str(r#"{ "type": "Miner" }"#).unwrap();
        assert!(kind.port_names().is_empty());
        assert_eq!(kind.label(), "gas miner");
    }

    #[test]
    fn test_new_device_starts_unresolved() {
        let device = AtmosDevice::new(DeviceKind::Heater {
            pipe: "pipe".into(),
            target_temperature: 400.0,
        });
        assert_eq!(device.ports, PortState::Unresolved);
        assert!(device.resolved_ports().is_none());
        assert!(!device.is_inert());
    }
}
