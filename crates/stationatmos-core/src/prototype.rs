//! Data-driven entity prototypes
//!
//! Prototypes declare an entity's pipe nodes (name, directions, volume and
//! starting gas) and an optional device block. They are loaded from JSON; the
//! built-in set is embedded at compile time from `data/prototypes.json`.

use crate::components::{DeviceKind, PipeNode};
use crate::error::AtmosError;
use serde::{Deserialize, Serialize};
use stationatmos_logic::constants::{DEFAULT_PIPE_VOLUME, T20C};
use stationatmos_logic::{Direction, Gas, GasMixture, PipeDirection};
use std::collections::{BTreeMap, HashSet};

const BUILTIN_PROTOTYPES: &str = include_str!("../../../data/prototypes.json");

/// Starting gas for a node or a destruction behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirPrototype {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub moles: BTreeMap<Gas, f32>,
}

fn default_temperature() -> f32 {
    T20C
}

fn default_volume() -> f32 {
    DEFAULT_PIPE_VOLUME
}

impl AirPrototype {
    /// Build a mixture with no volume, for merging into something else.
    pub fn build(&self) -> GasMixture {
        self.build_with_volume(0.0)
    }

    pub fn build_with_volume(&self, volume: f32) -> GasMixture {
        let mut air = GasMixture::new(volume).with_temperature(self.temperature);
        for (&gas, &moles) in &self.moles {
            air.adjust_moles(gas, moles);
        }
        air
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePrototype {
    pub name: String,
    pub directions: Vec<Direction>,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub air: Option<AirPrototype>,
}

impl NodePrototype {
    pub fn build(&self) -> PipeNode {
        let directions = PipeDirection::from_directions(&self.directions);
        let node = PipeNode::new(self.name.clone(), directions).with_volume(self.volume);
        match &self.air {
            Some(air) => node.with_air(&air.build_with_volume(self.volume)),
            None => node,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPrototype {
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<NodePrototype>,
    #[serde(default)]
    pub device: Option<DeviceKind>,
    /// Gas released when the entity is destroyed.
    #[serde(default)]
    pub spawn_gas: Option<AirPrototype>,
}

impl EntityPrototype {
    pub fn build_nodes(&self) -> Vec<PipeNode> {
        self.nodes.iter().map(NodePrototype::build).collect()
    }

    fn validate(&self) -> Result<(), AtmosError> {
        let invalid = |reason: String| AtmosError::InvalidPrototype {
            id: self.id.clone(),
            reason,
        };

        let mut names = HashSet::new();
        for node in &self.nodes {
            // A node without volume has no pressure, so nothing bounds it.
            if !node.volume.is_finite() || node.volume <= 0.0 {
                return Err(invalid(format!(
                    "node '{}' needs a positive volume, got {}",
                    node.name, node.volume
                )));
            }
            if !names.insert(node.name.as_str()) {
                return Err(invalid(format!("duplicate node '{}'", node.name)));
            }
        }

        if let Some(device) = &self.device {
            for port in device.port_names() {
                if !names.contains(port) {
                    return Err(invalid(format!("device port '{}' has no node", port)));
                }
            }
        }
        Ok(())
    }
}

/// A loaded, validated set of prototypes keyed by id
#[derive(Debug, Clone, Default)]
pub struct PrototypeSet {
    prototypes: BTreeMap<String, EntityPrototype>,
}

impl PrototypeSet {
    /// Parse and validate a JSON array of prototypes.
    pub fn from_json(json: &str) -> Result<Self, AtmosError> {
        let list: Vec<EntityPrototype> = serde_json::from_str(json)?;

        let mut prototypes = BTreeMap::new();
        for proto in list {
            proto.validate()?;
            if prototypes.contains_key(&proto.id) {
                return Err(AtmosError::InvalidPrototype {
                    id: proto.id,
                    reason: "duplicate id".to_string(),
                });
            }
            prototypes.insert(proto.id.clone(), proto);
        }

        log::info!("Loaded {} atmos prototypes", prototypes.len());
        Ok(Self { prototypes })
    }

    /// The prototypes shipped with the crate
    pub fn builtin() -> Result<Self, AtmosError> {
        Self::from_json(BUILTIN_PROTOTYPES)
    }

    pub fn get(&self, id: &str) -> Result<&EntityPrototype, AtmosError> {
        self.prototypes
            .get(id)
            .ok_or_else(|| AtmosError::UnknownPrototype(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.prototypes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
