//! Pipe node components.
//!
//! A pipe-bearing entity carries one `NodeContainer` with one or more named
//! `PipeNode`s. A plain pipe has a single node; a pump has an inlet and an
//! outlet node on the same tile, which never connect to each other.

use crate::pipenet::NetId;
use serde::{Deserialize, Serialize};
use stationatmos_logic::constants::{DEFAULT_PIPE_VOLUME, T20C};
use stationatmos_logic::{GasMixture, PipeDirection};

/// One length of pipe belonging to an entity.
///
/// While `net` is `None` the node is isolated and `air` is its gas. Once it
/// joins a net the gas is merged into the net and `air` is left empty, so the
/// effective gas is always exactly one of the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeNode {
    pub name: String,
    /// Connection directions before the entity's rotation is applied.
    pub directions: PipeDirection,
    /// Portable connectors can switch their connections off.
    pub connection_enabled: bool,
    pub net: Option<NetId>,
    /// Local buffer. Its volume is the node's volume.
    pub air: GasMixture,
}

impl PipeNode {
    pub fn new(name: impl Into<String>, directions: PipeDirection) -> Self {
        Self {
            name: name.into(),
            directions,
            connection_enabled: true,
            net: None,
            air: GasMixture::new(DEFAULT_PIPE_VOLUME).with_temperature(T20C),
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.air.set_volume(volume);
        self
    }

    /// Start with this gas. The node keeps its own volume.
    pub fn with_air(mut self, air: &GasMixture) -> Self {
        self.air.copy_from(air);
        self
    }

    pub fn volume(&self) -> f32 {
        self.air.volume()
    }

    pub fn is_networked(&self) -> bool {
        self.net.is_some()
    }
}

/// Every pipe node of one entity, addressed by name or index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeContainer {
    pub nodes: Vec<PipeNode>,
}

impl NodeContainer {
    pub fn new(nodes: Vec<PipeNode>) -> Self {
        Self { nodes }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&PipeNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PipeNode> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    /// Moles held in local buffers (isolated nodes only hold any).
    pub fn local_moles(&self) -> f32 {
        self.nodes.iter().map(|n| n.air.total_moles()).sum()
    }
}
