//! Pipe-net store.
//!
//! A pipe net is a maximal connected set of pipe nodes sharing one gas
//! mixture. Nets are owned here, keyed by `NetId`, and nodes refer to them by
//! id. There is no "null net": a node that belongs to no net holds its own
//! gas.

use hecs::Entity;
use serde::{Deserialize, Serialize};
use stationatmos_logic::GasMixture;
use std::collections::BTreeMap;

/// Handle to a pipe net. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetId(pub u32);

/// One node of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub entity: Entity,
    pub index: usize,
}

impl NodeRef {
    pub fn new(entity: Entity, index: usize) -> Self {
        Self { entity, index }
    }
}

#[derive(Debug, Clone)]
pub struct PipeNet {
    /// Shared gas. Its volume is the sum of the members' volumes.
    pub air: GasMixture,
    pub members: Vec<NodeRef>,
}

impl PipeNet {
    pub fn contains(&self, node: NodeRef) -> bool {
        self.members.contains(&node)
    }
}

/// All live pipe nets plus the topology dirty flag.
#[derive(Debug, Default)]
pub struct PipeNets {
    nets: BTreeMap<NetId, PipeNet>,
    next_id: u32,
    dirty: bool,
}

impl PipeNets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, air: GasMixture, members: Vec<NodeRef>) -> NetId {
        let id = NetId(self.next_id);
        self.next_id += 1;
        self.nets.insert(id, PipeNet { air, members });
        id
    }

    pub fn get(&self, id: NetId) -> Option<&PipeNet> {
        self.nets.get(&id)
    }

    pub fn get_mut(&mut self, id: NetId) -> Option<&mut PipeNet> {
        self.nets.get_mut(&id)
    }

    pub fn contains(&self, id: NetId) -> bool {
        self.nets.contains_key(&id)
    }

    pub fn remove(&mut self, id: NetId) -> Option<PipeNet> {
        self.nets.remove(&id)
    }

    /// Remove and return every net, in id order.
    pub fn drain(&mut self) -> Vec<(NetId, PipeNet)> {
        std::mem::take(&mut self.nets).into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NetId, &PipeNet)> {
        self.nets.iter().map(|(id, net)| (*id, net))
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Request a rebuild on the next tick.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn total_moles(&self) -> f32 {
        self.nets.values().map(|n| n.air.total_moles()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    #[test]
    fn test_ids_are_not_reused() {
        let mut world = World::new();
        let e = world.spawn(());
        let mut nets = PipeNets::new();

        let a = nets.create(GasMixture::new(10.0), vec![NodeRef::new(e, 0)]);
        nets.remove(a);
        let b = nets.create(GasMixture::new(10.0), vec![NodeRef::new(e, 0)]);

        assert_ne!(a, b);
        assert!(!nets.contains(a));
        assert!(nets.get(b).map(|n| n.contains(NodeRef::new(e, 0))).unwrap_or(false));
    }

    #[test]
    fn test_drain_empties_store() {
        let mut nets = PipeNets::new();
        nets.create(GasMixture::new(1.0), Vec::new());
        nets.create(GasMixture::new(1.0), Vec::new());
        let drained = nets.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained[0].0 < drained[1].0);
        assert!(nets.is_empty());
    }
}
