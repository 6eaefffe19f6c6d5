use std::collections::HashMap;

use bevy_ecs::prelude::*;
use derive_more::{Deref, DerefMut};
use indexmap::IndexMap;

use super::elements::*;
use super::lookup::NodeLookup;
use super::network::{DataOps, PowerGrid};
use crate::toolkit::id::BusNumber;

/// Lines with |z| below this are zero-impedance ties.
pub const ZERO_IMPEDANCE_PU: f64 = 1e-6;

/// Union-Find over bus numbers.
#[derive(Default, Debug, Clone)]
pub struct NodeMerge {
    parent: HashMap<BusNumber, BusNumber>,
    rank: HashMap<BusNumber, u32>,
}

impl NodeMerge {
    /// Each node starts as its own parent with rank 0.
    pub fn new(nodes: &[BusNumber]) -> Self {
        let mut parent = HashMap::with_capacity(nodes.len());
        let mut rank = HashMap::with_capacity(nodes.len());
        for &node in nodes {
            parent.insert(node, node);
            rank.insert(node, 0);
        }
        NodeMerge { parent, rank }
    }

    /// Root of `node` with path compression. Unknown nodes are their own root.
    pub fn find(&mut self, node: BusNumber) -> BusNumber {
        let mut root = node;
        while let Some(&p) = self.parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        let mut current = node;
        while let Some(&p) = self.parent.get(&current) {
            if p == root {
                break;
            }
            self.parent.insert(current, root);
            current = p;
        }
        root
    }

    /// Merges two nodes by their roots based on rank.
    pub fn union(&mut self, a: BusNumber, b: BusNumber) {
        if !self.parent.contains_key(&a) || !self.parent.contains_key(&b) {
            return;
        }
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let rank_a = self.rank.get(&root_a).copied().unwrap_or(0);
        let rank_b = self.rank.get(&root_b).copied().unwrap_or(0);
        if rank_a < rank_b {
            self.parent.insert(root_a, root_b);
        } else {
            self.parent.insert(root_b, root_a);
            if rank_a == rank_b {
                self.rank.insert(root_a, rank_a + 1);
            }
        }
    }

    /// Groups `order` by root, keeping the first-seen order of groups and of
    /// members inside each group.
    pub fn groups(&mut self, order: &[BusNumber]) -> Vec<Vec<BusNumber>> {
        let mut by_root: IndexMap<BusNumber, Vec<BusNumber>> = IndexMap::new();
        for &node in order {
            let root = self.find(node);
            by_root.entry(root).or_default().push(node);
        }
        by_root.into_values().collect()
    }
}

/// Bus number → representative bus of its zero-impedance group. Only buses
/// that are shadowed by another bus are listed.
#[derive(Default, Debug, Clone, Deref, DerefMut, Resource)]
pub struct OvershadowedBuses(pub HashMap<BusNumber, BusNumber>);

fn in_service_buses(world: &World) -> Vec<BusNumber> {
    world
        .resource::<NodeLookup>()
        .iter()
        .filter(|(_, e)| world.get::<BusData>(*e).is_some_and(BusData::in_service))
        .map(|(b, _)| b)
        .collect()
}

/// Union-Find over in-service buses joined by in-service lines and
/// transformers. HVDC links do not join AC islands.
pub fn ac_islands(world: &mut World) -> (Vec<BusNumber>, NodeMerge) {
    let buses = in_service_buses(world);
    let mut merge = NodeMerge::new(&buses);
    for (tag, line) in world.query::<(&DeviceTag, &LineDevice)>().iter(world) {
        if line.in_service() {
            let b = tag.buses();
            merge.union(b[0], b[1]);
        }
    }
    for tr in world.query::<&TransformerDevice>().iter(world) {
        if tr.in_service() {
            for pair in tr.used_windings().windows(2) {
                merge.union(pair[0].bus, pair[1].bus);
            }
        }
    }
    (buses, merge)
}

impl PowerGrid {
    pub fn islands(&mut self) -> Vec<Vec<BusNumber>> {
        let (buses, mut merge) = ac_islands(self.world_mut());
        merge.groups(&buses)
    }

    /// Recomputes which buses are tied to another bus through a
    /// zero-impedance line and returns how many are shadowed.
    pub fn update_overshadowed_buses(&mut self) -> usize {
        let world = self.world_mut();
        let buses = in_service_buses(world);
        let mut merge = NodeMerge::new(&buses);
        for (tag, line) in world.query::<(&DeviceTag, &LineDevice)>().iter(world) {
            if line.in_service() && line.impedance_pu() < ZERO_IMPEDANCE_PU {
                let b = tag.buses();
                merge.union(b[0], b[1]);
            }
        }
        let mut shadowed = OvershadowedBuses::default();
        for group in merge.groups(&buses) {
            let Some((&first, rest)) = group.split_first() else {
                continue;
            };
            for &bus in rest {
                shadowed.insert(bus, first);
            }
        }
        let count = shadowed.len();
        world.insert_resource(shadowed);
        count
    }

    /// Forgets every zero-impedance grouping until the next update.
    pub fn clear_overshadowed_buses(&mut self) {
        self.world_mut().resource_mut::<OvershadowedBuses>().clear();
    }

    pub fn overshadowed_bus_count(&self) -> usize {
        self.world().resource::<OvershadowedBuses>().len()
    }
}
