//! Enumeration cursors.
//!
//! A search takes a snapshot of the matching keys when it begins; the
//! cursor then walks that snapshot. There is one cursor per searched
//! collection, so beginning a new search of the same collection replaces
//! the previous one.
use std::collections::HashMap;

use bevy_ecs::prelude::*;

use super::elements::*;
use super::lookup::{DeviceLookup, GroupLookup, NodeLookup};
use super::network::{DataOps, PowerGrid};
use crate::toolkit::id::{BusNumber, DeviceClass, DeviceId};

/// Collection a cursor walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    Bus,
    Device(DeviceClass),
    Group(GroupKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchItem {
    Number(u32),
    Device(DeviceId),
}

/// Bus search filter. A zero bound or membership is a wildcard.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BusFilter {
    pub vbase_min_kv: f64,
    pub vbase_max_kv: f64,
    pub v_min_pu: f64,
    pub v_max_pu: f64,
    pub area: u32,
    pub zone: u32,
    pub owner: u32,
}

fn within(value: f64, min: f64, max: f64) -> bool {
    (min <= 0.0 || value >= min) && (max <= 0.0 || value <= max)
}

fn matches_group(wanted: u32, actual: u32) -> bool {
    wanted == 0 || wanted == actual
}

impl BusFilter {
    pub fn accepts(&self, data: &BusData, membership: &Membership) -> bool {
        within(data.base_kv, self.vbase_min_kv, self.vbase_max_kv)
            && within(data.vm_pu, self.v_min_pu, self.v_max_pu)
            && matches_group(self.area, membership.area)
            && matches_group(self.zone, membership.zone)
            && matches_group(self.owner, membership.owner)
    }
}

#[derive(Debug, Default)]
struct Cursor {
    items: Vec<SearchItem>,
    position: usize,
}

#[derive(Debug, Default, Resource)]
pub struct SearchCursors {
    cursors: HashMap<SearchKind, Cursor>,
}

impl SearchCursors {
    fn begin(&mut self, kind: SearchKind, items: Vec<SearchItem>) {
        self.cursors.insert(kind, Cursor { items, position: 0 });
    }

    pub fn current(&self, kind: SearchKind) -> Option<&SearchItem> {
        let cursor = self.cursors.get(&kind)?;
        cursor.items.get(cursor.position)
    }

    /// Moves past the current item. Advancing an exhausted cursor does
    /// nothing.
    pub fn advance(&mut self, kind: SearchKind) {
        if let Some(cursor) = self.cursors.get_mut(&kind) {
            cursor.position = (cursor.position + 1).min(cursor.items.len());
        }
    }
}

impl PowerGrid {
    pub fn begin_bus_search(&mut self, filter: &BusFilter) {
        let world = self.world();
        let items = world
            .resource::<NodeLookup>()
            .iter()
            .filter(|(_, e)| match (world.get::<BusData>(*e), world.get::<Membership>(*e)) {
                (Some(data), Some(membership)) => filter.accepts(data, membership),
                _ => false,
            })
            .map(|(b, _)| SearchItem::Number(b))
            .collect();
        self.cursors_mut().begin(SearchKind::Bus, items);
    }

    /// Devices of `class`, optionally only those connected to `bus`
    /// (0 means every device of the class).
    pub fn begin_device_search(&mut self, class: DeviceClass, bus: BusNumber) {
        let items = self
            .world()
            .resource::<DeviceLookup>()
            .iter(class)
            .filter(|(id, _)| bus == 0 || id.touches(bus))
            .map(|(id, _)| SearchItem::Device(id.clone()))
            .collect();
        self.cursors_mut().begin(SearchKind::Device(class), items);
    }

    pub fn begin_group_search(&mut self, kind: GroupKind) {
        let items = self
            .world()
            .resource::<GroupLookup>()
            .numbers(kind)
            .into_iter()
            .map(SearchItem::Number)
            .collect();
        self.cursors_mut().begin(SearchKind::Group(kind), items);
    }

    pub fn search_current(&self, kind: SearchKind) -> Option<SearchItem> {
        self.world().resource::<SearchCursors>().current(kind).cloned()
    }

    pub fn search_advance(&mut self, kind: SearchKind) {
        self.cursors_mut().advance(kind);
    }

    fn cursors_mut(&mut self) -> Mut<'_, SearchCursors> {
        self.world_mut().resource_mut::<SearchCursors>()
    }

    /// Area and zone of the bus a device hangs on.
    pub fn device_membership(&self, id: &DeviceId) -> Option<Membership> {
        let bus = *id.buses().first()?;
        let entity = self.bus_entity(bus)?;
        self.get::<Membership>(entity).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_walks_snapshot_then_ends() {
        let mut grid = PowerGrid::default();
        for b in [3, 1, 2] {
            grid.add_bus(b, "", 110.0);
        }
        grid.begin_bus_search(&BusFilter::default());
        let mut seen = Vec::new();
        while let Some(SearchItem::Number(b)) = grid.search_current(SearchKind::Bus) {
            seen.push(b);
            grid.search_advance(SearchKind::Bus);
        }
        assert_eq!(seen, vec![3, 1, 2]);
        grid.search_advance(SearchKind::Bus);
        assert_eq!(grid.search_current(SearchKind::Bus), None);
    }

    #[test]
    fn bus_filter_wildcards() {
        let data = BusData {
            base_kv: 230.0,
            vm_pu: 1.02,
            ..Default::default()
        };
        let member = Membership { area: 2, zone: 0, owner: 1 };
        assert!(BusFilter::default().accepts(&data, &member));
        let hv = BusFilter {
            vbase_min_kv: 200.0,
            area: 2,
            ..Default::default()
        };
        assert!(hv.accepts(&data, &member));
        let lv = BusFilter {
            vbase_max_kv: 35.0,
            ..Default::default()
        };
        assert!(!lv.accepts(&data, &member));
        let other_zone = BusFilter {
            zone: 4,
            ..Default::default()
        };
        assert!(!other_zone.accepts(&data, &member));
    }

    #[test]
    fn device_search_by_bus() {
        let mut grid = PowerGrid::default();
        for b in 1..=3 {
            grid.add_bus(b, "", 110.0);
        }
        for (i, j) in [(1, 2), (2, 3), (3, 1)] {
            grid.add_device(DeviceId::decode(DeviceClass::Line, &(i, j, "1")).unwrap());
        }
        grid.begin_device_search(DeviceClass::Line, 3);
        let mut found = Vec::new();
        while let Some(SearchItem::Device(id)) = grid.search_current(SearchKind::Device(DeviceClass::Line)) {
            found.push(id.buses());
            grid.search_advance(SearchKind::Device(DeviceClass::Line));
        }
        assert_eq!(found, vec![vec![2, 3], vec![3, 1]]);
    }
}
