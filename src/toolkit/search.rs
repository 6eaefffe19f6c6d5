//! Enumeration.
//!
//! Searches are iterators over the engine cursor of one collection and end
//! with `None`. Beginning another search of the same collection on the same
//! toolkit restarts that cursor, so two live iterators over one collection
//! interfere with each other.
use super::Toolkit;
use super::database::decode;
use super::id::{BusNumber, DeviceClass, DeviceId, IdTuple, Terminal};
use crate::basic::ecs::elements::GroupKind;
use crate::basic::ecs::search::{SearchItem, SearchKind};

pub use crate::basic::ecs::search::BusFilter;

/// Iterator over one engine cursor.
pub struct Search<'a> {
    toolkit: &'a Toolkit,
    kind: SearchKind,
}

impl Iterator for Search<'_> {
    type Item = SearchItem;

    fn next(&mut self) -> Option<SearchItem> {
        let kind = self.kind;
        self.toolkit.with_grid(|grid| {
            let item = grid.search_current(kind)?;
            grid.search_advance(kind);
            Some(item)
        })
    }
}

fn number(item: SearchItem) -> Option<u32> {
    match item {
        SearchItem::Number(n) => Some(n),
        SearchItem::Device(_) => None,
    }
}

fn device(item: SearchItem) -> Option<DeviceId> {
    match item {
        SearchItem::Device(id) => Some(id),
        SearchItem::Number(_) => None,
    }
}

impl Toolkit {
    pub fn search_buses(&self, filter: &BusFilter) -> impl Iterator<Item = BusNumber> + '_ {
        self.with_grid(|grid| grid.begin_bus_search(filter));
        Search { toolkit: self, kind: SearchKind::Bus }.filter_map(number)
    }

    /// Devices of `class` in insertion order; `bus` 0 means all of them,
    /// otherwise only those connected to `bus`.
    pub fn search_devices(&self, class: DeviceClass, bus: BusNumber) -> impl Iterator<Item = DeviceId> + '_ {
        self.with_grid(|grid| grid.begin_device_search(class, bus));
        Search {
            toolkit: self,
            kind: SearchKind::Device(class),
        }
        .filter_map(device)
    }

    fn search_groups(&self, kind: GroupKind) -> impl Iterator<Item = u32> + '_ {
        self.with_grid(|grid| grid.begin_group_search(kind));
        Search {
            toolkit: self,
            kind: SearchKind::Group(kind),
        }
        .filter_map(number)
    }

    pub fn search_areas(&self) -> impl Iterator<Item = u32> + '_ {
        self.search_groups(GroupKind::Area)
    }

    pub fn search_zones(&self) -> impl Iterator<Item = u32> + '_ {
        self.search_groups(GroupKind::Zone)
    }

    pub fn search_owners(&self) -> impl Iterator<Item = u32> + '_ {
        self.search_groups(GroupKind::Owner)
    }

    pub fn get_all_devices(&self, class: DeviceClass) -> Vec<DeviceId> {
        self.search_devices(class, 0).collect()
    }

    pub fn get_devices_at_bus(&self, class: DeviceClass, bus: BusNumber) -> Vec<DeviceId> {
        if bus == 0 {
            return Vec::new();
        }
        self.search_devices(class, bus).collect()
    }

    pub fn lines_between(&self, i: BusNumber, j: BusNumber) -> Vec<DeviceId> {
        self.get_devices_at_bus(DeviceClass::Line, i)
            .into_iter()
            .filter(|id| id.touches(j))
            .collect()
    }

    pub fn hvdcs_between(&self, i: BusNumber, j: BusNumber) -> Vec<DeviceId> {
        self.get_devices_at_bus(DeviceClass::Hvdc, i)
            .into_iter()
            .filter(|id| id.touches(j))
            .collect()
    }

    /// Transformers joining `i`, `j` and `k`; `k` 0 selects two-winding
    /// transformers only.
    pub fn transformers_between(&self, i: BusNumber, j: BusNumber, k: BusNumber) -> Vec<DeviceId> {
        self.get_devices_at_bus(DeviceClass::Transformer, i)
            .into_iter()
            .filter(|id| id.touches(j))
            .filter(|id| match id.terminal {
                Terminal::Triple(_, _, 0) => k == 0,
                _ => k != 0 && id.touches(k),
            })
            .collect()
    }

    /// Sources of `class` whose bus lies in `area` and `zone` (0 matches any).
    pub fn sources_with_constraints(&self, class: DeviceClass, area: u32, zone: u32) -> Vec<DeviceId> {
        if !class.is_source() {
            return Vec::new();
        }
        self.devices_in(class, area, zone)
    }

    pub fn loads_with_constraints(&self, area: u32, zone: u32) -> Vec<DeviceId> {
        self.devices_in(DeviceClass::Load, area, zone)
    }

    fn devices_in(&self, class: DeviceClass, area: u32, zone: u32) -> Vec<DeviceId> {
        let all = self.get_all_devices(class);
        self.with_grid(|grid| {
            all.into_iter()
                .filter(|id| {
                    grid.device_membership(id).is_some_and(|m| {
                        (area == 0 || m.area == area) && (zone == 0 || m.zone == zone)
                    })
                })
                .collect()
        })
    }

    /// Stored identifier of a device, which keeps the terminal order it
    /// was added with.
    pub fn get_device_id(&self, class: DeviceClass, id: impl IdTuple) -> Option<DeviceId> {
        let id = decode(class, &id)?;
        self.with_grid(|grid| grid.stored_id(&id))
    }
}

macro_rules! class_search_ops {
    ($($class:ident: $all:ident, $at_bus:ident;)*) => {
        impl Toolkit {$(
            pub fn $all(&self) -> Vec<DeviceId> {
                self.get_all_devices(DeviceClass::$class)
            }

            pub fn $at_bus(&self, bus: BusNumber) -> Vec<DeviceId> {
                self.get_devices_at_bus(DeviceClass::$class, bus)
            }
        )*}
    };
}

class_search_ops! {
    Generator: get_all_generators, get_generators_at_bus;
    WtGenerator: get_all_wt_generators, get_wt_generators_at_bus;
    PvUnit: get_all_pv_units, get_pv_units_at_bus;
    Load: get_all_loads, get_loads_at_bus;
    FixedShunt: get_all_fixed_shunts, get_fixed_shunts_at_bus;
    Line: get_all_lines, get_lines_at_bus;
    Transformer: get_all_transformers, get_transformers_at_bus;
    Hvdc: get_all_hvdcs, get_hvdcs_at_bus;
    EquivalentDevice: get_all_equivalent_devices, get_equivalent_devices_at_bus;
    EnergyStorage: get_all_energy_storages, get_energy_storages_at_bus;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::id::{Arity, IdField};

    fn meshed() -> Toolkit {
        let tk = Toolkit::new("");
        for b in 1..=4 {
            tk.add_bus(b, "", if b == 4 { 20.0 } else { 230.0 });
        }
        tk.add_line((1, 2, "1"));
        tk.add_line((2, 1, "2"));
        tk.add_line((2, 3, "1"));
        tk.add_transformer((3, 4, "T"));
        tk.add_transformer((1, 2, 4, "T3"));
        tk.add_hvdc((1, 3, "DC"));
        tk
    }

    #[test]
    fn enumeration_is_insertion_ordered_and_ends() {
        let tk = meshed();
        let lines: Vec<DeviceId> = tk.search_devices(DeviceClass::Line, 0).collect();
        assert_eq!(lines.len(), tk.get_line_count());
        assert_eq!(lines[1].buses(), vec![2, 1]);
        let mut it = tk.search_devices(DeviceClass::Line, 0);
        for _ in 0..3 {
            assert!(it.next().is_some());
        }
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }

    #[test]
    fn every_class_enumerates_in_insertion_order() {
        let order: [BusNumber; 4] = [4, 1, 3, 2];
        for class in DeviceClass::ALL {
            let tk = Toolkit::new("");
            for b in 1..=5 {
                tk.add_bus(b, "", 110.0);
            }
            let mut added = Vec::new();
            for (n, &b) in order.iter().enumerate() {
                let circuit = format!("C{n}");
                let tuple: Vec<IdField> = match class.arity() {
                    Arity::Single => vec![b.into(), circuit.into()],
                    Arity::Double => vec![b.into(), 5u32.into(), circuit.into()],
                    Arity::Triple if n % 2 == 0 => vec![b.into(), 5u32.into(), circuit.into()],
                    Arity::Triple => vec![5u32.into(), b.into(), (b % 4 + 1).into(), circuit.into()],
                };
                assert!(tk.add_device(class, &tuple), "{class} {tuple:?}");
                added.push(DeviceId::decode(class, &tuple).unwrap());
            }
            let found: Vec<DeviceId> = tk.search_devices(class, 0).collect();
            assert_eq!(found, added, "{class}");

            let mut it = tk.search_devices(class, 0);
            for id in &added {
                assert_eq!(it.next().as_ref(), Some(id), "{class}");
            }
            assert!(it.next().is_none(), "{class}");
        }
    }

    #[test]
    fn derived_relations() {
        let tk = meshed();
        assert_eq!(tk.lines_between(1, 2).len(), 2);
        assert_eq!(tk.lines_between(3, 1).len(), 0);
        assert_eq!(tk.hvdcs_between(3, 1).len(), 1);
        assert_eq!(tk.transformers_between(4, 3, 0).len(), 1);
        assert_eq!(tk.transformers_between(1, 2, 0).len(), 0);
        assert_eq!(tk.transformers_between(4, 1, 2).len(), 1);
        assert_eq!(tk.get_transformers_at_bus(4).len(), 2);
        assert!(tk.get_lines_at_bus(0).is_empty());
    }

    #[test]
    fn bus_search_and_constraints() {
        let tk = meshed();
        tk.set_bus_data(3, "I", "AREA", 2);
        tk.set_bus_data(4, "I", "AREA", 2);
        tk.set_bus_data(4, "I", "ZONE", 7);
        tk.add_generator((3, "G"));
        tk.add_generator((4, "G"));
        tk.add_load((4, "L"));

        let hv = BusFilter {
            vbase_min_kv: 100.0,
            ..Default::default()
        };
        assert_eq!(tk.search_buses(&hv).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(tk.sources_with_constraints(DeviceClass::Generator, 2, 0).len(), 2);
        assert_eq!(tk.sources_with_constraints(DeviceClass::Generator, 2, 7).len(), 1);
        assert!(tk.sources_with_constraints(DeviceClass::Load, 0, 0).is_empty());
        assert_eq!(tk.loads_with_constraints(0, 7).len(), 1);

        tk.add_area(2, "SOUTH");
        tk.add_area(1, "NORTH");
        assert_eq!(tk.search_areas().collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(tk.search_owners().count(), 0);
    }

    #[test]
    fn stored_ids_keep_terminal_order() {
        let tk = meshed();
        let id = tk.get_device_id(DeviceClass::Line, (1, 2, "2")).unwrap();
        assert_eq!(id.buses(), vec![2, 1]);
    }
}
