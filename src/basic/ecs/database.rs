//! Population of the network database: adding, removing and renumbering
//! buses, devices and groupings.
//!
//! Rejected calls never fail at the call level. The reason is written to the
//! toolkit log sink and the call returns `false`.
use tracing::debug;

use super::elements::*;
use super::lookup::{DeviceLookup, GroupLookup, NodeLookup};
use super::network::{DataOps, PowerGrid};
use crate::timeseries::MeterRegistry;
use crate::toolkit::id::{BusNumber, DeviceClass, DeviceId, Terminal};

impl PowerGrid {
    pub fn add_bus(&mut self, number: BusNumber, name: &str, base_kv: f64) -> bool {
        let capacity = self.capacity().clone();
        if number == 0 || number > capacity.max_bus_number {
            self.report(format!(
                "Bus {number} is out of the allowed range 1..={}. It will not be added.",
                capacity.max_bus_number
            ));
            return false;
        }
        if self.bus_entity(number).is_some() {
            self.report(format!("Bus {number} already exists. Duplicate is not added."));
            return false;
        }
        if self.bus_count() >= capacity.buses {
            self.report(format!(
                "Bus capacity {} is reached. Bus {number} will not be added.",
                capacity.buses
            ));
            return false;
        }
        let world = self.world_mut();
        let entity = world.spawn(BusBundle::new(number, name, base_kv)).id();
        world.resource_mut::<NodeLookup>().insert(number, entity);
        debug!(bus = number, "bus added");
        true
    }

    pub fn add_device(&mut self, id: DeviceId) -> bool {
        if let Some(missing) = id.buses().into_iter().find(|b| self.bus_entity(*b).is_none()) {
            self.report(format!("Bus {missing} of {id} does not exist. Device will not be added."));
            return false;
        }
        if self.device_entity(&id).is_some() {
            self.report(format!("{id} already exists. Duplicate is not added."));
            return false;
        }
        let limit = self.capacity().device(id.class);
        if self.device_count(id.class) >= limit {
            self.report(format!(
                "{} capacity {limit} is reached. {id} will not be added.",
                id.class
            ));
            return false;
        }
        let world = self.world_mut();
        let mut entity = world.spawn((
            DeviceTag(id.clone()),
            EntityName::default(),
            Ownership::default(),
            DynamicModels::default(),
        ));
        match (id.class, id.terminal) {
            (c, _) if c.is_source() => {
                entity.insert(SourceDevice::default());
            }
            (DeviceClass::Load, _) => {
                entity.insert(LoadDevice::default());
            }
            (DeviceClass::FixedShunt, _) => {
                entity.insert(ShuntDevice::default());
            }
            (DeviceClass::EquivalentDevice, _) => {
                entity.insert(EquivalentDevice::default());
            }
            (DeviceClass::Line, _) => {
                entity.insert((LineDevice::default(), LineFaults::default()));
            }
            (DeviceClass::Transformer, Terminal::Triple(i, j, k)) => {
                entity.insert(TransformerDevice::new(i, j, k));
            }
            (DeviceClass::Hvdc, Terminal::Double(i, j)) => {
                entity.insert(HvdcDevice::new(i, j));
            }
            _ => {}
        }
        let entity = entity.id();
        debug!(device = %id, "device added");
        world.resource_mut::<DeviceLookup>().insert(id, entity);
        true
    }

    pub fn add_group(&mut self, kind: GroupKind, number: u32, name: &str) -> bool {
        if number == 0 {
            self.report(format!("{} 0 is reserved. It will not be added.", kind.name()));
            return false;
        }
        if self.group_entity(kind, number).is_some() {
            self.report(format!("{} {number} already exists. Duplicate is not added.", kind.name()));
            return false;
        }
        let limit = self.capacity().group(kind);
        if self.group_count(kind) >= limit {
            self.report(format!(
                "{} capacity {limit} is reached. {} {number} will not be added.",
                kind.name(),
                kind.name()
            ));
            return false;
        }
        let world = self.world_mut();
        let mut entity = world.spawn((GroupID { kind, number }, EntityName(name.to_string())));
        if kind == GroupKind::Area {
            entity.insert(AreaData::default());
        }
        let entity = entity.id();
        world.resource_mut::<GroupLookup>().insert(kind, number, entity);
        true
    }

    /// Removes a bus together with every device connected to it.
    pub fn remove_bus(&mut self, number: BusNumber) -> bool {
        if self.bus_entity(number).is_none() {
            return false;
        }
        let attached = self.world().resource::<DeviceLookup>().at_bus(number);
        for (id, _) in attached {
            self.remove_device(&id);
        }
        let world = self.world_mut();
        let Some(entity) = world.resource_mut::<NodeLookup>().remove_id(number) else {
            return false;
        };
        world.despawn(entity);
        debug!(bus = number, "bus removed");
        true
    }

    pub fn remove_device(&mut self, id: &DeviceId) -> bool {
        let world = self.world_mut();
        let Some(entity) = world.resource_mut::<DeviceLookup>().remove(id) else {
            return false;
        };
        world.despawn(entity);
        true
    }

    pub fn remove_group(&mut self, kind: GroupKind, number: u32) -> bool {
        let world = self.world_mut();
        let Some(entity) = world.resource_mut::<GroupLookup>().remove(kind, number) else {
            return false;
        };
        world.despawn(entity);
        true
    }

    /// Renumbers a bus and rewrites every identifier and winding that
    /// refers to it. Enumeration order is kept.
    pub fn change_bus_number(&mut self, old: BusNumber, new: BusNumber) -> bool {
        let max = self.capacity().max_bus_number;
        let Some(bus) = self.bus_entity(old) else {
            self.report(format!("Bus {old} does not exist. Bus number is not changed."));
            return false;
        };
        if new == 0 || new > max {
            self.report(format!("Bus {new} is out of the allowed range 1..={max}. Bus {old} is not renumbered."));
            return false;
        }
        if self.bus_entity(new).is_some() {
            self.report(format!("Bus {new} already exists. Bus {old} is not renumbered."));
            return false;
        }
        let world = self.world_mut();
        if let Some(mut id) = world.get_mut::<BusID>(bus) {
            id.0 = new;
        }
        world.resource_mut::<NodeLookup>().renumber(old, new);

        let attached = world.resource::<DeviceLookup>().at_bus(old);
        for (id, entity) in attached {
            let renamed = id.renumbered(old, new);
            world.resource_mut::<DeviceLookup>().rekey(&id, renamed.clone());
            if let Some(mut tag) = world.get_mut::<DeviceTag>(entity) {
                tag.0 = renamed;
            }
            if let Some(mut tr) = world.get_mut::<TransformerDevice>(entity) {
                tr.windings.iter_mut().filter(|w| w.bus == old).for_each(|w| w.bus = new);
            }
            if let Some(mut dc) = world.get_mut::<HvdcDevice>(entity) {
                dc.converters.iter_mut().filter(|c| c.bus == old).for_each(|c| c.bus = new);
            }
        }
        let mut areas = world.query::<&mut AreaData>();
        for mut area in areas.iter_mut(world) {
            if area.swing_bus == old {
                area.swing_bus = new;
            }
        }
        world.resource_mut::<MeterRegistry>().retarget_bus(old, new);
        debug!(old, new, "bus renumbered");
        true
    }

    pub fn bus_count(&self) -> usize {
        self.world().resource::<NodeLookup>().len()
    }

    pub fn device_count(&self, class: DeviceClass) -> usize {
        self.world().resource::<DeviceLookup>().count(class)
    }

    pub fn group_count(&self, kind: GroupKind) -> usize {
        self.world().resource::<GroupLookup>().count(kind)
    }

    pub fn in_service_bus_count(&self) -> usize {
        let world = self.world();
        world
            .resource::<NodeLookup>()
            .iter()
            .filter(|(_, e)| world.get::<BusData>(*e).is_some_and(BusData::in_service))
            .count()
    }

    /// First bus in insertion order whose name matches; 0 when none does.
    pub fn bus_name2number(&self, name: &str) -> BusNumber {
        let world = self.world();
        let name = name.trim();
        world
            .resource::<NodeLookup>()
            .iter()
            .find(|(_, e)| world.get::<EntityName>(*e).is_some_and(|n| n.trim() == name))
            .map_or(0, |(b, _)| b)
    }

    pub fn bus_number2name(&self, number: BusNumber) -> String {
        self.bus_entity(number)
            .and_then(|e| self.get::<EntityName>(e))
            .map(|n| n.0.clone())
            .unwrap_or_default()
    }

    /// Identifiers of `class`, in insertion order.
    pub fn device_ids(&self, class: DeviceClass) -> Vec<DeviceId> {
        self.world()
            .resource::<DeviceLookup>()
            .iter(class)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn bus_numbers(&self) -> Vec<BusNumber> {
        self.world().resource::<NodeLookup>().iter().map(|(b, _)| b).collect()
    }

    /// The stored identifier matching `id`, which may name the terminals in
    /// another order.
    pub fn stored_id(&self, id: &DeviceId) -> Option<DeviceId> {
        let entity = self.device_entity(id)?;
        self.get::<DeviceTag>(entity).map(|t| t.0.clone())
    }

    /// Generation of in-service sources minus demand of in-service loads.
    pub fn powerflow_loss_mw(&mut self) -> f64 {
        let world = self.world_mut();
        let generation: f64 = world
            .query::<&SourceDevice>()
            .iter(world)
            .filter(|s| s.status)
            .map(|s| s.pgen_mw)
            .sum();
        let demand: f64 = world
            .query::<&LoadDevice>()
            .iter(world)
            .map(|l| l.power_mva().re)
            .sum();
        generation - demand
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::ecs::network::Capacity;

    fn line(i: i32, j: i32, c: &str) -> DeviceId {
        DeviceId::decode(DeviceClass::Line, &(i, j, c)).unwrap()
    }

    #[test]
    fn devices_need_their_buses() {
        let mut grid = PowerGrid::default();
        grid.add_bus(1, "A", 110.0);
        assert!(!grid.add_device(line(1, 2, "1")));
        grid.add_bus(2, "B", 110.0);
        assert!(grid.add_device(line(1, 2, "1")));
        assert!(!grid.add_device(line(2, 1, "1")));
        assert!(grid.add_device(line(2, 1, "2")));
        assert_eq!(grid.device_count(DeviceClass::Line), 2);
    }

    #[test]
    fn capacity_and_range_limits() {
        let mut grid = PowerGrid::default();
        *grid.capacity_mut() = Capacity {
            max_bus_number: 10,
            buses: 2,
            ..Default::default()
        };
        assert!(!grid.add_bus(0, "ZERO", 1.0));
        assert!(!grid.add_bus(11, "BIG", 1.0));
        assert!(grid.add_bus(1, "A", 1.0));
        assert!(grid.add_bus(2, "B", 1.0));
        assert!(!grid.add_bus(3, "C", 1.0));
        assert_eq!(grid.bus_count(), 2);
    }

    #[test]
    fn removing_a_bus_removes_its_devices() {
        let mut grid = PowerGrid::default();
        for b in 1..=3 {
            grid.add_bus(b, &format!("B{b}"), 20.0);
        }
        grid.add_device(line(1, 2, "1"));
        grid.add_device(line(2, 3, "1"));
        grid.add_device(DeviceId::decode(DeviceClass::Load, &(2, "L")).unwrap());
        assert!(grid.remove_bus(2));
        assert_eq!(grid.device_count(DeviceClass::Line), 0);
        assert_eq!(grid.device_count(DeviceClass::Load), 0);
        assert_eq!(grid.bus_numbers(), vec![1, 3]);
        assert!(!grid.remove_bus(2));
    }

    #[test]
    fn renumbering_rewrites_identifiers() {
        let mut grid = PowerGrid::default();
        grid.add_bus(1, "A", 230.0);
        grid.add_bus(2, "B", 20.0);
        grid.add_bus(3, "C", 230.0);
        let tr = DeviceId::decode(DeviceClass::Transformer, &(1, 2, "T")).unwrap();
        grid.add_device(tr.clone());
        grid.add_device(line(3, 1, "1"));
        grid.add_group(GroupKind::Area, 1, "AREA 1");
        {
            let world = grid.world_mut();
            let mut areas = world.query::<&mut AreaData>();
            areas.single_mut(world).unwrap().swing_bus = 1;
        }

        assert!(!grid.change_bus_number(1, 3));
        assert!(grid.change_bus_number(1, 7));
        assert_eq!(grid.bus_numbers(), vec![7, 2, 3]);
        assert_eq!(grid.device_ids(DeviceClass::Line), vec![line(3, 7, "1")]);
        let moved = DeviceId::decode(DeviceClass::Transformer, &(7, 2, "T")).unwrap();
        let entity = grid.device_entity(&moved).unwrap();
        assert_eq!(grid.get::<TransformerDevice>(entity).unwrap().windings[0].bus, 7);
        assert!(grid.device_entity(&tr).is_none());
        let world = grid.world_mut();
        let mut areas = world.query::<&AreaData>();
        assert_eq!(areas.single(world).unwrap().swing_bus, 7);
    }

    #[test]
    fn meters_follow_renumbered_buses() {
        use crate::timeseries::{MeterSpec, record_sample};
        use crate::toolkit::param::EntityRef;

        let mut grid = PowerGrid::default();
        grid.add_bus(1, "A", 110.0);
        let gen_id = DeviceId::decode(DeviceClass::Generator, &(1, "G")).unwrap();
        grid.add_device(gen_id.clone());
        assert!(grid.prepare_meter(&MeterSpec::new(EntityRef::Bus(1), "VOLTAGE IN PU")));
        assert!(grid.prepare_meter(&MeterSpec::new(gen_id, "ACTIVE POWER IN MW")));

        assert!(grid.change_bus_number(1, 5));
        record_sample(grid.world_mut());
        let values: Vec<f64> = grid.meters().meters.iter().map(|m| m.values[0]).collect();
        assert_eq!(values, vec![1.0, 0.0]);
    }

    #[test]
    fn names_and_numbers() {
        let mut grid = PowerGrid::default();
        grid.add_bus(4, "NORTH", 230.0);
        grid.add_bus(5, "NORTH", 230.0);
        assert_eq!(grid.bus_name2number(" NORTH "), 4);
        assert_eq!(grid.bus_name2number("SOUTH"), 0);
        assert_eq!(grid.bus_number2name(5), "NORTH");
        assert_eq!(grid.bus_number2name(6), "");
    }
}
