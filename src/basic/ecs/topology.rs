//! Topology events: breaker operations, shedding, scaling and faults.
//!
//! Every operation here changes state only; none of them adds or removes
//! entities. A call that names a missing device or an unknown breaker side
//! is reported to the log sink and changes nothing.
use bevy_ecs::prelude::*;
use nalgebra::Complex;

use super::elements::*;
use super::lookup::DeviceLookup;
use super::network::{DataOps, PowerGrid};
use crate::toolkit::id::{BusNumber, DeviceClass, DeviceId, Terminal};

/// Manual HVDC operator flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvdcFlag {
    Blocked,
    Bypassed,
}

fn toggle<T: DeviceData>(world: &mut World, entity: Entity, on: bool) -> bool {
    match world.get_mut::<T>(entity) {
        Some(mut data) => {
            data.set_in_service(on);
            true
        }
        None => false,
    }
}

fn status<T: DeviceData>(world: &World, entity: Entity) -> Option<bool> {
    world.get::<T>(entity).map(T::in_service)
}

/// Breaker state of any device entity.
pub fn device_in_service(world: &World, entity: Entity, class: DeviceClass) -> bool {
    let state = match class {
        c if c.is_source() => status::<SourceDevice>(world, entity),
        DeviceClass::Load => status::<LoadDevice>(world, entity),
        DeviceClass::FixedShunt => status::<ShuntDevice>(world, entity),
        DeviceClass::Line => status::<LineDevice>(world, entity),
        DeviceClass::Transformer => status::<TransformerDevice>(world, entity),
        DeviceClass::Hvdc => status::<HvdcDevice>(world, entity),
        _ => status::<EquivalentDevice>(world, entity),
    };
    state.unwrap_or(false)
}

fn set_in_service(world: &mut World, entity: Entity, class: DeviceClass, on: bool) -> bool {
    match class {
        c if c.is_source() => toggle::<SourceDevice>(world, entity, on),
        DeviceClass::Load => toggle::<LoadDevice>(world, entity, on),
        DeviceClass::FixedShunt => toggle::<ShuntDevice>(world, entity, on),
        DeviceClass::Line => toggle::<LineDevice>(world, entity, on),
        DeviceClass::Transformer => toggle::<TransformerDevice>(world, entity, on),
        DeviceClass::Hvdc => toggle::<HvdcDevice>(world, entity, on),
        _ => toggle::<EquivalentDevice>(world, entity, on),
    }
}

impl PowerGrid {
    fn existing(&mut self, id: &DeviceId) -> Option<Entity> {
        let entity = self.device_entity(id);
        if entity.is_none() {
            self.report(format!("{id} does not exist. Operation is skipped."));
        }
        entity
    }

    pub fn is_device_in_service(&self, id: &DeviceId) -> bool {
        self.device_entity(id)
            .is_some_and(|e| device_in_service(self.world(), e, id.class))
    }

    /// Opens or closes every breaker of a device.
    pub fn set_device_in_service(&mut self, id: &DeviceId, on: bool) -> bool {
        let Some(entity) = self.existing(id) else {
            return false;
        };
        set_in_service(self.world_mut(), entity, id.class, on)
    }

    /// Operates the breaker of a line or transformer at `side_bus`.
    pub fn set_breaker_at(&mut self, id: &DeviceId, side_bus: BusNumber, closed: bool) -> bool {
        let Some(entity) = self.existing(id) else {
            return false;
        };
        let done = match id.class {
            DeviceClass::Line => {
                let terminal = self.get::<DeviceTag>(entity).map(|t| t.terminal);
                match (terminal, self.get_mut::<LineDevice>(entity)) {
                    (Some(Terminal::Double(i, _)), Some(mut line)) if side_bus == i => {
                        line.breaker_send = closed;
                        true
                    }
                    (Some(Terminal::Double(_, j)), Some(mut line)) if side_bus == j => {
                        line.breaker_receive = closed;
                        true
                    }
                    _ => false,
                }
            }
            DeviceClass::Transformer => self
                .get_mut::<TransformerDevice>(entity)
                .and_then(|mut tr| tr.winding_at_bus_mut(side_bus).map(|w| w.breaker = closed))
                .is_some(),
            _ => false,
        };
        if !done {
            self.report(format!("Bus {side_bus} is not a breaker side of {id}. Operation is skipped."));
        }
        done
    }

    /// Takes a bus out of service and trips everything connected to it.
    pub fn trip_bus(&mut self, bus: BusNumber) -> bool {
        let Some(entity) = self.bus_entity(bus) else {
            self.report(format!("Bus {bus} does not exist. It cannot be tripped."));
            return false;
        };
        if let Some(mut data) = self.get_mut::<BusData>(entity) {
            data.bus_type = BusType::OutOfService;
        }
        let world = self.world_mut();
        let attached = world.resource::<DeviceLookup>().at_bus(bus);
        for (id, e) in attached {
            set_in_service(world, e, id.class, false);
        }
        true
    }

    fn with_source(&mut self, id: &DeviceId, f: impl FnOnce(&mut SourceDevice)) -> bool {
        if !id.class.is_source() {
            self.report(format!("{id} is not a source. Operation is skipped."));
            return false;
        }
        let Some(entity) = self.existing(id) else {
            return false;
        };
        match self.get_mut::<SourceDevice>(entity) {
            Some(mut source) => {
                f(&mut source);
                true
            }
            None => false,
        }
    }

    pub fn shed_source(&mut self, id: &DeviceId, percent: f64) -> bool {
        self.with_source(id, |s| s.shed(percent))
    }

    pub fn trip_source_units(&mut self, id: &DeviceId, n: i64) -> bool {
        self.with_source(id, |s| s.trip_units(n))
    }

    pub fn scale_load(&mut self, id: &DeviceId, percent: f64) -> bool {
        let Some(entity) = self.existing(id) else {
            return false;
        };
        match self.get_mut::<LoadDevice>(entity) {
            Some(mut load) => {
                load.scale(percent);
                true
            }
            None => false,
        }
    }

    pub fn scale_all_loads(&mut self, percent: f64) {
        let world = self.world_mut();
        for mut load in world.query::<&mut LoadDevice>().iter_mut(world) {
            load.scale(percent);
        }
    }

    pub fn set_hvdc_flag(&mut self, id: &DeviceId, flag: HvdcFlag, on: bool) -> bool {
        let Some(entity) = self.existing(id) else {
            return false;
        };
        match self.get_mut::<HvdcDevice>(entity) {
            Some(mut dc) => {
                match flag {
                    HvdcFlag::Blocked => dc.blocked = on,
                    HvdcFlag::Bypassed => dc.bypassed = on,
                }
                true
            }
            None => false,
        }
    }

    pub fn set_bus_fault(&mut self, bus: BusNumber, fault_type: FaultType, y: Complex<f64>) -> bool {
        let Some(entity) = self.bus_entity(bus) else {
            self.report(format!("Bus {bus} does not exist. {fault_type} is not set."));
            return false;
        };
        if let Some(mut faults) = self.get_mut::<BusFaults>(entity) {
            faults.insert(fault_type, y);
        }
        true
    }

    pub fn clear_bus_fault(&mut self, bus: BusNumber, fault_type: FaultType) -> bool {
        self.bus_entity(bus)
            .and_then(|e| self.get_mut::<BusFaults>(e))
            .and_then(|mut faults| faults.shift_remove(&fault_type))
            .is_some()
    }

    pub fn bus_fault(&self, bus: BusNumber, fault_type: FaultType) -> Complex<f64> {
        self.bus_entity(bus)
            .and_then(|e| self.get::<BusFaults>(e))
            .and_then(|faults| faults.get(&fault_type).copied())
            .unwrap_or_default()
    }

    /// Location measured from the sending end, given one measured from
    /// `side_bus`.
    fn sending_end_location(&mut self, id: &DeviceId, side_bus: BusNumber, location: f64) -> Option<(Entity, f64)> {
        if !(0.0..=1.0).contains(&location) {
            self.report(format!("Fault location {location} on {id} is outside [0, 1]. Operation is skipped."));
            return None;
        }
        let entity = self.existing(id)?;
        match self.get::<DeviceTag>(entity).map(|t| t.terminal) {
            Some(Terminal::Double(i, _)) if side_bus == i => Some((entity, location)),
            Some(Terminal::Double(_, j)) if side_bus == j => Some((entity, 1.0 - location)),
            _ => {
                self.report(format!("Bus {side_bus} is not an end of {id}. Operation is skipped."));
                None
            }
        }
    }

    pub fn set_line_fault(
        &mut self,
        id: &DeviceId,
        side_bus: BusNumber,
        location: f64,
        fault_type: FaultType,
        y: Complex<f64>,
    ) -> bool {
        let Some((entity, location)) = self.sending_end_location(id, side_bus, location) else {
            return false;
        };
        match self.get_mut::<LineFaults>(entity) {
            Some(mut faults) => {
                faults.set(LineFault { fault_type, location, y });
                true
            }
            None => false,
        }
    }

    pub fn clear_line_fault(&mut self, id: &DeviceId, side_bus: BusNumber, location: f64, fault_type: FaultType) -> bool {
        let Some((entity, location)) = self.sending_end_location(id, side_bus, location) else {
            return false;
        };
        self.get_mut::<LineFaults>(entity)
            .is_some_and(|mut faults| faults.remove(fault_type, location))
    }

    pub fn line_faults(&self, id: &DeviceId) -> Vec<LineFault> {
        self.device_entity(id)
            .and_then(|e| self.get::<LineFaults>(e))
            .map(|f| f.0.clone())
            .unwrap_or_default()
    }

    pub fn clear_all_faults(&mut self) {
        let world = self.world_mut();
        for mut faults in world.query::<&mut BusFaults>().iter_mut(world) {
            faults.clear();
        }
        for mut faults in world.query::<&mut LineFaults>().iter_mut(world) {
            faults.0.clear();
        }
    }

    /// Total fault admittance seen at a bus: its own faults plus line faults
    /// sitting exactly at a line end on this bus.
    pub fn fault_shunt_at_bus(&mut self, bus: BusNumber) -> Complex<f64> {
        let own: Complex<f64> = self
            .bus_entity(bus)
            .and_then(|e| self.get::<BusFaults>(e))
            .map(|f| f.values().sum())
            .unwrap_or_default();
        let world = self.world_mut();
        let mut at_ends = Complex::new(0.0, 0.0);
        for (tag, faults) in world.query::<(&DeviceTag, &LineFaults)>().iter(world) {
            let Terminal::Double(i, j) = tag.terminal else {
                continue;
            };
            for fault in faults.iter() {
                let at_i = i == bus && fault.location.abs() < LOCATION_EPS;
                let at_j = j == bus && (fault.location - 1.0).abs() < LOCATION_EPS;
                if at_i || at_j {
                    at_ends += fault.y;
                }
            }
        }
        own + at_ends
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_line() -> (PowerGrid, DeviceId) {
        let mut grid = PowerGrid::default();
        grid.add_bus(1, "A", 230.0);
        grid.add_bus(2, "B", 230.0);
        let id = DeviceId::decode(DeviceClass::Line, &(1, 2, "1")).unwrap();
        grid.add_device(id.clone());
        (grid, id)
    }

    #[test]
    fn breaker_sides_are_chosen_by_bus() {
        let (mut grid, id) = two_bus_line();
        assert!(grid.set_breaker_at(&id, 2, false));
        let entity = grid.device_entity(&id).unwrap();
        let line = grid.get::<LineDevice>(entity).unwrap();
        assert!(line.breaker_send && !line.breaker_receive);
        assert!(!grid.is_device_in_service(&id));
        assert!(!grid.set_breaker_at(&id, 3, true));
        assert!(grid.set_device_in_service(&id, true));
        assert!(grid.is_device_in_service(&id));
    }

    #[test]
    fn line_fault_location_is_normalized() {
        let (mut grid, id) = two_bus_line();
        let y = Complex::new(0.0, -2e5);
        let reversed = DeviceId::decode(DeviceClass::Line, &(2, 1, "1")).unwrap();
        assert!(grid.set_line_fault(&reversed, 2, 0.0, FaultType::ThreePhases, y));
        assert!(grid.set_line_fault(&id, 1, 0.3, FaultType::ThreePhases, y));
        assert!(!grid.set_line_fault(&id, 1, 1.5, FaultType::ThreePhases, y));
        let faults = grid.line_faults(&id);
        assert_eq!(faults.len(), 2);
        assert!((faults[0].location - 0.3).abs() < 1e-12);
        assert!((faults[1].location - 1.0).abs() < 1e-12);

        assert_eq!(grid.fault_shunt_at_bus(2), y);
        grid.set_bus_fault(2, FaultType::ThreePhases, y);
        assert_eq!(grid.fault_shunt_at_bus(2), y * 2.0);
        assert_eq!(grid.fault_shunt_at_bus(1), Complex::new(0.0, 0.0));

        assert!(grid.clear_line_fault(&id, 2, 0.7, FaultType::ThreePhases));
        assert!(grid.is_device_in_service(&id));
        grid.clear_all_faults();
        assert!(grid.line_faults(&id).is_empty());
        assert_eq!(grid.bus_fault(2, FaultType::ThreePhases), Complex::new(0.0, 0.0));
    }

    #[test]
    fn tripping_a_bus_trips_attached_devices() {
        let (mut grid, id) = two_bus_line();
        let load = DeviceId::decode(DeviceClass::Load, &(2, "L1")).unwrap();
        grid.add_device(load.clone());
        assert!(grid.trip_bus(2));
        assert!(!grid.is_device_in_service(&id));
        assert!(!grid.is_device_in_service(&load));
        assert_eq!(grid.in_service_bus_count(), 1);
    }

    #[test]
    fn only_sources_shed() {
        let (mut grid, _) = two_bus_line();
        let load = DeviceId::decode(DeviceClass::Load, &(2, "L1")).unwrap();
        grid.add_device(load.clone());
        assert!(!grid.shed_source(&load, 0.5));
        let unit = DeviceId::decode(DeviceClass::Generator, &(1, "G1")).unwrap();
        grid.add_device(unit.clone());
        assert!(grid.shed_source(&unit, 0.5));
        let entity = grid.device_entity(&unit).unwrap();
        assert!((grid.get::<SourceDevice>(entity).unwrap().mbase_mva - 50.0).abs() < 1e-9);
    }
}
