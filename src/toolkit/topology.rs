//! Breaker operations, shedding, scaling and fault injection.
//!
//! All of these are commands: tripping changes breaker state and never
//! removes a device, clearing a fault removes the admittance record and
//! never trips anything.
use nalgebra::Complex;
use tracing::warn;

use super::Toolkit;
use super::database::decode;
use super::id::{BusNumber, DeviceClass, IdTuple};
use crate::basic::ecs::elements::{FaultType, LineFault};
use crate::basic::ecs::topology::HvdcFlag;

fn fault_type(name: &str) -> Option<FaultType> {
    match name.parse::<FaultType>() {
        Ok(ft) => Some(ft),
        Err(err) => {
            warn!(%err, "unknown fault type");
            None
        }
    }
}

impl Toolkit {
    pub fn trip_device(&self, class: DeviceClass, id: impl IdTuple) -> bool {
        self.set_device_breakers(class, id, false)
    }

    pub fn close_device(&self, class: DeviceClass, id: impl IdTuple) -> bool {
        self.set_device_breakers(class, id, true)
    }

    fn set_device_breakers(&self, class: DeviceClass, id: impl IdTuple, closed: bool) -> bool {
        decode(class, &id).is_some_and(|id| self.with_grid(|grid| grid.set_device_in_service(&id, closed)))
    }

    pub fn is_device_in_service(&self, class: DeviceClass, id: impl IdTuple) -> bool {
        decode(class, &id).is_some_and(|id| self.with_grid(|grid| grid.is_device_in_service(&id)))
    }

    fn set_breaker(&self, class: DeviceClass, id: impl IdTuple, side_bus: BusNumber, closed: bool) -> bool {
        decode(class, &id).is_some_and(|id| self.with_grid(|grid| grid.set_breaker_at(&id, side_bus, closed)))
    }

    /// Opens the line breaker at `side_bus`.
    pub fn trip_line_breaker(&self, id: impl IdTuple, side_bus: BusNumber) -> bool {
        self.set_breaker(DeviceClass::Line, id, side_bus, false)
    }

    pub fn close_line_breaker(&self, id: impl IdTuple, side_bus: BusNumber) -> bool {
        self.set_breaker(DeviceClass::Line, id, side_bus, true)
    }

    /// Opens the breaker of the winding at `side_bus`.
    pub fn trip_transformer_breaker(&self, id: impl IdTuple, side_bus: BusNumber) -> bool {
        self.set_breaker(DeviceClass::Transformer, id, side_bus, false)
    }

    pub fn close_transformer_breaker(&self, id: impl IdTuple, side_bus: BusNumber) -> bool {
        self.set_breaker(DeviceClass::Transformer, id, side_bus, true)
    }

    /// Sets the bus out of service and trips everything attached.
    pub fn trip_bus(&self, bus: BusNumber) -> bool {
        self.with_grid(|grid| grid.trip_bus(bus))
    }

    fn shed_source(&self, class: DeviceClass, id: impl IdTuple, percent: f64) -> bool {
        decode(class, &id).is_some_and(|id| self.with_grid(|grid| grid.shed_source(&id, percent)))
    }

    /// Scales the generator down by `percent` of its current size.
    /// Repeated calls compound.
    pub fn shed_generator(&self, id: impl IdTuple, percent: f64) -> bool {
        self.shed_source(DeviceClass::Generator, id, percent)
    }

    pub fn shed_wt_generator(&self, id: impl IdTuple, percent: f64) -> bool {
        self.shed_source(DeviceClass::WtGenerator, id, percent)
    }

    pub fn shed_pv_unit(&self, id: impl IdTuple, percent: f64) -> bool {
        self.shed_source(DeviceClass::PvUnit, id, percent)
    }

    pub fn shed_energy_storage(&self, id: impl IdTuple, percent: f64) -> bool {
        self.shed_source(DeviceClass::EnergyStorage, id, percent)
    }

    /// Removes `n` lumped turbines; the generator trips when none are left.
    pub fn trip_wt_generator(&self, id: impl IdTuple, n: i64) -> bool {
        decode(DeviceClass::WtGenerator, &id)
            .is_some_and(|id| self.with_grid(|grid| grid.trip_source_units(&id, n)))
    }

    pub fn scale_load(&self, id: impl IdTuple, percent: f64) -> bool {
        decode(DeviceClass::Load, &id).is_some_and(|id| self.with_grid(|grid| grid.scale_load(&id, percent)))
    }

    pub fn scale_all_loads(&self, percent: f64) {
        self.with_grid(|grid| grid.scale_all_loads(percent))
    }

    pub fn set_bus_fault(&self, bus: BusNumber, fault: &str, y: Complex<f64>) -> bool {
        fault_type(fault).is_some_and(|ft| self.with_grid(|grid| grid.set_bus_fault(bus, ft, y)))
    }

    pub fn clear_bus_fault(&self, bus: BusNumber, fault: &str) -> bool {
        fault_type(fault).is_some_and(|ft| self.with_grid(|grid| grid.clear_bus_fault(bus, ft)))
    }

    pub fn get_bus_fault(&self, bus: BusNumber, fault: &str) -> Complex<f64> {
        fault_type(fault)
            .map(|ft| self.with_grid(|grid| grid.bus_fault(bus, ft)))
            .unwrap_or_default()
    }

    /// Installs a fault at `location` measured from `side_bus` (0 at that
    /// bus, 1 at the far end). Setting the same type at the same location
    /// replaces the admittance.
    pub fn set_line_fault(&self, id: impl IdTuple, side_bus: BusNumber, location: f64, fault: &str, y: Complex<f64>) -> bool {
        let (Some(id), Some(ft)) = (decode(DeviceClass::Line, &id), fault_type(fault)) else {
            return false;
        };
        self.with_grid(|grid| grid.set_line_fault(&id, side_bus, location, ft, y))
    }

    pub fn clear_line_fault(&self, id: impl IdTuple, side_bus: BusNumber, location: f64, fault: &str) -> bool {
        let (Some(id), Some(ft)) = (decode(DeviceClass::Line, &id), fault_type(fault)) else {
            return false;
        };
        self.with_grid(|grid| grid.clear_line_fault(&id, side_bus, location, ft))
    }

    /// Faults of a line with locations measured from its sending end.
    pub fn get_line_faults(&self, id: impl IdTuple) -> Vec<LineFault> {
        decode(DeviceClass::Line, &id)
            .map(|id| self.with_grid(|grid| grid.line_faults(&id)))
            .unwrap_or_default()
    }

    pub fn clear_all_faults(&self) {
        self.with_grid(|grid| grid.clear_all_faults())
    }

    /// Sum of the fault admittances seen at a bus.
    pub fn fault_shunt_at_bus(&self, bus: BusNumber) -> Complex<f64> {
        self.with_grid(|grid| grid.fault_shunt_at_bus(bus))
    }

    fn set_hvdc_flag(&self, id: impl IdTuple, flag: HvdcFlag, on: bool) -> bool {
        decode(DeviceClass::Hvdc, &id).is_some_and(|id| self.with_grid(|grid| grid.set_hvdc_flag(&id, flag, on)))
    }

    pub fn manually_bypass_hvdc(&self, id: impl IdTuple) -> bool {
        self.set_hvdc_flag(id, HvdcFlag::Bypassed, true)
    }

    pub fn manually_unbypass_hvdc(&self, id: impl IdTuple) -> bool {
        self.set_hvdc_flag(id, HvdcFlag::Bypassed, false)
    }

    pub fn manually_block_hvdc(&self, id: impl IdTuple) -> bool {
        self.set_hvdc_flag(id, HvdcFlag::Blocked, true)
    }

    pub fn manually_unblock_hvdc(&self, id: impl IdTuple) -> bool {
        self.set_hvdc_flag(id, HvdcFlag::Blocked, false)
    }
}

macro_rules! class_breaker_ops {
    ($($class:ident: $trip:ident, $close:ident;)*) => {
        impl Toolkit {$(
            pub fn $trip(&self, id: impl IdTuple) -> bool {
                self.trip_device(DeviceClass::$class, id)
            }

            pub fn $close(&self, id: impl IdTuple) -> bool {
                self.close_device(DeviceClass::$class, id)
            }
        )*}
    };
}

class_breaker_ops! {
    Generator: trip_generator, close_generator;
    PvUnit: trip_pv_unit, close_pv_unit;
    Load: trip_load, close_load;
    FixedShunt: trip_fixed_shunt, close_fixed_shunt;
    Line: trip_line, close_line;
    Transformer: trip_transformer, close_transformer;
    Hvdc: trip_hvdc, close_hvdc;
    EquivalentDevice: trip_equivalent_device, close_equivalent_device;
    EnergyStorage: trip_energy_storage, close_energy_storage;
}

impl Toolkit {
    pub fn close_wt_generator(&self, id: impl IdTuple) -> bool {
        self.close_device(DeviceClass::WtGenerator, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus() -> Toolkit {
        let tk = Toolkit::new("");
        tk.add_bus(1, "A", 230.0);
        tk.add_bus(2, "B", 230.0);
        tk.add_line((1, 2, "1"));
        tk
    }

    #[test]
    fn tripping_keeps_the_device() {
        let tk = two_bus();
        assert!(tk.trip_line((1, 2, "1")));
        assert!(tk.is_line_exist((1, 2, "1")));
        assert!(!tk.is_device_in_service(DeviceClass::Line, (2, 1, "1")));
        assert!(tk.close_line((1, 2, "1")));
        assert!(tk.trip_line_breaker((1, 2, "1"), 2));
        assert!(!tk.get_device_data(DeviceClass::Line, (1, 2, "1"), "", "B", "BREAKER_RECEIVE").as_bool());
        assert!(!tk.trip_line_breaker((1, 2, "1"), 3));
        assert!(!tk.trip_line((1, 3, "1")));
    }

    #[test]
    fn shedding_compounds_per_class() {
        let tk = two_bus();
        tk.add_generator((1, "G"));
        tk.add_wt_generator((2, "W"));
        tk.set_device_data(DeviceClass::Generator, (1, "G"), "", "F", "MBASE", 100.0);
        assert!(tk.shed_generator((1, "G"), 0.2));
        assert!(tk.shed_generator((1, "G"), 0.3));
        let mbase = tk.get_device_data(DeviceClass::Generator, (1, "G"), "", "F", "MBASE").as_f64();
        assert!((mbase - 56.0).abs() < 1e-9);
        assert!(!tk.shed_wt_generator((1, "G"), 0.2));
        assert!(tk.shed_wt_generator((2, "W"), 0.2));

        tk.set_device_data(DeviceClass::WtGenerator, (2, "W"), "", "I", "N_LUMPED", 2);
        tk.trip_wt_generator((2, "W"), 1);
        assert!(tk.is_device_in_service(DeviceClass::WtGenerator, (2, "W")));
        tk.trip_wt_generator((2, "W"), 1);
        assert!(!tk.is_device_in_service(DeviceClass::WtGenerator, (2, "W")));
    }

    #[test]
    fn faults_stack_and_clear() {
        let tk = two_bus();
        let y = Complex::new(0.0, -1e6);
        assert!(tk.set_line_fault((1, 2, "1"), 1, 0.3, "THREE PHASES FAULT", y));
        assert!(tk.set_line_fault((1, 2, "1"), 2, 0.0, "3PH", y));
        assert!(!tk.set_line_fault((1, 2, "1"), 1, 1.5, "3PH", y));
        assert!(!tk.set_line_fault((1, 2, "1"), 1, 0.5, "OPEN CIRCUIT", y));
        let faults = tk.get_line_faults((2, 1, "1"));
        assert_eq!(faults.len(), 2);
        assert!((faults[1].location - 1.0).abs() < 1e-12);
        assert_eq!(tk.fault_shunt_at_bus(2), y);

        assert!(tk.set_bus_fault(1, "single phase grounded fault", y));
        assert_eq!(tk.get_bus_fault(1, "SLG"), y);
        assert!(tk.clear_line_fault((1, 2, "1"), 1, 0.3, "3PH"));
        assert!(tk.is_line_exist((1, 2, "1")));
        assert!(tk.is_device_in_service(DeviceClass::Line, (1, 2, "1")));
        tk.clear_all_faults();
        assert!(tk.get_line_faults((1, 2, "1")).is_empty());
        assert_eq!(tk.get_bus_fault(1, "SLG"), Complex::new(0.0, 0.0));
    }

    #[test]
    fn hvdc_flags_survive_fault_clearing() {
        let tk = two_bus();
        tk.add_hvdc((1, 2, "DC"));
        assert!(tk.manually_block_hvdc((1, 2, "DC")));
        tk.clear_all_faults();
        assert!(tk.get_device_data(DeviceClass::Hvdc, (1, 2, "DC"), "", "B", "BLOCKED").as_bool());
        tk.manually_unblock_hvdc((1, 2, "DC"));
        assert!(!tk.get_device_data(DeviceClass::Hvdc, (1, 2, "DC"), "", "B", "BLOCKED").as_bool());
    }

    #[test]
    fn loads_scale_without_breaker_change() {
        let tk = two_bus();
        tk.add_load((2, "L"));
        tk.set_device_data(DeviceClass::Load, (2, "L"), "", "F", "PP0_MW", 100.0);
        tk.scale_load((2, "L"), 0.1);
        tk.scale_all_loads(-0.5);
        let p = tk.get_device_data(DeviceClass::Load, (2, "L"), "", "F", "P_MW").as_f64();
        assert!((p - 55.0).abs() < 1e-9);
        assert!(tk.is_device_in_service(DeviceClass::Load, (2, "L")));
        assert!(tk.trip_bus(2));
        assert!(!tk.is_device_in_service(DeviceClass::Load, (2, "L")));
        assert!(!tk.is_device_in_service(DeviceClass::Line, (1, 2, "1")));
    }
}
