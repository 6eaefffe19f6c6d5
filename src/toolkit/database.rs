//! Population and inventory of a toolkit's network database.
use nalgebra::Complex;
use tracing::warn;

use super::Toolkit;
use super::id::{BusNumber, DeviceClass, DeviceId, IdTuple};
use super::param::EntityRef;
use crate::basic::ecs::elements::GroupKind;

/// Decodes a caller tuple, logging malformed ones.
pub(crate) fn decode(class: DeviceClass, id: &(impl IdTuple + ?Sized)) -> Option<DeviceId> {
    match DeviceId::decode(class, id) {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(%class, %err, "malformed device identifier");
            None
        }
    }
}

impl Toolkit {
    pub fn add_bus(&self, number: BusNumber, name: &str, base_kv: f64) -> bool {
        self.with_grid(|grid| grid.add_bus(number, name, base_kv))
    }

    pub fn add_device(&self, class: DeviceClass, id: impl IdTuple) -> bool {
        match decode(class, &id) {
            Some(id) => self.with_grid(|grid| grid.add_device(id)),
            None => false,
        }
    }

    pub fn add_area(&self, number: u32, name: &str) -> bool {
        self.with_grid(|grid| grid.add_group(GroupKind::Area, number, name))
    }

    pub fn add_zone(&self, number: u32, name: &str) -> bool {
        self.with_grid(|grid| grid.add_group(GroupKind::Zone, number, name))
    }

    pub fn add_owner(&self, number: u32, name: &str) -> bool {
        self.with_grid(|grid| grid.add_group(GroupKind::Owner, number, name))
    }

    /// Removes the bus and every device connected to it.
    pub fn remove_bus(&self, number: BusNumber) -> bool {
        self.with_grid(|grid| grid.remove_bus(number))
    }

    pub fn remove_device(&self, class: DeviceClass, id: impl IdTuple) -> bool {
        match decode(class, &id) {
            Some(id) => self.with_grid(|grid| grid.remove_device(&id)),
            None => false,
        }
    }

    pub fn remove_area(&self, number: u32) -> bool {
        self.with_grid(|grid| grid.remove_group(GroupKind::Area, number))
    }

    pub fn remove_zone(&self, number: u32) -> bool {
        self.with_grid(|grid| grid.remove_group(GroupKind::Zone, number))
    }

    pub fn remove_owner(&self, number: u32) -> bool {
        self.with_grid(|grid| grid.remove_group(GroupKind::Owner, number))
    }

    /// Renumbers a bus and every identifier that mentions it.
    pub fn change_bus_number(&self, old: BusNumber, new: BusNumber) -> bool {
        self.with_grid(|grid| grid.change_bus_number(old, new))
    }

    pub fn is_bus_exist(&self, number: BusNumber) -> bool {
        self.with_grid(|grid| grid.bus_entity(number).is_some())
    }

    pub fn is_device_exist(&self, class: DeviceClass, id: impl IdTuple) -> bool {
        decode(class, &id).is_some_and(|id| self.with_grid(|grid| grid.device_entity(&id).is_some()))
    }

    pub fn is_area_exist(&self, number: u32) -> bool {
        self.with_grid(|grid| grid.group_entity(GroupKind::Area, number).is_some())
    }

    pub fn is_zone_exist(&self, number: u32) -> bool {
        self.with_grid(|grid| grid.group_entity(GroupKind::Zone, number).is_some())
    }

    pub fn is_owner_exist(&self, number: u32) -> bool {
        self.with_grid(|grid| grid.group_entity(GroupKind::Owner, number).is_some())
    }

    /// First bus with this name, or 0.
    pub fn bus_name2number(&self, name: &str) -> BusNumber {
        self.with_grid(|grid| grid.bus_name2number(name))
    }

    /// Name of the bus, or "" when it does not exist.
    pub fn bus_number2name(&self, number: BusNumber) -> String {
        self.with_grid(|grid| grid.bus_number2name(number))
    }

    pub fn get_bus_count(&self) -> usize {
        self.with_grid(|grid| grid.bus_count())
    }

    /// Count by class name: "BUS", a device class, "AREA", "ZONE" or
    /// "OWNER". Unknown names count 0.
    pub fn get_device_count(&self, class: &str) -> usize {
        let group = match class.trim().to_uppercase().as_str() {
            "BUS" => return self.get_bus_count(),
            "AREA" => Some(GroupKind::Area),
            "ZONE" => Some(GroupKind::Zone),
            "OWNER" => Some(GroupKind::Owner),
            _ => None,
        };
        if let Some(kind) = group {
            return self.with_grid(|grid| grid.group_count(kind));
        }
        match class.parse::<DeviceClass>() {
            Ok(class) => self.with_grid(|grid| grid.device_count(class)),
            Err(err) => {
                warn!(%err, "device count of unknown class");
                0
            }
        }
    }

    pub fn get_area_count(&self) -> usize {
        self.with_grid(|grid| grid.group_count(GroupKind::Area))
    }

    pub fn get_zone_count(&self) -> usize {
        self.with_grid(|grid| grid.group_count(GroupKind::Zone))
    }

    pub fn get_owner_count(&self) -> usize {
        self.with_grid(|grid| grid.group_count(GroupKind::Owner))
    }

    pub fn get_in_service_bus_count(&self) -> usize {
        self.with_grid(|grid| grid.in_service_bus_count())
    }

    pub fn update_overshadowed_buses(&self) -> usize {
        self.with_grid(|grid| grid.update_overshadowed_buses())
    }

    pub fn set_all_buses_un_overshadowed(&self) {
        self.with_grid(|grid| grid.clear_overshadowed_buses())
    }

    pub fn get_overshadowed_bus_count(&self) -> usize {
        self.with_grid(|grid| grid.overshadowed_bus_count())
    }

    /// Sets PGEN/QGEN of a source from one complex power in MVA.
    pub fn set_source_power(&self, class: DeviceClass, id: impl IdTuple, s: Complex<f64>) {
        let Some(id) = decode(class, &id) else {
            return;
        };
        let target = EntityRef::Device(id);
        self.set_data(&target, "F", "PGEN_MW", s.re);
        self.set_data(&target, "F", "QGEN_MVAR", s.im);
    }

    /// Sets the constant power, current and impedance parts of a load.
    pub fn set_load_power(&self, id: impl IdTuple, sp: Complex<f64>, si: Complex<f64>, sz: Complex<f64>) {
        let Some(id) = decode(DeviceClass::Load, &id) else {
            return;
        };
        let target = EntityRef::Device(id);
        for (s, p, q) in [(sp, "PP0_MW", "QP0_MVAR"), (si, "PI0_MW", "QI0_MVAR"), (sz, "PZ0_MW", "QZ0_MVAR")] {
            self.set_data(&target, "F", p, s.re);
            self.set_data(&target, "F", q, s.im);
        }
    }

    pub fn set_hvdc_power(&self, id: impl IdTuple, p_mw: f64) {
        if let Some(id) = decode(DeviceClass::Hvdc, &id) {
            self.set_side_data(&EntityRef::Device(id), "HVDC", "F", "PDCN_MW", p_mw);
        }
    }

    /// Generation of in-service sources minus demand of in-service loads, MW.
    pub fn get_powerflow_loss(&self) -> f64 {
        self.with_grid(|grid| grid.powerflow_loss_mw())
    }
}

macro_rules! class_database_ops {
    ($($class:ident: $add:ident, $remove:ident, $exist:ident, $count:ident;)*) => {
        impl Toolkit {$(
            pub fn $add(&self, id: impl IdTuple) -> bool {
                self.add_device(DeviceClass::$class, id)
            }

            pub fn $remove(&self, id: impl IdTuple) -> bool {
                self.remove_device(DeviceClass::$class, id)
            }

            pub fn $exist(&self, id: impl IdTuple) -> bool {
                self.is_device_exist(DeviceClass::$class, id)
            }

            pub fn $count(&self) -> usize {
                self.with_grid(|grid| grid.device_count(DeviceClass::$class))
            }
        )*}
    };
}

class_database_ops! {
    Generator: add_generator, remove_generator, is_generator_exist, get_generator_count;
    WtGenerator: add_wt_generator, remove_wt_generator, is_wt_generator_exist, get_wt_generator_count;
    PvUnit: add_pv_unit, remove_pv_unit, is_pv_unit_exist, get_pv_unit_count;
    Load: add_load, remove_load, is_load_exist, get_load_count;
    FixedShunt: add_fixed_shunt, remove_fixed_shunt, is_fixed_shunt_exist, get_fixed_shunt_count;
    Line: add_line, remove_line, is_line_exist, get_line_count;
    Transformer: add_transformer, remove_transformer, is_transformer_exist, get_transformer_count;
    Hvdc: add_hvdc, remove_hvdc, is_hvdc_exist, get_hvdc_count;
    EquivalentDevice: add_equivalent_device, remove_equivalent_device, is_equivalent_device_exist, get_equivalent_device_count;
    EnergyStorage: add_energy_storage, remove_energy_storage, is_energy_storage_exist, get_energy_storage_count;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::param::ParamValue;

    #[test]
    fn counts_by_class_name() {
        let tk = Toolkit::new("");
        for b in 1..=3 {
            tk.add_bus(b, &format!("BUS{b}"), 110.0);
        }
        tk.add_line((1, 2, "1"));
        tk.add_line((2, 3, "1"));
        tk.add_generator((1, "G1"));
        tk.add_area(1, "NORTH");
        assert_eq!(tk.get_device_count("BUS"), 3);
        assert_eq!(tk.get_device_count("line"), 2);
        assert_eq!(tk.get_device_count("GENERATOR"), 1);
        assert_eq!(tk.get_device_count("AREA"), 1);
        assert_eq!(tk.get_device_count("SWITCH"), 0);
        assert_eq!(tk.get_line_count(), 2);
        assert!(tk.is_line_exist((2, 1, "1")));
        assert!(!tk.add_line((1, 2, 3, "1")));
    }

    #[test]
    fn renumbering_reaches_the_public_surface() {
        let tk = Toolkit::new("");
        tk.add_bus(1, "A", 110.0);
        tk.add_bus(2, "B", 110.0);
        tk.add_line((1, 2, "1"));
        assert!(tk.change_bus_number(2, 20));
        assert!(tk.is_line_exist((1, 20, "1")));
        assert!(!tk.is_line_exist((1, 2, "1")));
        assert_eq!(tk.bus_name2number("B"), 20);
        assert!(!tk.change_bus_number(1, 20));
    }

    #[test]
    fn overshadow_marks_reset_on_request() {
        let tk = Toolkit::new("");
        tk.add_bus(1, "A", 110.0);
        tk.add_bus(2, "B", 110.0);
        tk.add_line((1, 2, "1"));
        assert_eq!(tk.update_overshadowed_buses(), 1);
        assert_eq!(tk.get_overshadowed_bus_count(), 1);
        tk.set_all_buses_un_overshadowed();
        assert_eq!(tk.get_overshadowed_bus_count(), 0);
    }

    #[test]
    fn complex_power_setters() {
        let tk = Toolkit::new("");
        tk.add_bus(1, "A", 110.0);
        tk.add_bus(2, "B", 110.0);
        tk.add_generator((1, "G1"));
        tk.add_load((2, "L1"));
        tk.add_hvdc((1, 2, "DC"));
        tk.set_source_power(DeviceClass::Generator, (1, "G1"), Complex::new(120.0, 30.0));
        tk.set_load_power((2, "L1"), Complex::new(80.0, 20.0), Complex::new(10.0, 0.0), Complex::new(10.0, 5.0));
        tk.set_hvdc_power((1, 2, "DC"), 250.0);
        assert_eq!(
            tk.get_device_data(DeviceClass::Generator, (1, "G1"), "", "F", "QGEN_MVAR"),
            ParamValue::Float(30.0)
        );
        assert_eq!(tk.get_device_data(DeviceClass::Load, (2, "L1"), "", "F", "P MW").as_f64(), 100.0);
        assert_eq!(tk.get_device_data(DeviceClass::Hvdc, (2, 1, "DC"), "", "F", "PDCN_MW").as_f64(), 250.0);
        assert!((tk.get_powerflow_loss() - 20.0).abs() < 1e-9);
    }
}
