//! Dynamic simulation control.
//!
//! A run goes `Idle → start → Running → stop → Stopped`, and `start` may be
//! called again from `Stopped`. Calls made in the wrong phase are reported
//! to the toolkit log and return `false`.
use tracing::warn;

use super::Toolkit;
use super::database::decode;
use super::id::{BusNumber, DeviceClass, DeviceId, IdTuple};
use super::param::{EntityRef, Side};
use crate::basic::ecs::elements::SourceDevice;
use crate::basic::ecs::network::{DataOps, PowerGrid};
use crate::timeseries::{MeterSpec, Phase};

pub use crate::timeseries::meter::MODEL_INTERNAL_VARIABLE;

const EXCITER: &str = "EXCITER";
const TURBINE_GOVERNOR: &str = "TURBINE GOVERNOR";

/// MBASE of a generator, `None` when it is missing or not positive.
fn generator_mbase(grid: &PowerGrid, id: &DeviceId) -> Option<f64> {
    let mbase = grid.get::<SourceDevice>(grid.device_entity(id)?)?.mbase_mva;
    (mbase > 0.0).then_some(mbase)
}

/// Mechanical power held by the governor model. Without a PMECH state the
/// governor sits at its reference.
fn mechanical_power_mw(grid: &PowerGrid, id: &DeviceId) -> Option<f64> {
    grid.dynamic_model_parameter(id, TURBINE_GOVERNOR, "PMECH")
        .or_else(|| grid.dynamic_model_parameter(id, TURBINE_GOVERNOR, "PREF"))
}

impl Toolkit {
    pub fn get_dynamic_simulation_time_step(&self) -> f64 {
        self.with_grid(|grid| grid.time_step())
    }

    /// Non-positive steps are rejected and logged.
    pub fn set_dynamic_simulation_time_step(&self, dt: f64) -> bool {
        self.with_grid(|grid| grid.set_time_step(dt))
    }

    /// Simulation time in seconds; 0.0 before the first start.
    pub fn get_dynamic_simulation_time(&self) -> f64 {
        self.with_grid(|grid| grid.time())
    }

    pub fn get_dynamic_simulation_phase(&self) -> Phase {
        self.with_grid(|grid| grid.phase())
    }

    pub fn start(&self) -> bool {
        self.with_grid(|grid| grid.start())
    }

    /// Advances the clock by exactly one time step.
    pub fn run_a_step(&self) -> bool {
        self.with_grid(|grid| grid.run_a_step())
    }

    pub fn run_to_time(&self, t: f64) -> bool {
        self.with_grid(|grid| grid.run_to_time(t))
    }

    pub fn stop(&self) -> bool {
        self.with_grid(|grid| grid.stop())
    }

    /// Always true while angle surveillance is off.
    pub fn get_system_angular_stability(&self) -> bool {
        self.with_grid(|grid| grid.angle_stable())
    }

    pub fn prepare_meter(&self, spec: &MeterSpec) -> bool {
        self.with_grid(|grid| grid.prepare_meter(spec))
    }

    pub fn prepare_bus_meter(&self, bus: BusNumber, meter_type: &str) -> bool {
        self.prepare_meter(&MeterSpec::new(EntityRef::Bus(bus), meter_type))
    }

    /// `side` selects a transformer winding or HVDC converter ("" for the
    /// whole device); `var` names the model variable read by
    /// "MODEL INTERNAL VARIABLE" meters.
    pub fn prepare_device_meter(
        &self,
        class: DeviceClass,
        id: impl IdTuple,
        meter_type: &str,
        side: &str,
        var: &str,
    ) -> bool {
        let Some(id) = decode(class, &id) else {
            return false;
        };
        let side = match side.parse::<Side>() {
            Ok(side) => side,
            Err(err) => {
                warn!(%err, "meter side");
                return false;
            }
        };
        self.prepare_meter(&MeterSpec::new(id, meter_type).on_side(side).variable(var))
    }

    /// Prepares every named meter of "ALL", "BUS" or one device class.
    pub fn prepare_meters(&self, which: &str) -> usize {
        self.with_grid(|grid| grid.prepare_meters(which))
    }

    pub fn clear_meters(&self) {
        self.with_grid(|grid| grid.clear_meters())
    }

    pub fn get_meter_count(&self) -> usize {
        self.with_grid(|grid| grid.meters().meters.len())
    }

    pub fn get_meter_name(&self, index: usize) -> String {
        self.with_grid(|grid| grid.meters().meters.get(index).map(|m| m.name.clone()).unwrap_or_default())
    }

    pub fn get_meter_values(&self, index: usize) -> Vec<f64> {
        self.with_grid(|grid| grid.meters().meters.get(index).map(|m| m.values.clone()).unwrap_or_default())
    }

    pub fn get_sampled_times(&self) -> Vec<f64> {
        self.with_grid(|grid| grid.meters().times.clone())
    }

    /// Attaches a model to a device, replacing any model of the same type.
    pub fn set_dynamic_model(
        &self,
        class: DeviceClass,
        id: impl IdTuple,
        model_type: &str,
        model_name: &str,
        params: &[(&str, f64)],
    ) -> bool {
        let Some(id) = decode(class, &id) else {
            return false;
        };
        let params = params.iter().map(|(k, v)| (k.to_string(), *v));
        self.with_grid(|grid| grid.set_dynamic_model(&id, model_type, model_name, params))
    }

    /// Model name, or "" when no model of this type is attached.
    pub fn get_dynamic_model_name(&self, class: DeviceClass, id: impl IdTuple, model_type: &str) -> String {
        decode(class, &id)
            .map(|id| self.with_grid(|grid| grid.dynamic_model_name(&id, model_type)))
            .unwrap_or_default()
    }

    /// Model parameter, or 0.0 when it does not exist.
    pub fn get_dynamic_model_parameter(&self, class: DeviceClass, id: impl IdTuple, model_type: &str, par: &str) -> f64 {
        decode(class, &id)
            .and_then(|id| self.with_grid(|grid| grid.dynamic_model_parameter(&id, model_type, par)))
            .unwrap_or(0.0)
    }

    pub fn set_dynamic_model_parameter(
        &self,
        class: DeviceClass,
        id: impl IdTuple,
        model_type: &str,
        par: &str,
        value: f64,
    ) -> bool {
        decode(class, &id)
            .is_some_and(|id| self.with_grid(|grid| grid.set_dynamic_model_parameter(&id, model_type, par, value)))
    }

    pub fn get_dynamic_model_parameter_pairs(
        &self,
        class: DeviceClass,
        id: impl IdTuple,
        model_type: &str,
    ) -> Vec<(String, f64)> {
        decode(class, &id)
            .map(|id| self.with_grid(|grid| grid.dynamic_model_parameter_pairs(&id, model_type)))
            .unwrap_or_default()
    }

    pub fn get_dynamic_model_count(&self) -> usize {
        self.with_grid(|grid| grid.dynamic_model_count())
    }

    pub fn get_generator_voltage_reference_pu(&self, id: impl IdTuple) -> f64 {
        self.get_dynamic_model_parameter(DeviceClass::Generator, id, EXCITER, "VREF")
    }

    /// Needs an exciter model on the generator.
    pub fn set_generator_voltage_reference_pu(&self, id: impl IdTuple, v: f64) -> bool {
        self.set_dynamic_model_parameter(DeviceClass::Generator, id, EXCITER, "VREF", v)
    }

    pub fn get_generator_mechanical_power_reference_mw(&self, id: impl IdTuple) -> f64 {
        self.get_dynamic_model_parameter(DeviceClass::Generator, id, TURBINE_GOVERNOR, "PREF")
    }

    /// Needs a turbine governor model on the generator.
    pub fn set_generator_mechanical_power_reference_mw(&self, id: impl IdTuple, p: f64) -> bool {
        self.set_dynamic_model_parameter(DeviceClass::Generator, id, TURBINE_GOVERNOR, "PREF", p)
    }

    /// PREF on the generator's MBASE; 0.0 without a governor.
    pub fn get_generator_mechanical_power_reference_pu(&self, id: impl IdTuple) -> f64 {
        decode(DeviceClass::Generator, &id)
            .and_then(|id| {
                self.with_grid(|grid| {
                    let pref = grid.dynamic_model_parameter(&id, TURBINE_GOVERNOR, "PREF")?;
                    Some(pref / generator_mbase(grid, &id)?)
                })
            })
            .unwrap_or(0.0)
    }

    pub fn set_generator_mechanical_power_reference_pu(&self, id: impl IdTuple, p_pu: f64) -> bool {
        decode(DeviceClass::Generator, &id).is_some_and(|id| {
            self.with_grid(|grid| match generator_mbase(grid, &id) {
                Some(mbase) => grid.set_dynamic_model_parameter(&id, TURBINE_GOVERNOR, "PREF", p_pu * mbase),
                None => {
                    grid.report(format!("{id} has no positive MBASE. PREF is not set."));
                    false
                }
            })
        })
    }

    /// EFD of the exciter model; 0.0 without an exciter.
    pub fn get_generator_excitation_voltage_pu(&self, id: impl IdTuple) -> f64 {
        self.get_dynamic_model_parameter(DeviceClass::Generator, id, EXCITER, "EFD")
    }

    pub fn get_generator_mechanical_power_mw(&self, id: impl IdTuple) -> f64 {
        decode(DeviceClass::Generator, &id)
            .and_then(|id| self.with_grid(|grid| mechanical_power_mw(grid, &id)))
            .unwrap_or(0.0)
    }

    pub fn get_generator_mechanical_power_pu(&self, id: impl IdTuple) -> f64 {
        decode(DeviceClass::Generator, &id)
            .and_then(|id| self.with_grid(|grid| Some(mechanical_power_mw(grid, &id)? / generator_mbase(grid, &id)?)))
            .unwrap_or(0.0)
    }

    pub fn get_hvdc_power_order_mw(&self, id: impl IdTuple) -> f64 {
        self.get_device_data(DeviceClass::Hvdc, id, "", "F", "PDCN_MW").as_f64()
    }

    pub fn set_hvdc_power_order_mw(&self, id: impl IdTuple, p: f64) {
        self.set_device_data(DeviceClass::Hvdc, id, "", "F", "PDCN_MW", p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Toolkit {
        let tk = Toolkit::new("");
        tk.add_bus(1, "GEN", 20.0);
        tk.add_bus(2, "GRID", 230.0);
        tk.add_bus(3, "FAR", 230.0);
        tk.add_transformer((1, 2, "T"));
        tk.add_line((2, 3, "1"));
        tk.add_generator((1, "G1"));
        tk.add_generator((3, "G2"));
        tk
    }

    #[test]
    fn clock_follows_the_controller() {
        let tk = machine();
        assert_eq!(tk.get_dynamic_simulation_time(), 0.0);
        assert!(!tk.set_dynamic_simulation_time_step(0.0));
        assert!(tk.set_dynamic_simulation_time_step(0.02));
        assert_eq!(tk.get_dynamic_simulator_parameter("F", "TIME STEP IN S").as_f64(), 0.02);
        assert!(!tk.run_to_time(1.0));
        assert!(tk.start());
        assert_eq!(tk.get_dynamic_simulation_phase(), Phase::Running);
        assert!(tk.run_to_time(0.1));
        assert!((tk.get_dynamic_simulation_time() - 0.1).abs() < 1e-9);
        assert!(tk.stop());
        assert_eq!(tk.get_dynamic_simulation_phase(), Phase::Stopped);
    }

    #[test]
    fn meters_and_model_variables() {
        let tk = machine();
        tk.set_dynamic_model(DeviceClass::Generator, (1, "G1"), "SYNC GENERATOR", "GENCLS", &[("H", 3.0), ("D", 0.0)]);
        assert!(tk.prepare_bus_meter(2, "VOLTAGE IN PU"));
        assert!(tk.prepare_device_meter(DeviceClass::Generator, (1, "G1"), MODEL_INTERNAL_VARIABLE, "", "H"));
        assert!(tk.prepare_device_meter(DeviceClass::Transformer, (1, 2, "T"), "TAP_PU", "PRIMARY", ""));
        assert!(!tk.prepare_device_meter(DeviceClass::Transformer, (1, 2, "T"), "TAP_PU", "MIDDLE", ""));
        assert_eq!(tk.get_meter_count(), 3);
        assert_eq!(tk.get_meter_name(5), "");

        tk.start();
        tk.run_a_step();
        tk.stop();
        assert_eq!(tk.get_sampled_times().len(), 2);
        assert_eq!(tk.get_meter_values(1), vec![3.0, 3.0]);
        assert_eq!(tk.get_meter_values(2), vec![1.0, 1.0]);

        tk.clear_meters();
        assert_eq!(tk.get_meter_count(), 0);
    }

    #[test]
    fn angle_surveillance() {
        let tk = machine();
        assert!(tk.get_system_angular_stability());
        tk.set_dynamic_simulator_parameter("B", "ANGLE STABILITY SURVEILLANCE LOGIC", true);
        tk.set_dynamic_simulator_parameter("F", "ANGLE STABILITY THRESHOLD IN DEG", 90.0);
        tk.set_device_data(DeviceClass::Generator, (3, "G2"), "", "F", "ROTOR_ANGLE_DEG", 120.0);
        tk.start();
        assert!(!tk.get_system_angular_stability());

        tk.trip_line((2, 3, "1"));
        tk.run_a_step();
        assert!(tk.get_system_angular_stability());
    }

    #[test]
    fn references_live_in_models() {
        let tk = machine();
        assert!(!tk.set_generator_voltage_reference_pu((1, "G1"), 1.02));
        tk.set_dynamic_model(DeviceClass::Generator, (1, "G1"), "EXCITER", "SEXS", &[("K", 100.0)]);
        assert!(tk.set_generator_voltage_reference_pu((1, "G1"), 1.02));
        assert_eq!(tk.get_generator_voltage_reference_pu((1, "G1")), 1.02);
        assert_eq!(tk.get_generator_mechanical_power_reference_mw((1, "G1")), 0.0);

        tk.add_hvdc((2, 3, "DC"));
        tk.set_hvdc_power_order_mw((3, 2, "DC"), 300.0);
        assert_eq!(tk.get_hvdc_power_order_mw((2, 3, "DC")), 300.0);
        assert_eq!(
            tk.get_dynamic_model_parameter_pairs(DeviceClass::Generator, (1, "G1"), "exciter"),
            vec![("K".to_string(), 100.0), ("VREF".to_string(), 1.02)]
        );
    }

    #[test]
    fn governor_quantities_follow_mbase() {
        let tk = machine();
        tk.set_device_data(DeviceClass::Generator, (1, "G1"), "", "F", "MBASE", 200.0);
        assert_eq!(tk.get_generator_mechanical_power_reference_pu((1, "G1")), 0.0);
        assert_eq!(tk.get_generator_mechanical_power_mw((1, "G1")), 0.0);
        assert_eq!(tk.get_generator_mechanical_power_pu((1, "G1")), 0.0);
        assert!(!tk.set_generator_mechanical_power_reference_pu((1, "G1"), 0.5));

        tk.set_dynamic_model(DeviceClass::Generator, (1, "G1"), "TURBINE GOVERNOR", "TGOV1", &[("R", 0.05)]);
        assert!(tk.set_generator_mechanical_power_reference_pu((1, "G1"), 0.5));
        assert_eq!(tk.get_generator_mechanical_power_reference_mw((1, "G1")), 100.0);
        assert_eq!(tk.get_generator_mechanical_power_reference_pu((1, "G1")), 0.5);
        assert_eq!(tk.get_generator_mechanical_power_mw((1, "G1")), 100.0);

        tk.set_dynamic_model_parameter(DeviceClass::Generator, (1, "G1"), "TURBINE GOVERNOR", "PMECH", 150.0);
        assert_eq!(tk.get_generator_mechanical_power_mw((1, "G1")), 150.0);
        assert_eq!(tk.get_generator_mechanical_power_pu((1, "G1")), 0.75);

        tk.set_device_data(DeviceClass::Generator, (1, "G1"), "", "F", "MBASE", 0.0);
        assert_eq!(tk.get_generator_mechanical_power_pu((1, "G1")), 0.0);
        assert!(!tk.set_generator_mechanical_power_reference_pu((1, "G1"), 0.5));
    }

    #[test]
    fn excitation_voltage_comes_from_the_exciter() {
        let tk = machine();
        assert_eq!(tk.get_generator_excitation_voltage_pu((1, "G1")), 0.0);
        tk.set_dynamic_model(DeviceClass::Generator, (1, "G1"), "EXCITER", "SEXS", &[("EFD", 1.8)]);
        assert_eq!(tk.get_generator_excitation_voltage_pu((1, "G1")), 1.8);
        assert_eq!(tk.get_generator_excitation_voltage_pu((3, "G2")), 0.0);
    }
}
