//! Dynamic simulation control on the engine side: the run state machine,
//! meter registration and the dynamic model database.
use std::path::Path;

use bevy_ecs::prelude::*;
use indexmap::IndexMap;
use tracing::{debug, info};

use super::access::Holder;
use super::elements::*;
use super::network::{DataOps, PowerGrid};
use crate::io::write_meters;
use crate::timeseries::meter::named_meters;
use crate::timeseries::sim_time::{DeltaTime, Time};
use crate::timeseries::{
    DynamicSimulatorConfig, Meter, MeterRegistry, MeterSpec, Phase, SimulationState, record_sample,
    surveil_angles,
};
use crate::toolkit::id::{DeviceClass, DeviceId, normalize_name};
use crate::toolkit::param::EntityRef;

/// Slack used when comparing the clock against a requested end time.
const TIME_EPS: f64 = 1e-9;

impl PowerGrid {
    pub fn time(&self) -> f64 {
        self.world().resource::<Time>().0
    }

    pub fn time_step(&self) -> f64 {
        self.world().resource::<DeltaTime>().0
    }

    pub fn set_time_step(&mut self, dt: f64) -> bool {
        if !DeltaTime::valid(dt) {
            self.report(format!("Time step {dt} s is not positive. It is not changed."));
            return false;
        }
        self.world_mut().insert_resource(DeltaTime(dt));
        true
    }

    pub fn phase(&self) -> Phase {
        self.world().resource::<SimulationState>().phase
    }

    pub fn angle_stable(&self) -> bool {
        self.world().resource::<SimulationState>().angle_stable
    }

    /// Initializes a run: the clock goes back to zero, old samples are
    /// dropped and the initial sample is recorded.
    pub fn start(&mut self) -> bool {
        if self.phase() == Phase::Running {
            self.report("Dynamic simulation is already running. Stop it before starting again.");
            return false;
        }
        let world = self.world_mut();
        world.insert_resource(Time(0.0));
        world.resource_mut::<MeterRegistry>().clear_samples();
        world.resource_mut::<SimulationState>().reset();
        surveil_angles(world);
        record_sample(world);
        let meters = world.resource::<MeterRegistry>().meters.len();
        info!(meters, "dynamic simulation started");
        self.report(format!("Dynamic simulation started with {meters} meters."));
        true
    }

    pub fn run_a_step(&mut self) -> bool {
        if self.phase() != Phase::Running {
            self.report("Dynamic simulation is not running. Call start first.");
            return false;
        }
        self.run_dynamics_schedule();
        true
    }

    /// Steps until the clock reaches `t`. Asking for a time already passed
    /// does nothing.
    pub fn run_to_time(&mut self, t: f64) -> bool {
        if self.phase() != Phase::Running {
            self.report("Dynamic simulation is not running. Call start first.");
            return false;
        }
        if self.time_step() <= 0.0 {
            self.report("Time step is not positive. Simulation cannot advance.");
            return false;
        }
        if t + TIME_EPS < self.time() {
            self.report(format!(
                "Requested time {t} s is earlier than the current time {} s.",
                self.time()
            ));
            return false;
        }
        while self.time() + TIME_EPS < t {
            self.run_dynamics_schedule();
        }
        true
    }

    /// Ends the run and exports the meters when CSV export is switched on.
    pub fn stop(&mut self) -> bool {
        if self.phase() != Phase::Running {
            self.report("Dynamic simulation is not running. Nothing to stop.");
            return false;
        }
        self.world_mut().resource_mut::<SimulationState>().phase = Phase::Stopped;
        let config = self.world().resource::<DynamicSimulatorConfig>().clone();
        if config.csv_export && !config.output_filename.is_empty() {
            let path = format!("{}.csv", config.output_filename.trim_end_matches(".csv"));
            match write_meters(Path::new(&path), self.world().resource::<MeterRegistry>()) {
                Ok(()) => self.report(format!("Meters exported to {path}.")),
                Err(err) => self.report(format!("Meter export failed: {err}")),
            }
        }
        let (time, steps) = (self.time(), self.world().resource::<SimulationState>().steps);
        info!(time, steps, "dynamic simulation stopped");
        self.report(format!("Dynamic simulation stopped at {time} s after {steps} steps."));
        true
    }

    /// Registers one meter. Unknown targets and types are reported and
    /// skipped. A meter that already exists is silently kept.
    pub fn prepare_meter(&mut self, spec: &MeterSpec) -> bool {
        let holder = match self.resolve(&spec.target) {
            Some((_, holder @ (Holder::Bus | Holder::Device(_)))) => holder,
            _ => {
                self.report(format!("{} cannot carry meters.", spec.target));
                return false;
            }
        };
        let meter = match Meter::build(spec, holder) {
            Ok(meter) => meter,
            Err(reason) => {
                self.report(reason);
                return false;
            }
        };
        let name = meter.name.clone();
        if !self.world_mut().resource_mut::<MeterRegistry>().register(meter) {
            self.report_detail(format!("Meter {name} is already prepared."));
            return false;
        }
        debug!(meter = name, "meter prepared");
        true
    }

    /// Registers every named meter of every bus ("BUS"), of every device of
    /// one class, or of everything ("ALL"). Returns how many were added.
    pub fn prepare_meters(&mut self, which: &str) -> usize {
        let which = normalize_name(which);
        let all = which == "ALL";
        let classes: Vec<DeviceClass> = if all {
            DeviceClass::ALL.to_vec()
        } else {
            which.parse::<DeviceClass>().into_iter().collect()
        };
        if !all && which != "BUS" && classes.is_empty() {
            self.report(format!("'{which}' is not a device class. No meter is prepared."));
            return 0;
        }
        let mut targets: Vec<(EntityRef, Holder)> = Vec::new();
        if all || which == "BUS" {
            targets.extend(self.bus_numbers().into_iter().map(|b| (EntityRef::Bus(b), Holder::Bus)));
        }
        for class in classes {
            let holder = Holder::Device(class);
            targets.extend(self.device_ids(class).into_iter().map(|id| (EntityRef::Device(id), holder)));
        }
        let mut added = 0;
        for (target, holder) in targets {
            for (meter_type, _) in named_meters(holder) {
                if self.prepare_meter(&MeterSpec::new(target.clone(), meter_type)) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn clear_meters(&mut self) {
        *self.world_mut().resource_mut::<MeterRegistry>() = MeterRegistry::default();
    }

    pub fn meters(&self) -> &MeterRegistry {
        self.world().resource::<MeterRegistry>()
    }

    fn models_of(&mut self, id: &DeviceId) -> Option<Mut<'_, DynamicModels>> {
        let entity = self.device_entity(id)?;
        self.get_mut::<DynamicModels>(entity)
    }

    /// Number of dynamic models attached to all devices.
    pub fn dynamic_model_count(&mut self) -> usize {
        let world = self.world_mut();
        world.query::<&DynamicModels>().iter(world).map(|m| m.len()).sum()
    }

    /// Attaches (or replaces) the model of `model_type` on a device.
    pub fn set_dynamic_model(
        &mut self,
        id: &DeviceId,
        model_type: &str,
        model_name: &str,
        params: impl IntoIterator<Item = (String, f64)>,
    ) -> bool {
        let model_type = normalize_name(model_type);
        let Some(entity) = self.device_entity(id) else {
            self.report(format!("{id} does not exist. Model {model_name} is not attached."));
            return false;
        };
        let replacing = self
            .get::<DynamicModels>(entity)
            .is_some_and(|m| m.contains_key(&model_type));
        let limit = self.capacity().dynamic_models;
        if !replacing && self.dynamic_model_count() >= limit {
            self.report(format!(
                "Dynamic model capacity {limit} is reached. Model {model_name} of {id} is not attached."
            ));
            return false;
        }
        let record = ModelRecord {
            name: normalize_name(model_name),
            params: params
                .into_iter()
                .map(|(k, v)| (normalize_name(&k), v))
                .collect::<IndexMap<_, _>>(),
        };
        if let Some(mut models) = self.get_mut::<DynamicModels>(entity) {
            models.insert(model_type, record);
        }
        true
    }

    pub fn dynamic_model_name(&self, id: &DeviceId, model_type: &str) -> String {
        self.device_entity(id)
            .and_then(|e| self.get::<DynamicModels>(e))
            .and_then(|m| m.get(&normalize_name(model_type)).map(|r| r.name.clone()))
            .unwrap_or_default()
    }

    pub fn dynamic_model_parameter(&self, id: &DeviceId, model_type: &str, par: &str) -> Option<f64> {
        let entity = self.device_entity(id)?;
        self.get::<DynamicModels>(entity)?
            .parameter(&normalize_name(model_type), &normalize_name(par))
    }

    /// Writes a parameter of an attached model; the model must exist.
    pub fn set_dynamic_model_parameter(&mut self, id: &DeviceId, model_type: &str, par: &str, value: f64) -> bool {
        let model_type = normalize_name(model_type);
        let written = self
            .models_of(id)
            .and_then(|mut m| {
                m.get_mut(&model_type)
                    .map(|record| record.params.insert(normalize_name(par), value))
            })
            .is_some();
        if !written {
            self.report(format!("{id} has no {model_type} model. Parameter {par} is not set."));
        }
        written
    }

    pub fn dynamic_model_parameter_pairs(&self, id: &DeviceId, model_type: &str) -> Vec<(String, f64)> {
        self.device_entity(id)
            .and_then(|e| self.get::<DynamicModels>(e))
            .and_then(|m| m.get(&normalize_name(model_type)))
            .map(|r| r.params.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }
}
