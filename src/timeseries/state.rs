//! Run state of the dynamic simulator and its settings.
use std::collections::HashMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::basic::ecs::connectivity::ac_islands;
use crate::basic::ecs::elements::{DeviceTag, SourceDevice};
use crate::basic::ecs::fields::{Field, ParamTable};
use crate::field;
use crate::toolkit::id::{BusNumber, DeviceClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Resource)]
pub struct SimulationState {
    pub phase: Phase,
    pub steps: u64,
    /// Result of the last angle surveillance; true while disabled.
    pub angle_stable: bool,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            steps: 0,
            angle_stable: true,
        }
    }
}

impl SimulationState {
    pub fn reset(&mut self) {
        self.phase = Phase::Running;
        self.steps = 0;
        self.angle_stable = true;
    }
}

/// Resource that holds the dynamic simulator options.
#[derive(Debug, Clone, PartialEq, Resource, Serialize, Deserialize)]
pub struct DynamicSimulatorConfig {
    pub max_dae_iter: i64,
    pub min_dae_iter: i64,
    pub max_network_iter: i64,
    pub p_tol_mva: f64,
    pub accelerator: f64,
    pub angle_threshold_deg: f64,
    pub csv_export: bool,
    pub angle_surveillance: bool,
    pub output_filename: String,
}

impl Default for DynamicSimulatorConfig {
    fn default() -> Self {
        Self {
            max_dae_iter: 100,
            min_dae_iter: 3,
            max_network_iter: 50,
            p_tol_mva: 0.001,
            accelerator: 1.0,
            angle_threshold_deg: 360.0,
            csv_export: false,
            angle_surveillance: false,
            output_filename: String::new(),
        }
    }
}

impl ParamTable for DynamicSimulatorConfig {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<DynamicSimulatorConfig>] = &[
            field!(DynamicSimulatorConfig, int "MAX_DAE_ITERATION" => max_dae_iter),
            field!(DynamicSimulatorConfig, int "MIN_DAE_ITERATION" => min_dae_iter),
            field!(DynamicSimulatorConfig, int "MAX_NETWORK_ITERATION" => max_network_iter),
            field!(DynamicSimulatorConfig, float "ALLOWED_MAX_POWER_IMBALANCE_IN_MVA" => p_tol_mva),
            field!(DynamicSimulatorConfig, float "ITERATION_ACCELERATOR" => accelerator),
            field!(DynamicSimulatorConfig, float "ANGLE_STABILITY_THRESHOLD_IN_DEG" => angle_threshold_deg),
            field!(DynamicSimulatorConfig, bool "CSV_EXPORT_LOGIC" => csv_export),
            field!(DynamicSimulatorConfig, bool "ANGLE_STABILITY_SURVEILLANCE_LOGIC" => angle_surveillance),
            field!(DynamicSimulatorConfig, string "OUTPUT_FILENAME", ["OUTPUT_FILE"] => output_filename),
        ];
        FIELDS
    }
}

/// Largest rotor-angle spread of in-service generators over all islands.
fn largest_angle_spread(world: &mut World) -> f64 {
    let (_, mut merge) = ac_islands(world);
    let mut extremes: HashMap<BusNumber, (f64, f64)> = HashMap::new();
    for (tag, source) in world.query::<(&DeviceTag, &SourceDevice)>().iter(world) {
        if tag.class != DeviceClass::Generator || !source.status {
            continue;
        }
        let island = merge.find(tag.buses()[0]);
        let angle = source.rotor_angle_deg;
        let entry = extremes.entry(island).or_insert((angle, angle));
        entry.0 = entry.0.min(angle);
        entry.1 = entry.1.max(angle);
    }
    extremes.values().map(|(lo, hi)| hi - lo).fold(0.0, f64::max)
}

/// Evaluates angle stability after a step when surveillance is on.
pub fn surveil_angles(world: &mut World) {
    let config = world.resource::<DynamicSimulatorConfig>();
    let (enabled, threshold) = (config.angle_surveillance, config.angle_threshold_deg);
    let stable = !enabled || largest_angle_spread(world) <= threshold;
    world.resource_mut::<SimulationState>().angle_stable = stable;
}

pub fn count_step(mut state: ResMut<SimulationState>) {
    state.steps += 1;
}
