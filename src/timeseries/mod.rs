pub mod meter;
pub mod sim_time;
pub mod state;

use bevy_ecs::schedule::{ExecutorKind, IntoScheduleConfigs, Schedule};

pub use meter::{Meter, MeterRegistry, MeterSpec, record_sample};
pub use state::{DynamicSimulatorConfig, Phase, SimulationState, count_step, surveil_angles};

/// One simulation step: advance the clock, evaluate angle stability, then
/// sample every meter at the new time.
pub fn dynamics_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems((sim_time::advance, count_step, surveil_angles, record_sample).chain());
    schedule
}
