use std::collections::HashMap;
use std::fmt::Display;

use bevy_ecs::{component::Mutable, prelude::*, world::error::EntityMutableFetchError};

use super::connectivity::OvershadowedBuses;
use super::elements::GroupKind;
use super::fields::{Field, ParamTable};
use super::lookup::{DeviceLookup, GroupLookup, NodeLookup};
use super::powerflow::PowerFlowConfig;
use super::search::SearchCursors;
use crate::field;
use crate::logging::LogSink;
use crate::timeseries::{DynamicSimulatorConfig, MeterRegistry, SimulationState, dynamics_schedule};
use crate::timeseries::sim_time::{DeltaTime, Time};
use crate::toolkit::id::{BusNumber, DeviceClass, DeviceId};
use crate::toolkit::param::ParamValue;

pub const DEFAULT_MAX_BUS_NUMBER: u32 = 100_000;
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Case-level data of a toolkit.
#[derive(Debug, Clone, Resource, serde::Serialize, serde::Deserialize)]
pub struct ToolkitData {
    pub name: String,
    pub sbase_mva: f64,
    pub case_info: String,
    pub case_additional_info: String,
    pub parallel_threads: usize,
}

impl Default for ToolkitData {
    fn default() -> Self {
        Self {
            name: String::new(),
            sbase_mva: 100.0,
            case_info: String::new(),
            case_additional_info: String::new(),
            parallel_threads: 1,
        }
    }
}

impl ParamTable for ToolkitData {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<ToolkitData>] = &[
            field!(ToolkitData, float "SBASE", ["SYSTEM_BASE_POWER_IN_MVA"] => sbase_mva),
            field!(ToolkitData, string "TOOLKIT_NAME" => name),
            field!(ToolkitData, string "CASE_INFORMATION" => case_info),
            field!(ToolkitData, string "CASE_ADDITIONAL_INFORMATION" => case_additional_info),
        ];
        FIELDS
    }
}

impl ParamTable for LogSink {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<LogSink>] = &[field!(LogSink, bool "DETAILED_LOG_LOGIC" => detailed)];
        FIELDS
    }
}

/// Storage limits. Meant to be set before the database is populated.
#[derive(Debug, Clone, Resource)]
pub struct Capacity {
    pub max_bus_number: BusNumber,
    pub buses: usize,
    pub devices: HashMap<DeviceClass, usize>,
    pub groups: HashMap<GroupKind, usize>,
    pub dynamic_models: usize,
}

impl Default for Capacity {
    fn default() -> Self {
        Self {
            max_bus_number: DEFAULT_MAX_BUS_NUMBER,
            buses: DEFAULT_CAPACITY,
            devices: HashMap::new(),
            groups: HashMap::new(),
            dynamic_models: DEFAULT_CAPACITY,
        }
    }
}

impl Capacity {
    pub fn device(&self, class: DeviceClass) -> usize {
        self.devices.get(&class).copied().unwrap_or(DEFAULT_CAPACITY)
    }
    pub fn group(&self, kind: GroupKind) -> usize {
        self.groups.get(&kind).copied().unwrap_or(DEFAULT_CAPACITY)
    }
}

/// One toolkit's network database: an ECS world plus the schedule that
/// advances its dynamic simulation by one step.
pub struct PowerGrid {
    world: World,
    dynamics: Schedule,
}

/// Trait for performing operations on ECS data, such as getting and mutating components of entities.
pub trait DataOps {
    fn get_entity_mut(
        &mut self,
        entity: Entity,
    ) -> Result<EntityWorldMut<'_>, EntityMutableFetchError>;
    fn get_mut<T>(&'_ mut self, entity: Entity) -> Option<Mut<'_, T>>
    where
        T: Component<Mutability = Mutable>;
    fn get<T>(&self, entity: Entity) -> Option<&T>
    where
        T: Component;
    fn world_mut(&mut self) -> &mut World;
    fn world(&self) -> &World;
}

impl Default for PowerGrid {
    fn default() -> Self {
        Self::new(LogSink::stdout())
    }
}

impl PowerGrid {
    pub fn new(sink: LogSink) -> Self {
        let mut world = World::new();
        world.insert_resource(sink);
        world.init_resource::<ToolkitData>();
        world.init_resource::<Capacity>();
        world.init_resource::<PowerFlowConfig>();
        world.init_resource::<DynamicSimulatorConfig>();
        world.insert_resource(DeltaTime(0.01));
        init_network_resources(&mut world);
        Self {
            world,
            dynamics: dynamics_schedule(),
        }
    }

    /// Drops every bus, device, grouping, fault and meter and returns the
    /// simulation to idle. Settings, capacities and the log sink stay.
    pub fn clear(&mut self) {
        self.world.clear_entities();
        init_network_resources(&mut self.world);
    }

    /// Runs the step schedule once against this grid.
    pub(crate) fn run_dynamics_schedule(&mut self) {
        self.dynamics.run(&mut self.world);
    }

    pub fn report(&mut self, msg: impl Display) {
        self.world.resource_mut::<LogSink>().report(msg);
    }

    pub fn report_detail(&mut self, msg: impl Display) {
        self.world.resource_mut::<LogSink>().detail(msg);
    }

    /// Swaps the log sink, keeping the detailed-log flag.
    pub fn set_sink(&mut self, mut sink: LogSink) {
        sink.detailed = self.world.resource::<LogSink>().detailed;
        self.world.resource_mut::<LogSink>().flush();
        self.world.insert_resource(sink);
    }

    pub fn bus_entity(&self, bus: BusNumber) -> Option<Entity> {
        self.world.resource::<NodeLookup>().get(bus)
    }

    pub fn device_entity(&self, id: &DeviceId) -> Option<Entity> {
        self.world.resource::<DeviceLookup>().get(id)
    }

    pub fn group_entity(&self, kind: GroupKind, number: u32) -> Option<Entity> {
        self.world.resource::<GroupLookup>().get(kind, number)
    }

    pub fn capacity(&self) -> &Capacity {
        self.world.resource::<Capacity>()
    }

    pub fn capacity_mut(&mut self) -> Mut<'_, Capacity> {
        self.world.resource_mut::<Capacity>()
    }

    pub fn toolkit_data(&self) -> &ToolkitData {
        self.world.resource::<ToolkitData>()
    }

    pub fn toolkit_data_mut(&mut self) -> Mut<'_, ToolkitData> {
        self.world.resource_mut::<ToolkitData>()
    }

    pub fn name(&self) -> ParamValue {
        ParamValue::String(self.toolkit_data().name.clone())
    }
}

fn init_network_resources(world: &mut World) {
    world.insert_resource(NodeLookup::default());
    world.insert_resource(DeviceLookup::default());
    world.insert_resource(GroupLookup::default());
    world.insert_resource(SearchCursors::default());
    world.insert_resource(OvershadowedBuses::default());
    world.insert_resource(MeterRegistry::default());
    world.insert_resource(SimulationState::default());
    world.insert_resource(Time(0.0));
}

impl DataOps for PowerGrid {
    fn world(&self) -> &World {
        &self.world
    }
    fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
    fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world.get(entity)
    }
    fn get_mut<T: Component>(&'_ mut self, entity: Entity) -> Option<Mut<'_, T>>
    where
        T: Component<Mutability = Mutable>,
    {
        self.world.get_mut(entity)
    }
    fn get_entity_mut(
        &mut self,
        entity: Entity,
    ) -> Result<EntityWorldMut<'_>, EntityMutableFetchError> {
        self.world.get_entity_mut(entity)
    }
}
