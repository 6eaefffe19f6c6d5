//! Parameter dispatch.
//!
//! An entity's parameters are the union of the tables of the components it
//! carries. Every holder kind has one static list of tables, searched in
//! order; the first table that knows the name serves the call.
use bevy_ecs::prelude::*;

use super::elements::*;
use super::fields::{ResourceOps, TableOps, kind_of, read_side, write_side};
use super::lookup::{DeviceLookup, GroupLookup, NodeLookup};
use super::network::{DataOps, PowerGrid, ToolkitData};
use super::powerflow::PowerFlowConfig;
use crate::logging::LogSink;
use crate::timeseries::DynamicSimulatorConfig;
use crate::timeseries::sim_time::DeltaTime;
use crate::toolkit::error::{AccessError, AccessResult};
use crate::toolkit::id::DeviceClass;
use crate::toolkit::param::{EntityRef, ParamType, ParamValue, Side};

/// The kinds of entity that carry component tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Holder {
    Bus,
    Device(DeviceClass),
    Group(GroupKind),
}

static BUS: [TableOps; 4] = [
    TableOps::of::<BusID>(),
    TableOps::of::<BusData>(),
    TableOps::of::<Membership>(),
    TableOps::of::<EntityName>(),
];

macro_rules! device_tables {
    ($name:ident, $data:ty) => {
        static $name: [TableOps; 4] = [
            TableOps::of::<$data>(),
            TableOps::of::<DeviceTag>(),
            TableOps::of::<EntityName>(),
            TableOps::of::<Ownership>(),
        ];
    };
}

device_tables!(SOURCE, SourceDevice);
device_tables!(LOAD, LoadDevice);
device_tables!(SHUNT, ShuntDevice);
device_tables!(LINE, LineDevice);
device_tables!(TRANSFORMER, TransformerDevice);
device_tables!(HVDC, HvdcDevice);
device_tables!(EQUIVALENT, EquivalentDevice);

static GROUP: [TableOps; 3] = [
    TableOps::of::<GroupID>(),
    TableOps::of::<EntityName>(),
    TableOps::of::<AreaData>(),
];

static TOOLKIT: [ResourceOps; 2] = [ResourceOps::of::<ToolkitData>(), ResourceOps::of::<LogSink>()];
static POWERFLOW: [ResourceOps; 1] = [ResourceOps::of::<PowerFlowConfig>()];
static DYNAMICS: [ResourceOps; 2] = [
    ResourceOps::of::<DynamicSimulatorConfig>(),
    ResourceOps::of::<DeltaTime>(),
];

impl Holder {
    pub fn tables(self) -> &'static [TableOps] {
        match self {
            Holder::Bus => &BUS,
            Holder::Group(_) => &GROUP,
            Holder::Device(class) => match class {
                DeviceClass::Generator
                | DeviceClass::WtGenerator
                | DeviceClass::PvUnit
                | DeviceClass::EnergyStorage => &SOURCE,
                DeviceClass::Load => &LOAD,
                DeviceClass::FixedShunt => &SHUNT,
                DeviceClass::Line => &LINE,
                DeviceClass::Transformer => &TRANSFORMER,
                DeviceClass::Hvdc => &HVDC,
                DeviceClass::EquivalentDevice => &EQUIVALENT,
            },
        }
    }

    /// Declared type of `name`, if the holder has such a parameter.
    pub fn field_type(self, side: Side, name: &str) -> Option<ParamType> {
        match (self, side) {
            (_, Side::Whole) => self.tables().iter().find_map(|t| (t.kind)(name)),
            (Holder::Device(DeviceClass::Transformer), Side::Primary | Side::Secondary | Side::Tertiary) => {
                kind_of::<Winding>(name)
            }
            (Holder::Device(DeviceClass::Hvdc), Side::Rectifier | Side::Inverter) => {
                kind_of::<Converter>(name)
            }
            _ => None,
        }
    }
}

fn unknown_parameter(owner: &dyn std::fmt::Display, name: &str) -> AccessError {
    AccessError::UnknownParameter {
        owner: owner.to_string(),
        name: name.to_string(),
    }
}

fn wrong_side(owner: &dyn std::fmt::Display, side: Side) -> AccessError {
    AccessError::InvalidSide {
        owner: owner.to_string(),
        side: format!("{side:?}"),
    }
}

pub fn read_entity(
    world: &World,
    entity: Entity,
    holder: Holder,
    side: Side,
    name: &str,
    ty: ParamType,
) -> Option<AccessResult<ParamValue>> {
    match (holder, side) {
        (_, Side::Whole) => holder
            .tables()
            .iter()
            .find_map(|t| (t.read)(world, entity, name, ty)),
        (Holder::Device(DeviceClass::Transformer), _) => {
            read_side::<TransformerDevice>(world, entity, side, name, ty)
        }
        (Holder::Device(DeviceClass::Hvdc), _) => read_side::<HvdcDevice>(world, entity, side, name, ty),
        _ => Some(Err(wrong_side(&"this entity", side))),
    }
}

pub fn write_entity(
    world: &mut World,
    entity: Entity,
    holder: Holder,
    side: Side,
    name: &str,
    ty: ParamType,
    value: &ParamValue,
) -> Option<AccessResult<()>> {
    match (holder, side) {
        (_, Side::Whole) => holder
            .tables()
            .iter()
            .find_map(|t| (t.write)(world, entity, name, ty, value)),
        (Holder::Device(DeviceClass::Transformer), _) => {
            write_side::<TransformerDevice>(world, entity, side, name, ty, value)
        }
        (Holder::Device(DeviceClass::Hvdc), _) => {
            write_side::<HvdcDevice>(world, entity, side, name, ty, value)
        }
        _ => Some(Err(wrong_side(&"this entity", side))),
    }
}

/// Finds the entity behind a bus, device or grouping reference.
pub fn locate(world: &World, target: &EntityRef) -> Option<(Entity, Holder)> {
    let group = |kind: GroupKind, n: u32| {
        let entity = world.resource::<GroupLookup>().get(kind, n)?;
        Some((entity, Holder::Group(kind)))
    };
    match target {
        EntityRef::Bus(bus) => Some((world.resource::<NodeLookup>().get(*bus)?, Holder::Bus)),
        EntityRef::Device(id) => Some((world.resource::<DeviceLookup>().get(id)?, Holder::Device(id.class))),
        EntityRef::Area(n) => group(GroupKind::Area, *n),
        EntityRef::Zone(n) => group(GroupKind::Zone, *n),
        EntityRef::Owner(n) => group(GroupKind::Owner, *n),
        EntityRef::Toolkit | EntityRef::PowerflowSolver | EntityRef::DynamicSimulator => None,
    }
}

impl PowerGrid {
    pub fn resolve(&self, target: &EntityRef) -> Option<(Entity, Holder)> {
        locate(self.world(), target)
    }

    fn settings(target: &EntityRef, side: Side, ty: ParamType) -> AccessResult<&'static [ResourceOps]> {
        if side != Side::Whole {
            return Err(wrong_side(target, side));
        }
        match target {
            EntityRef::PowerflowSolver if ty == ParamType::String => Err(AccessError::Unsupported(
                "the powerflow solver has no STRING parameters".to_string(),
            )),
            EntityRef::PowerflowSolver => Ok(&POWERFLOW),
            EntityRef::DynamicSimulator => Ok(&DYNAMICS),
            _ => Ok(&TOOLKIT),
        }
    }

    pub fn read_param(&self, target: &EntityRef, side: Side, name: &str, ty: ParamType) -> AccessResult<ParamValue> {
        let world = self.world();
        let served = match target {
            EntityRef::Toolkit | EntityRef::PowerflowSolver | EntityRef::DynamicSimulator => {
                Self::settings(target, side, ty)?
                    .iter()
                    .find_map(|r| (r.read)(world, name, ty))
            }
            _ => {
                let (entity, holder) = self
                    .resolve(target)
                    .ok_or_else(|| AccessError::UnknownEntity(target.to_string()))?;
                read_entity(world, entity, holder, side, name, ty)
            }
        };
        served.unwrap_or_else(|| Err(unknown_parameter(target, name)))
    }

    pub fn write_param(
        &mut self,
        target: &EntityRef,
        side: Side,
        name: &str,
        ty: ParamType,
        value: ParamValue,
    ) -> AccessResult<()> {
        let served = match target {
            EntityRef::Toolkit | EntityRef::PowerflowSolver | EntityRef::DynamicSimulator => {
                let tables = Self::settings(target, side, ty)?;
                let world = self.world_mut();
                tables.iter().find_map(|r| (r.write)(world, name, ty, &value))
            }
            _ => {
                let (entity, holder) = self
                    .resolve(target)
                    .ok_or_else(|| AccessError::UnknownEntity(target.to_string()))?;
                write_entity(self.world_mut(), entity, holder, side, name, ty, &value)
            }
        };
        served.unwrap_or_else(|| Err(unknown_parameter(target, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::id::DeviceId;

    fn grid_with_transformer() -> (PowerGrid, DeviceId) {
        let mut grid = PowerGrid::default();
        grid.add_bus(1, "HV", 230.0);
        grid.add_bus(2, "LV", 20.0);
        let id = DeviceId::decode(DeviceClass::Transformer, &(1, 2, "T1")).unwrap();
        grid.add_device(id.clone());
        (grid, id)
    }

    #[test]
    fn tables_are_searched_in_order() {
        let (grid, id) = grid_with_transformer();
        let target = EntityRef::Device(id);
        assert_eq!(
            grid.read_param(&target, Side::Whole, "ID", ParamType::String),
            Ok(ParamValue::String("T1".into()))
        );
        assert_eq!(
            grid.read_param(&target, Side::Whole, "KBUS", ParamType::Integer),
            Ok(ParamValue::Integer(0))
        );
        assert_eq!(
            grid.read_param(&target, Side::Whole, "FRAC1", ParamType::Float),
            Ok(ParamValue::Float(1.0))
        );
        assert!(matches!(
            grid.read_param(&target, Side::Whole, "TAP PU", ParamType::Float),
            Err(AccessError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn sides_only_apply_to_sided_devices() {
        let (mut grid, _) = grid_with_transformer();
        assert!(matches!(
            grid.read_param(&EntityRef::Bus(1), Side::Primary, "BASE", ParamType::Float),
            Err(AccessError::InvalidSide { .. })
        ));
        assert!(matches!(
            grid.write_param(
                &EntityRef::Toolkit,
                Side::Secondary,
                "SBASE",
                ParamType::Float,
                ParamValue::Float(50.0)
            ),
            Err(AccessError::InvalidSide { .. })
        ));
        assert_eq!(
            Holder::Device(DeviceClass::Hvdc).field_type(Side::Inverter, "N BRIDGE"),
            Some(ParamType::Integer)
        );
        assert_eq!(Holder::Bus.field_type(Side::Whole, "VM PU"), Some(ParamType::Float));
        assert_eq!(Holder::Bus.field_type(Side::Rectifier, "VM PU"), None);
    }

    #[test]
    fn area_fields_exist_only_on_areas() {
        let mut grid = PowerGrid::default();
        grid.add_group(GroupKind::Area, 1, "NORTH");
        grid.add_group(GroupKind::Zone, 1, "Z1");
        assert_eq!(
            grid.write_param(
                &EntityRef::Area(1),
                Side::Whole,
                "PDES MW",
                ParamType::Float,
                ParamValue::Float(120.0)
            ),
            Ok(())
        );
        assert!(matches!(
            grid.read_param(&EntityRef::Zone(1), Side::Whole, "PDES MW", ParamType::Float),
            Err(AccessError::UnknownParameter { .. })
        ));
        assert_eq!(
            grid.read_param(&EntityRef::Zone(1), Side::Whole, "NAME", ParamType::String),
            Ok(ParamValue::String("Z1".into()))
        );
    }
}
