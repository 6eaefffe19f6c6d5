//! Typed parameter access.
//!
//! Every readable attribute in a toolkit, whether it belongs to a bus, a
//! device, an area/zone/owner, the toolkit itself or a solver, is reached
//! through the same call: an [`EntityRef`], a case-insensitive type tag and a
//! parameter name. The engine resolves the name against the per-class field
//! tables and checks the tag against the declared type.
//!
//! The plain accessors never fail. A read that cannot be served returns the
//! zero value of the requested type and a write that cannot be served
//! changes nothing. The `try_*` accessors return the [`AccessError`] instead.
use std::fmt;
use std::str::FromStr;

use derive_more::From;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Toolkit;
use super::error::{AccessError, AccessResult};
use super::id::{BusNumber, DeviceClass, DeviceId, IdTuple, normalize_name};

/// The four primitive parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Integer,
    Float,
    Boolean,
    String,
}

impl ParamType {
    /// Value returned when a read of this type cannot be served.
    pub fn zero(self) -> ParamValue {
        match self {
            ParamType::Integer => ParamValue::Integer(0),
            ParamType::Float => ParamValue::Float(0.0),
            ParamType::Boolean => ParamValue::Boolean(false),
            ParamType::String => ParamValue::String(String::new()),
        }
    }
}

impl FromStr for ParamType {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "I" | "INT" | "INTEGER" => Ok(ParamType::Integer),
            "F" | "D" | "FLOAT" | "DOUBLE" => Ok(ParamType::Float),
            "B" | "BOOL" | "BOOLEAN" => Ok(ParamType::Boolean),
            "S" | "STRING" => Ok(ParamType::String),
            _ => Err(AccessError::InvalidTypeTag(s.to_string())),
        }
    }
}

/// A parameter value of one of the four primitive types.
#[derive(Debug, Clone, PartialEq, From, Serialize, Deserialize)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Integer(v as i64)
    }
}
impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Integer(v as i64)
    }
}
impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Boolean(_) => ParamType::Boolean,
            ParamValue::String(_) => ParamType::String,
        }
    }

    /// Converts to `ty` where that is lossless; integers widen to floats.
    pub fn coerce(&self, ty: ParamType) -> Option<ParamValue> {
        match (self, ty) {
            (v, t) if v.param_type() == t => Some(v.clone()),
            (ParamValue::Integer(i), ParamType::Float) => Some(ParamValue::Float(*i as f64)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            ParamValue::Integer(v) => *v,
            _ => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            ParamValue::Float(v) => *v,
            ParamValue::Integer(v) => *v as f64,
            _ => 0.0,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self, ParamValue::Boolean(true))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ParamValue::String(s) => s,
            _ => "",
        }
    }

    /// Scalar used by meters: booleans read as 0/1, strings as 0.
    pub fn to_scalar(&self) -> f64 {
        match self {
            ParamValue::Boolean(b) => f64::from(u8::from(*b)),
            other => other.as_f64(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Boolean(v) => write!(f, "{v}"),
            ParamValue::String(v) => write!(f, "\"{v}\""),
        }
    }
}

/// Which part of a multi-terminal device a parameter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Whole,
    Primary,
    Secondary,
    Tertiary,
    Rectifier,
    Inverter,
}

impl FromStr for Side {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "" | "TRANSFORMER" | "HVDC" | "WHOLE" => Ok(Side::Whole),
            "PRIMARY" => Ok(Side::Primary),
            "SECONDARY" => Ok(Side::Secondary),
            "TERTIARY" => Ok(Side::Tertiary),
            "RECTIFIER" => Ok(Side::Rectifier),
            "INVERTER" => Ok(Side::Inverter),
            _ => Err(AccessError::InvalidSide {
                owner: "any device".to_string(),
                side: s.to_string(),
            }),
        }
    }
}

/// Owner of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Toolkit,
    PowerflowSolver,
    DynamicSimulator,
    Bus(BusNumber),
    Device(DeviceId),
    Area(u32),
    Zone(u32),
    Owner(u32),
}

impl From<DeviceId> for EntityRef {
    fn from(id: DeviceId) -> Self {
        EntityRef::Device(id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Toolkit => f.write_str("toolkit"),
            EntityRef::PowerflowSolver => f.write_str("powerflow solver"),
            EntityRef::DynamicSimulator => f.write_str("dynamic simulator"),
            EntityRef::Bus(b) => write!(f, "BUS {b}"),
            EntityRef::Device(id) => write!(f, "{id}"),
            EntityRef::Area(n) => write!(f, "AREA {n}"),
            EntityRef::Zone(n) => write!(f, "ZONE {n}"),
            EntityRef::Owner(n) => write!(f, "OWNER {n}"),
        }
    }
}

impl Toolkit {
    pub fn try_get_data(
        &self,
        entity: &EntityRef,
        type_tag: &str,
        name: &str,
    ) -> AccessResult<ParamValue> {
        self.try_get_side_data(entity, "", type_tag, name)
    }

    pub fn try_get_side_data(
        &self,
        entity: &EntityRef,
        side: &str,
        type_tag: &str,
        name: &str,
    ) -> AccessResult<ParamValue> {
        let ty: ParamType = type_tag.parse()?;
        let side: Side = side.parse()?;
        let name = normalize_name(name);
        self.with_grid(|grid| grid.read_param(entity, side, &name, ty))
    }

    /// Reads a parameter, falling back to the zero value of the requested
    /// type. An unparsable type tag reads as `Integer(0)`.
    pub fn get_data(&self, entity: &EntityRef, type_tag: &str, name: &str) -> ParamValue {
        self.get_side_data(entity, "", type_tag, name)
    }

    pub fn get_side_data(
        &self,
        entity: &EntityRef,
        side: &str,
        type_tag: &str,
        name: &str,
    ) -> ParamValue {
        self.try_get_side_data(entity, side, type_tag, name)
            .unwrap_or_else(|err| {
                debug!(%entity, name, %err, "parameter read served with sentinel");
                type_tag
                    .parse::<ParamType>()
                    .map(ParamType::zero)
                    .unwrap_or(ParamValue::Integer(0))
            })
    }

    pub fn try_set_data(
        &self,
        entity: &EntityRef,
        type_tag: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> AccessResult<()> {
        self.try_set_side_data(entity, "", type_tag, name, value)
    }

    pub fn try_set_side_data(
        &self,
        entity: &EntityRef,
        side: &str,
        type_tag: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> AccessResult<()> {
        let ty: ParamType = type_tag.parse()?;
        let side: Side = side.parse()?;
        let name = normalize_name(name);
        let value = value.into();
        let value = value.coerce(ty).ok_or_else(|| AccessError::TypeMismatch {
            name: name.clone(),
            declared: ty,
            requested: value.param_type(),
        })?;
        self.with_grid(|grid| grid.write_param(entity, side, &name, ty, value))
    }

    /// Writes a parameter; anything that cannot be served is a no-op.
    pub fn set_data(&self, entity: &EntityRef, type_tag: &str, name: &str, value: impl Into<ParamValue>) {
        self.set_side_data(entity, "", type_tag, name, value)
    }

    pub fn set_side_data(
        &self,
        entity: &EntityRef,
        side: &str,
        type_tag: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) {
        if let Err(err) = self.try_set_side_data(entity, side, type_tag, name, value) {
            debug!(%entity, name, %err, "parameter write ignored");
        }
    }

    pub fn get_bus_data(&self, bus: BusNumber, type_tag: &str, name: &str) -> ParamValue {
        self.get_data(&EntityRef::Bus(bus), type_tag, name)
    }

    pub fn set_bus_data(&self, bus: BusNumber, type_tag: &str, name: &str, value: impl Into<ParamValue>) {
        self.set_data(&EntityRef::Bus(bus), type_tag, name, value)
    }

    /// Reads a device parameter. `side` is only meaningful for transformers
    /// and HVDC links; pass `""` for the whole device.
    pub fn get_device_data(
        &self,
        class: DeviceClass,
        id: impl IdTuple,
        side: &str,
        type_tag: &str,
        name: &str,
    ) -> ParamValue {
        match DeviceId::decode(class, &id) {
            Ok(id) => self.get_side_data(&EntityRef::Device(id), side, type_tag, name),
            Err(err) => {
                debug!(%class, %err, "device read with malformed identifier");
                type_tag
                    .parse::<ParamType>()
                    .map(ParamType::zero)
                    .unwrap_or(ParamValue::Integer(0))
            }
        }
    }

    pub fn set_device_data(
        &self,
        class: DeviceClass,
        id: impl IdTuple,
        side: &str,
        type_tag: &str,
        name: &str,
        value: impl Into<ParamValue>,
    ) {
        match DeviceId::decode(class, &id) {
            Ok(id) => self.set_side_data(&EntityRef::Device(id), side, type_tag, name, value),
            Err(err) => debug!(%class, %err, "device write with malformed identifier"),
        }
    }

    pub fn get_area_data(&self, area: u32, type_tag: &str, name: &str) -> ParamValue {
        self.get_data(&EntityRef::Area(area), type_tag, name)
    }

    pub fn set_area_data(&self, area: u32, type_tag: &str, name: &str, value: impl Into<ParamValue>) {
        self.set_data(&EntityRef::Area(area), type_tag, name, value)
    }

    pub fn get_zone_data(&self, zone: u32, type_tag: &str, name: &str) -> ParamValue {
        self.get_data(&EntityRef::Zone(zone), type_tag, name)
    }

    pub fn set_zone_data(&self, zone: u32, type_tag: &str, name: &str, value: impl Into<ParamValue>) {
        self.set_data(&EntityRef::Zone(zone), type_tag, name, value)
    }

    pub fn get_owner_data(&self, owner: u32, type_tag: &str, name: &str) -> ParamValue {
        self.get_data(&EntityRef::Owner(owner), type_tag, name)
    }

    pub fn set_owner_data(&self, owner: u32, type_tag: &str, name: &str, value: impl Into<ParamValue>) {
        self.set_data(&EntityRef::Owner(owner), type_tag, name, value)
    }

    pub fn get_toolkit_data(&self, type_tag: &str, name: &str) -> ParamValue {
        self.get_data(&EntityRef::Toolkit, type_tag, name)
    }

    pub fn set_toolkit_data(&self, type_tag: &str, name: &str, value: impl Into<ParamValue>) {
        self.set_data(&EntityRef::Toolkit, type_tag, name, value)
    }

    /// Power-flow solver settings; STRING parameters do not exist here.
    pub fn get_powerflow_solver_parameter(&self, type_tag: &str, name: &str) -> ParamValue {
        self.get_data(&EntityRef::PowerflowSolver, type_tag, name)
    }

    pub fn set_powerflow_solver_parameter(&self, type_tag: &str, name: &str, value: impl Into<ParamValue>) {
        self.set_data(&EntityRef::PowerflowSolver, type_tag, name, value)
    }

    pub fn get_dynamic_simulator_parameter(&self, type_tag: &str, name: &str) -> ParamValue {
        self.get_data(&EntityRef::DynamicSimulator, type_tag, name)
    }

    pub fn set_dynamic_simulator_parameter(&self, type_tag: &str, name: &str, value: impl Into<ParamValue>) {
        self.set_data(&EntityRef::DynamicSimulator, type_tag, name, value)
    }
}
