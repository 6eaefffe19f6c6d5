use bevy_ecs::prelude::*;
use derive_more::derive::{Deref, From, Into};

use super::{EntityName, fault::BusFaults};
use crate::basic::ecs::fields::{Field, ParamTable};
use crate::field;
use crate::toolkit::error::AccessError;
use crate::toolkit::param::{ParamType, ParamValue};

#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Deref, From, Into, serde::Serialize, serde::Deserialize,
)]
pub struct BusID(pub u32);

/// Bus role in power flow. Code 4 takes the bus out of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum BusType {
    #[default]
    PQ,
    PV,
    Slack,
    OutOfService,
}

impl BusType {
    pub fn code(self) -> i64 {
        match self {
            BusType::PQ => 1,
            BusType::PV => 2,
            BusType::Slack => 3,
            BusType::OutOfService => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(BusType::PQ),
            2 => Some(BusType::PV),
            3 => Some(BusType::Slack),
            4 => Some(BusType::OutOfService),
            _ => None,
        }
    }
}

#[derive(Component, Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BusData {
    pub bus_type: BusType,
    pub base_kv: f64,
    pub vm_pu: f64,
    pub va_deg: f64,
    pub vmax_pu: f64,
    pub vmin_pu: f64,
    pub fn_hz: f64,
}

impl Default for BusData {
    fn default() -> Self {
        Self {
            bus_type: BusType::PQ,
            base_kv: 100.0,
            vm_pu: 1.0,
            va_deg: 0.0,
            vmax_pu: 1.1,
            vmin_pu: 0.9,
            fn_hz: 50.0,
        }
    }
}

impl BusData {
    pub fn in_service(&self) -> bool {
        self.bus_type != BusType::OutOfService
    }
}

/// Area, zone and owner a bus belongs to; 0 is unassigned.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Membership {
    pub area: u32,
    pub zone: u32,
    pub owner: u32,
}

#[derive(Bundle)]
pub struct BusBundle {
    pub id: BusID,
    pub name: EntityName,
    pub data: BusData,
    pub membership: Membership,
    pub faults: BusFaults,
}

impl BusBundle {
    pub fn new(number: u32, name: &str, base_kv: f64) -> Self {
        Self {
            id: BusID(number),
            name: EntityName(name.to_string()),
            data: BusData {
                base_kv,
                ..Default::default()
            },
            membership: Membership::default(),
            faults: BusFaults::default(),
        }
    }
}

impl ParamTable for BusID {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<BusID>] = &[field!(BusID, ro int "NUMBER" => 0)];
        FIELDS
    }
}

impl ParamTable for BusData {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<BusData>] = &[
            Field {
                name: "TYPE",
                aliases: &["BUS_TYPE"],
                kind: ParamType::Integer,
                get: |d: &BusData| ParamValue::Integer(d.bus_type.code()),
                set: Some(|d: &mut BusData, v: ParamValue| {
                    let code = v.as_i64();
                    d.bus_type = BusType::from_code(code).ok_or(AccessError::OutOfRange {
                        name: "TYPE".to_string(),
                        value: code,
                    })?;
                    Ok(())
                }),
            },
            field!(BusData, float "BASE", ["VBASE_KV", "BASE_VOLTAGE_KV"] => base_kv),
            field!(BusData, float "VM_PU", ["V_PU", "VOLTAGE_PU"] => vm_pu),
            field!(BusData, float "VA_DEG", ["ANGLE_DEG"] => va_deg),
            field!(BusData, float "VMAX_PU" => vmax_pu),
            field!(BusData, float "VMIN_PU" => vmin_pu),
            field!(BusData, float "BASE_FREQUENCY_HZ", ["FN_HZ"] => fn_hz),
            Field {
                name: "IN_SERVICE",
                aliases: &["STATUS"],
                kind: ParamType::Boolean,
                get: |d: &BusData| ParamValue::Boolean(d.in_service()),
                set: Some(|d: &mut BusData, v: ParamValue| {
                    match (v.as_bool(), d.bus_type) {
                        (false, _) => d.bus_type = BusType::OutOfService,
                        (true, BusType::OutOfService) => d.bus_type = BusType::PQ,
                        (true, _) => {}
                    }
                    Ok(())
                }),
            },
        ];
        FIELDS
    }
}

impl ParamTable for Membership {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<Membership>] = &[
            field!(Membership, int "AREA" => area),
            field!(Membership, int "ZONE" => zone),
            field!(Membership, int "OWNER" => owner),
        ];
        FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::ecs::fields::{read, write};

    #[test]
    fn in_service_follows_type() {
        let mut bus = BusData::default();
        write(&mut bus, "IN SERVICE", ParamType::Boolean, &false.into()).unwrap().unwrap();
        assert_eq!(bus.bus_type, BusType::OutOfService);
        write(&mut bus, "IN SERVICE", ParamType::Boolean, &true.into()).unwrap().unwrap();
        assert_eq!(bus.bus_type, BusType::PQ);
        write(&mut bus, "TYPE", ParamType::Integer, &3.into()).unwrap().unwrap();
        assert!(matches!(
            write(&mut bus, "TYPE", ParamType::Integer, &9.into()),
            Some(Err(AccessError::OutOfRange { value: 9, .. }))
        ));
        assert_eq!(read(&bus, "TYPE", ParamType::Integer), Some(Ok(ParamValue::Integer(3))));
    }
}
