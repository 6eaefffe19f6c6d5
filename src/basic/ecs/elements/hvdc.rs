use bevy_ecs::prelude::*;

use super::DeviceData;
use crate::basic::ecs::fields::{Field, ParamTable, Sided};
use crate::field;
use crate::toolkit::param::{ParamType, ParamValue, Side};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Converter {
    pub bus: u32,
    pub n_bridge: i64,
    pub angle_min_deg: f64,
    pub angle_max_deg: f64,
    pub tap_pu: f64,
}

impl Converter {
    pub fn at(bus: u32) -> Self {
        Self {
            bus,
            n_bridge: 2,
            angle_min_deg: 5.0,
            angle_max_deg: 90.0,
            tap_pu: 1.0,
        }
    }
}

/// Two-terminal HVDC link; converters are `[rectifier, inverter]`.
///
/// `blocked` and `bypassed` are manual operator flags. They stay set until
/// reversed explicitly and are not touched by fault clearing.
#[derive(Component, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HvdcDevice {
    pub status: bool,
    pub pdcn_mw: f64,
    pub vdcn_kv: f64,
    pub r_dc_ohm: f64,
    pub blocked: bool,
    pub bypassed: bool,
    pub converters: [Converter; 2],
}

impl HvdcDevice {
    pub fn new(rectifier_bus: u32, inverter_bus: u32) -> Self {
        Self {
            status: true,
            pdcn_mw: 0.0,
            vdcn_kv: 500.0,
            r_dc_ohm: 0.0,
            blocked: false,
            bypassed: false,
            converters: [Converter::at(rectifier_bus), Converter::at(inverter_bus)],
        }
    }
}

impl DeviceData for HvdcDevice {
    fn in_service(&self) -> bool {
        self.status
    }
    fn set_in_service(&mut self, on: bool) {
        self.status = on;
    }
}

impl Sided for HvdcDevice {
    type Part = Converter;

    fn part(&self, side: Side) -> Option<&Converter> {
        match side {
            Side::Rectifier => Some(&self.converters[0]),
            Side::Inverter => Some(&self.converters[1]),
            _ => None,
        }
    }

    fn part_mut(&mut self, side: Side) -> Option<&mut Converter> {
        match side {
            Side::Rectifier => Some(&mut self.converters[0]),
            Side::Inverter => Some(&mut self.converters[1]),
            _ => None,
        }
    }
}

impl ParamTable for Converter {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<Converter>] = &[
            field!(Converter, ro int "BUS" => bus),
            field!(Converter, int "N_BRIDGE", ["BRIDGE_NUMBER"] => n_bridge),
            field!(Converter, float "ANGLE_MIN_DEG", ["ALPHA_MIN_DEG", "GAMMA_MIN_DEG"] => angle_min_deg),
            field!(Converter, float "ANGLE_MAX_DEG", ["ALPHA_MAX_DEG", "GAMMA_MAX_DEG"] => angle_max_deg),
            field!(Converter, float "TAP_PU", ["TAP"] => tap_pu),
        ];
        FIELDS
    }
}

impl ParamTable for HvdcDevice {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<HvdcDevice>] = &[
            field!(HvdcDevice, bool "STATUS", ["IN_SERVICE"] => status),
            field!(HvdcDevice, float "PDCN_MW", ["POWER_ORDER_MW"] => pdcn_mw),
            field!(HvdcDevice, float "VDCN_KV" => vdcn_kv),
            field!(HvdcDevice, float "R_DC_OHM", ["RDC_OHM"] => r_dc_ohm),
            Field {
                name: "BLOCKED",
                aliases: &[],
                kind: ParamType::Boolean,
                get: |d: &HvdcDevice| ParamValue::Boolean(d.blocked),
                set: None,
            },
            Field {
                name: "BYPASSED",
                aliases: &[],
                kind: ParamType::Boolean,
                get: |d: &HvdcDevice| ParamValue::Boolean(d.bypassed),
                set: None,
            },
        ];
        FIELDS
    }
}
