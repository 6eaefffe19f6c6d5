use bevy_ecs::prelude::*;

use super::DeviceData;
use crate::basic::ecs::fields::{Field, ParamTable};
use crate::field;
use crate::toolkit::param::{ParamType, ParamValue};

/// Pi-section line between a sending and a receiving bus.
#[derive(Component, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineDevice {
    pub breaker_send: bool,
    pub breaker_receive: bool,
    pub r_pu: f64,
    pub x_pu: f64,
    pub b_pu: f64,
    pub length_km: f64,
    pub rate_a_mva: f64,
    pub rate_b_mva: f64,
    pub rate_c_mva: f64,
}

impl Default for LineDevice {
    fn default() -> Self {
        Self {
            breaker_send: true,
            breaker_receive: true,
            r_pu: 0.0,
            x_pu: 0.0,
            b_pu: 0.0,
            length_km: 0.0,
            rate_a_mva: 0.0,
            rate_b_mva: 0.0,
            rate_c_mva: 0.0,
        }
    }
}

impl LineDevice {
    pub fn impedance_pu(&self) -> f64 {
        self.r_pu.hypot(self.x_pu)
    }
}

impl DeviceData for LineDevice {
    /// In service only while both ends are closed.
    fn in_service(&self) -> bool {
        self.breaker_send && self.breaker_receive
    }
    fn set_in_service(&mut self, on: bool) {
        self.breaker_send = on;
        self.breaker_receive = on;
    }
}

impl ParamTable for LineDevice {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<LineDevice>] = &[
            field!(LineDevice, bool "BREAKER_SEND", ["STATUS_SEND"] => breaker_send),
            field!(LineDevice, bool "BREAKER_RECEIVE", ["STATUS_RECEIVE"] => breaker_receive),
            Field {
                name: "STATUS",
                aliases: &["IN_SERVICE"],
                kind: ParamType::Boolean,
                get: |d: &LineDevice| ParamValue::Boolean(d.in_service()),
                set: Some(|d: &mut LineDevice, v: ParamValue| {
                    d.set_in_service(v.as_bool());
                    Ok(())
                }),
            },
            field!(LineDevice, float "R_PU", ["R"] => r_pu),
            field!(LineDevice, float "X_PU", ["X"] => x_pu),
            field!(LineDevice, float "B_PU", ["B"] => b_pu),
            field!(LineDevice, float "LENGTH_KM" => length_km),
            field!(LineDevice, float "RATE_A_MVA" => rate_a_mva),
            field!(LineDevice, float "RATE_B_MVA" => rate_b_mva),
            field!(LineDevice, float "RATE_C_MVA" => rate_c_mva),
        ];
        FIELDS
    }
}
