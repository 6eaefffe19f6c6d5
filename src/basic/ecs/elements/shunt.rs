use bevy_ecs::prelude::*;

use super::DeviceData;
use crate::basic::ecs::fields::{Field, ParamTable};
use crate::field;

/// Fixed shunt, given as its consumption at 1.0 pu voltage.
#[derive(Component, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShuntDevice {
    pub status: bool,
    pub p_mw: f64,
    pub q_mvar: f64,
}

impl Default for ShuntDevice {
    fn default() -> Self {
        Self {
            status: true,
            p_mw: 0.0,
            q_mvar: 0.0,
        }
    }
}

impl DeviceData for ShuntDevice {
    fn in_service(&self) -> bool {
        self.status
    }
    fn set_in_service(&mut self, on: bool) {
        self.status = on;
    }
}

impl ParamTable for ShuntDevice {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<ShuntDevice>] = &[
            field!(ShuntDevice, bool "STATUS", ["IN_SERVICE"] => status),
            field!(ShuntDevice, float "P_MW", ["G_MW"] => p_mw),
            field!(ShuntDevice, float "Q_MVAR", ["B_MVAR"] => q_mvar),
        ];
        FIELDS
    }
}
