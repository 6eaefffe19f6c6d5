use bevy_ecs::prelude::*;

use super::DeviceData;
use crate::basic::ecs::fields::{Field, ParamTable};
use crate::field;

/// Lumped remainder of an external network seen from one bus.
#[derive(Component, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EquivalentDevice {
    pub status: bool,
    pub pgen_mw: f64,
    pub qgen_mvar: f64,
    pub pload_mw: f64,
    pub qload_mvar: f64,
}

impl Default for EquivalentDevice {
    fn default() -> Self {
        Self {
            status: true,
            pgen_mw: 0.0,
            qgen_mvar: 0.0,
            pload_mw: 0.0,
            qload_mvar: 0.0,
        }
    }
}

impl DeviceData for EquivalentDevice {
    fn in_service(&self) -> bool {
        self.status
    }
    fn set_in_service(&mut self, on: bool) {
        self.status = on;
    }
}

impl ParamTable for EquivalentDevice {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<EquivalentDevice>] = &[
            field!(EquivalentDevice, bool "STATUS", ["IN_SERVICE"] => status),
            field!(EquivalentDevice, float "PGEN_MW" => pgen_mw),
            field!(EquivalentDevice, float "QGEN_MVAR" => qgen_mvar),
            field!(EquivalentDevice, float "PLOAD_MW" => pload_mw),
            field!(EquivalentDevice, float "QLOAD_MVAR" => qload_mvar),
        ];
        FIELDS
    }
}
