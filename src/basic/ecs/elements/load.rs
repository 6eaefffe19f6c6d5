use bevy_ecs::prelude::*;
use nalgebra::Complex;

use super::DeviceData;
use crate::basic::ecs::fields::{Field, ParamTable};
use crate::field;
use crate::toolkit::param::{ParamType, ParamValue};

/// ZIP load: constant power, constant current and constant impedance parts
/// at nominal voltage, times a manual scale factor.
#[derive(Component, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LoadDevice {
    pub status: bool,
    pub pp0_mw: f64,
    pub qp0_mvar: f64,
    pub pi0_mw: f64,
    pub qi0_mvar: f64,
    pub pz0_mw: f64,
    pub qz0_mvar: f64,
    pub scale_pu: f64,
}

impl Default for LoadDevice {
    fn default() -> Self {
        Self {
            status: true,
            pp0_mw: 0.0,
            qp0_mvar: 0.0,
            pi0_mw: 0.0,
            qi0_mvar: 0.0,
            pz0_mw: 0.0,
            qz0_mvar: 0.0,
            scale_pu: 1.0,
        }
    }
}

impl LoadDevice {
    /// Total demand in MVA; zero while out of service.
    pub fn power_mva(&self) -> Complex<f64> {
        if !self.status {
            return Complex::new(0.0, 0.0);
        }
        Complex::new(
            self.pp0_mw + self.pi0_mw + self.pz0_mw,
            self.qp0_mvar + self.qi0_mvar + self.qz0_mvar,
        ) * self.scale_pu
    }

    pub fn scale(&mut self, percent: f64) {
        self.scale_pu *= 1.0 + percent;
    }
}

impl DeviceData for LoadDevice {
    fn in_service(&self) -> bool {
        self.status
    }
    fn set_in_service(&mut self, on: bool) {
        self.status = on;
    }
}

impl ParamTable for LoadDevice {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<LoadDevice>] = &[
            field!(LoadDevice, bool "STATUS", ["IN_SERVICE"] => status),
            field!(LoadDevice, float "PP0_MW" => pp0_mw),
            field!(LoadDevice, float "QP0_MVAR" => qp0_mvar),
            field!(LoadDevice, float "PI0_MW" => pi0_mw),
            field!(LoadDevice, float "QI0_MVAR" => qi0_mvar),
            field!(LoadDevice, float "PZ0_MW" => pz0_mw),
            field!(LoadDevice, float "QZ0_MVAR" => qz0_mvar),
            field!(LoadDevice, float "SCALE_PU", ["MANUAL_SCALE_PU"] => scale_pu),
            Field {
                name: "P_MW",
                aliases: &["PLOAD_MW"],
                kind: ParamType::Float,
                get: |d: &LoadDevice| ParamValue::Float(d.power_mva().re),
                set: None,
            },
            Field {
                name: "Q_MVAR",
                aliases: &["QLOAD_MVAR"],
                kind: ParamType::Float,
                get: |d: &LoadDevice| ParamValue::Float(d.power_mva().im),
                set: None,
            },
        ];
        FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_leaves_breaker_alone() {
        let mut load = LoadDevice {
            pp0_mw: 80.0,
            pz0_mw: 20.0,
            qp0_mvar: 30.0,
            ..Default::default()
        };
        load.scale(0.1);
        let s = load.power_mva();
        assert!((s.re - 110.0).abs() < 1e-9);
        assert!((s.im - 33.0).abs() < 1e-9);
        assert!(load.status);
        load.set_in_service(false);
        assert_eq!(load.power_mva(), Complex::new(0.0, 0.0));
        assert!((load.scale_pu - 1.1).abs() < 1e-12);
    }
}
