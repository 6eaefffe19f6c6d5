//! Sources: generators, wind-turbine generators, PV units and energy
//! storages. They share one data shape and one parameter table.
use bevy_ecs::prelude::*;

use super::DeviceData;
use crate::basic::ecs::fields::{Field, ParamTable};
use crate::field;

#[derive(Component, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceDevice {
    pub status: bool,
    pub mbase_mva: f64,
    pub pgen_mw: f64,
    pub qgen_mvar: f64,
    pub pmax_mw: f64,
    pub pmin_mw: f64,
    pub qmax_mvar: f64,
    pub qmin_mvar: f64,
    pub vreg_pu: f64,
    pub r_source_pu: f64,
    pub x_source_pu: f64,
    pub rotor_angle_deg: f64,
    /// Number of identical units lumped into this source.
    pub lumped_units: i64,
}

impl Default for SourceDevice {
    fn default() -> Self {
        Self {
            status: true,
            mbase_mva: 100.0,
            pgen_mw: 0.0,
            qgen_mvar: 0.0,
            pmax_mw: 9999.0,
            pmin_mw: -9999.0,
            qmax_mvar: 9999.0,
            qmin_mvar: -9999.0,
            vreg_pu: 1.0,
            r_source_pu: 0.0,
            x_source_pu: 0.01,
            rotor_angle_deg: 0.0,
            lumped_units: 1,
        }
    }
}

impl SourceDevice {
    /// Scales capacity and output by `1 - percent`. Repeated calls compound.
    /// A source left with no capacity is tripped.
    pub fn shed(&mut self, percent: f64) {
        let keep = 1.0 - percent;
        self.mbase_mva *= keep;
        self.pgen_mw *= keep;
        self.qgen_mvar *= keep;
        self.pmax_mw *= keep;
        self.pmin_mw *= keep;
        self.qmax_mvar *= keep;
        self.qmin_mvar *= keep;
        if self.mbase_mva <= 0.0 {
            self.status = false;
        }
    }

    /// Removes `n` lumped units, scaling the source down in proportion.
    pub fn trip_units(&mut self, n: i64) {
        if n <= 0 || self.lumped_units <= 0 {
            return;
        }
        let n = n.min(self.lumped_units);
        let fraction = n as f64 / self.lumped_units as f64;
        self.lumped_units -= n;
        self.shed(fraction);
        if self.lumped_units == 0 {
            self.status = false;
        }
    }
}

impl DeviceData for SourceDevice {
    fn in_service(&self) -> bool {
        self.status
    }
    fn set_in_service(&mut self, on: bool) {
        self.status = on;
    }
}

impl ParamTable for SourceDevice {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<SourceDevice>] = &[
            field!(SourceDevice, bool "STATUS", ["IN_SERVICE"] => status),
            field!(SourceDevice, float "MBASE_MVA", ["MBASE"] => mbase_mva),
            field!(SourceDevice, float "PGEN_MW", ["P_MW"] => pgen_mw),
            field!(SourceDevice, float "QGEN_MVAR", ["Q_MVAR"] => qgen_mvar),
            field!(SourceDevice, float "PMAX_MW" => pmax_mw),
            field!(SourceDevice, float "PMIN_MW" => pmin_mw),
            field!(SourceDevice, float "QMAX_MVAR" => qmax_mvar),
            field!(SourceDevice, float "QMIN_MVAR" => qmin_mvar),
            field!(SourceDevice, float "VREG_PU", ["VOLTAGE_TO_REGULATE_PU"] => vreg_pu),
            field!(SourceDevice, float "R_SOURCE_PU" => r_source_pu),
            field!(SourceDevice, float "X_SOURCE_PU" => x_source_pu),
            field!(SourceDevice, float "ROTOR_ANGLE_DEG" => rotor_angle_deg),
            field!(SourceDevice, int "N_LUMPED", ["NUMBER_OF_LUMPED_UNITS"] => lumped_units),
        ];
        FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shedding_compounds() {
        let mut g = SourceDevice {
            mbase_mva: 100.0,
            pgen_mw: 50.0,
            ..Default::default()
        };
        g.shed(0.2);
        g.shed(0.3);
        assert!((g.mbase_mva - 56.0).abs() < 1e-9);
        assert!((g.pgen_mw - 28.0).abs() < 1e-9);
        assert!(g.status);
        g.shed(-0.5);
        assert!((g.mbase_mva - 84.0).abs() < 1e-9);
        g.shed(1.0);
        assert!(!g.status);
    }

    #[test]
    fn lumped_units_trip_in_proportion() {
        let mut wt = SourceDevice {
            mbase_mva: 40.0,
            lumped_units: 20,
            ..Default::default()
        };
        wt.trip_units(5);
        assert_eq!(wt.lumped_units, 15);
        assert!((wt.mbase_mva - 30.0).abs() < 1e-9);
        wt.trip_units(50);
        assert_eq!(wt.lumped_units, 0);
        assert!(!wt.status);
    }
}
