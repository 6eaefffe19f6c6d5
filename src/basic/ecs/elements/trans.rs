//! Two- and three-winding transformers.
//!
//! Winding parameters are addressed with a side selector (primary,
//! secondary, tertiary); impedances between windings and the magnetizing
//! branch belong to the whole transformer.
use bevy_ecs::prelude::*;

use super::DeviceData;
use crate::basic::ecs::fields::{Field, ParamTable, Sided};
use crate::field;
use crate::toolkit::param::{ParamType, ParamValue, Side};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Winding {
    pub bus: u32,
    pub breaker: bool,
    pub tap_pu: f64,
    pub nominal_kv: f64,
    pub rate_mva: f64,
}

impl Winding {
    pub fn at(bus: u32) -> Self {
        Self {
            bus,
            breaker: bus != 0,
            tap_pu: 1.0,
            nominal_kv: 0.0,
            rate_mva: 0.0,
        }
    }
}

#[derive(Component, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransformerDevice {
    pub windings: [Winding; 3],
    pub r_12_pu: f64,
    pub x_12_pu: f64,
    pub r_23_pu: f64,
    pub x_23_pu: f64,
    pub r_13_pu: f64,
    pub x_13_pu: f64,
    pub mag_g_pu: f64,
    pub mag_b_pu: f64,
}

impl TransformerDevice {
    pub fn new(ibus: u32, jbus: u32, kbus: u32) -> Self {
        Self {
            windings: [Winding::at(ibus), Winding::at(jbus), Winding::at(kbus)],
            r_12_pu: 0.0,
            x_12_pu: 0.0,
            r_23_pu: 0.0,
            x_23_pu: 0.0,
            r_13_pu: 0.0,
            x_13_pu: 0.0,
            mag_g_pu: 0.0,
            mag_b_pu: 0.0,
        }
    }

    pub fn is_three_winding(&self) -> bool {
        self.windings[2].bus != 0
    }

    /// Windings that are actually connected.
    pub fn used_windings(&self) -> &[Winding] {
        if self.is_three_winding() {
            &self.windings
        } else {
            &self.windings[..2]
        }
    }

    pub fn winding_at_bus_mut(&mut self, bus: u32) -> Option<&mut Winding> {
        if bus == 0 {
            return None;
        }
        self.windings.iter_mut().find(|w| w.bus == bus)
    }
}

impl DeviceData for TransformerDevice {
    fn in_service(&self) -> bool {
        self.used_windings().iter().all(|w| w.breaker)
    }
    fn set_in_service(&mut self, on: bool) {
        let n = self.used_windings().len();
        for w in &mut self.windings[..n] {
            w.breaker = on;
        }
    }
}

impl Sided for TransformerDevice {
    type Part = Winding;

    fn part(&self, side: Side) -> Option<&Winding> {
        match side {
            Side::Primary => Some(&self.windings[0]),
            Side::Secondary => Some(&self.windings[1]),
            Side::Tertiary if self.is_three_winding() => Some(&self.windings[2]),
            _ => None,
        }
    }

    fn part_mut(&mut self, side: Side) -> Option<&mut Winding> {
        let three = self.is_three_winding();
        match side {
            Side::Primary => Some(&mut self.windings[0]),
            Side::Secondary => Some(&mut self.windings[1]),
            Side::Tertiary if three => Some(&mut self.windings[2]),
            _ => None,
        }
    }
}

impl ParamTable for Winding {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<Winding>] = &[
            field!(Winding, ro int "BUS" => bus),
            field!(Winding, bool "BREAKER", ["STATUS"] => breaker),
            field!(Winding, float "TAP_PU", ["TAP"] => tap_pu),
            field!(Winding, float "NOMINAL_VOLTAGE_KV", ["VNOM_KV"] => nominal_kv),
            field!(Winding, float "RATE_MVA" => rate_mva),
        ];
        FIELDS
    }
}

impl ParamTable for TransformerDevice {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<TransformerDevice>] = &[
            Field {
                name: "STATUS",
                aliases: &["IN_SERVICE"],
                kind: ParamType::Boolean,
                get: |d: &TransformerDevice| ParamValue::Boolean(d.in_service()),
                set: Some(|d: &mut TransformerDevice, v: ParamValue| {
                    d.set_in_service(v.as_bool());
                    Ok(())
                }),
            },
            Field {
                name: "IS_THREE_WINDING",
                aliases: &[],
                kind: ParamType::Boolean,
                get: |d: &TransformerDevice| ParamValue::Boolean(d.is_three_winding()),
                set: None,
            },
            field!(TransformerDevice, float "R_12_PU" => r_12_pu),
            field!(TransformerDevice, float "X_12_PU" => x_12_pu),
            field!(TransformerDevice, float "R_23_PU" => r_23_pu),
            field!(TransformerDevice, float "X_23_PU" => x_23_pu),
            field!(TransformerDevice, float "R_13_PU" => r_13_pu),
            field!(TransformerDevice, float "X_13_PU" => x_13_pu),
            field!(TransformerDevice, float "MAGNETIZING_G_PU", ["GM_PU"] => mag_g_pu),
            field!(TransformerDevice, float "MAGNETIZING_B_PU", ["BM_PU"] => mag_b_pu),
        ];
        FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_winding_ignores_tertiary() {
        let mut t = TransformerDevice::new(1, 2, 0);
        assert!(!t.is_three_winding());
        assert!(t.in_service());
        assert!(t.part(Side::Tertiary).is_none());
        t.set_in_service(false);
        assert!(!t.windings[0].breaker && !t.windings[1].breaker);
        assert!(!t.windings[2].breaker);
        assert!(t.winding_at_bus_mut(0).is_none());
    }

    #[test]
    fn one_open_winding_takes_it_out() {
        let mut t = TransformerDevice::new(1, 2, 3);
        t.winding_at_bus_mut(3).unwrap().breaker = false;
        assert!(!t.in_service());
        t.set_in_service(true);
        assert!(t.in_service());
    }
}
