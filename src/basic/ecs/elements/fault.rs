use std::fmt;
use std::str::FromStr;

use bevy_ecs::prelude::*;
use derive_more::derive::{Deref, DerefMut};
use indexmap::IndexMap;
use nalgebra::Complex;
use ordered_float::OrderedFloat;

use crate::toolkit::id::normalize_name;

/// Locations closer than this are the same point on a line.
pub const LOCATION_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FaultType {
    ThreePhases,
    SinglePhaseGrounded,
    DoublePhases,
    DoublePhasesGrounded,
}

impl FaultType {
    pub fn name(self) -> &'static str {
        match self {
            FaultType::ThreePhases => "THREE PHASES FAULT",
            FaultType::SinglePhaseGrounded => "SINGLE PHASE GROUNDED FAULT",
            FaultType::DoublePhases => "DOUBLE PHASES FAULT",
            FaultType::DoublePhasesGrounded => "DOUBLE PHASES GROUNDED FAULT",
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FaultType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "THREE PHASES FAULT" | "3PH" | "3P" => Ok(FaultType::ThreePhases),
            "SINGLE PHASE GROUNDED FAULT" | "SLG" | "1PG" => Ok(FaultType::SinglePhaseGrounded),
            "DOUBLE PHASES FAULT" | "LL" | "2P" => Ok(FaultType::DoublePhases),
            "DOUBLE PHASES GROUNDED FAULT" | "LLG" | "2PG" => Ok(FaultType::DoublePhasesGrounded),
            _ => Err(format!("unknown fault type '{s}'")),
        }
    }
}

/// Fault admittances at a bus, at most one per fault type.
#[derive(Component, Debug, Clone, Default, Deref, DerefMut)]
pub struct BusFaults(pub IndexMap<FaultType, Complex<f64>>);

/// One fault along a line. `location` runs from 0 at the sending end to 1
/// at the receiving end.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineFault {
    pub fault_type: FaultType,
    pub location: f64,
    pub y: Complex<f64>,
}

#[derive(Component, Debug, Clone, Default, Deref, DerefMut)]
pub struct LineFaults(pub Vec<LineFault>);

impl LineFaults {
    /// Installs a fault, replacing one of the same type at the same place.
    /// Faults are kept ordered from the sending end.
    pub fn set(&mut self, fault: LineFault) {
        match self.position(fault.fault_type, fault.location) {
            Some(i) => self.0[i] = fault,
            None => {
                let at = self
                    .0
                    .partition_point(|f| OrderedFloat(f.location) <= OrderedFloat(fault.location));
                self.0.insert(at, fault);
            }
        }
    }

    pub fn remove(&mut self, fault_type: FaultType, location: f64) -> bool {
        match self.position(fault_type, location) {
            Some(i) => {
                self.0.remove(i);
                true
            }
            None => false,
        }
    }

    fn position(&self, fault_type: FaultType, location: f64) -> Option<usize> {
        self.0
            .iter()
            .position(|f| f.fault_type == fault_type && (f.location - location).abs() < LOCATION_EPS)
    }
}
