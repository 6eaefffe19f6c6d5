//! Simulation clock.
use bevy_ecs::prelude::*;
use derive_more::derive::{From, Into};
use serde::{Deserialize, Serialize};

use crate::basic::ecs::fields::{Field, ParamTable};
use crate::toolkit::error::AccessError;
use crate::toolkit::param::{ParamType, ParamValue};

/// Integration step in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, From, Into, Resource, Serialize, Deserialize)]
pub struct DeltaTime(pub f64);

impl DeltaTime {
    pub fn valid(dt: f64) -> bool {
        dt.is_finite() && dt > 0.0
    }
}

/// Simulation time in seconds since `start`.
#[derive(Debug, Clone, Copy, PartialEq, Default, From, Into, Resource, Serialize, Deserialize)]
pub struct Time(pub f64);

pub fn advance(mut t: ResMut<Time>, dt: Res<DeltaTime>) {
    t.0 += dt.0;
}

impl ParamTable for DeltaTime {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<DeltaTime>] = &[Field {
            name: "TIME_STEP_IN_S",
            aliases: &["DELT"],
            kind: ParamType::Float,
            get: |d: &DeltaTime| ParamValue::Float(d.0),
            set: Some(|d: &mut DeltaTime, v: ParamValue| {
                let dt = v.as_f64();
                if !DeltaTime::valid(dt) {
                    return Err(AccessError::NotPositive {
                        name: "TIME_STEP_IN_S".to_string(),
                        value: dt,
                    });
                }
                d.0 = dt;
                Ok(())
            }),
        }];
        FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_field_rejects_non_positive_values() {
        let mut dt = DeltaTime(0.01);
        let set = DeltaTime::fields()[0].set.unwrap();
        for bad in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(set(&mut dt, ParamValue::Float(bad)), Err(AccessError::NotPositive { .. })));
            assert_eq!(dt.0, 0.01);
        }
        assert_eq!(set(&mut dt, ParamValue::Float(0.005)), Ok(()));
        assert_eq!(dt.0, 0.005);
    }
}
