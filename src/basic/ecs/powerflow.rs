use bevy_ecs::prelude::*;

use super::fields::{Field, ParamTable};
use crate::field;

/// Resource that holds the power flow solver options. The solver itself is
/// an external collaborator; these values are stored for it and reported
/// back through the typed accessor.
#[derive(Debug, Resource, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PowerFlowConfig {
    pub max_it: i64,              // Maximum number of iterations
    pub p_tol_mw: f64,            // Allowed active power mismatch (MW)
    pub q_tol_mvar: f64,          // Allowed reactive power mismatch (MVAr)
    pub accelerator: f64,         // Iteration accelerator
    pub max_dv_pu: f64,           // Largest voltage update per iteration
    pub flat_start: bool,
    pub tap_adjustment: bool,
    pub non_divergent: bool,
    pub var_limit_check: bool,
    pub export_jacobian: bool,
}

impl Default for PowerFlowConfig {
    fn default() -> Self {
        Self {
            max_it: 30,
            p_tol_mw: 0.001,
            q_tol_mvar: 0.001,
            accelerator: 1.0,
            max_dv_pu: 0.2,
            flat_start: false,
            tap_adjustment: true,
            non_divergent: false,
            var_limit_check: true,
            export_jacobian: false,
        }
    }
}

impl ParamTable for PowerFlowConfig {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<PowerFlowConfig>] = &[
            field!(PowerFlowConfig, int "MAX_ITERATION" => max_it),
            field!(PowerFlowConfig, float "ALLOWED_MAX_ACTIVE_POWER_IMBALANCE_IN_MW" => p_tol_mw),
            field!(PowerFlowConfig, float "ALLOWED_MAX_REACTIVE_POWER_IMBALANCE_IN_MVAR" => q_tol_mvar),
            field!(PowerFlowConfig, float "ITERATION_ACCELERATOR" => accelerator),
            field!(PowerFlowConfig, float "MAX_VOLTAGE_CHANGE_IN_PU" => max_dv_pu),
            field!(PowerFlowConfig, bool "FLAT_START_LOGIC" => flat_start),
            field!(PowerFlowConfig, bool "TRANSFORMER_TAP_ADJUSTMENT_LOGIC" => tap_adjustment),
            field!(PowerFlowConfig, bool "NON_DIVERGENT_SOLUTION_LOGIC" => non_divergent),
            field!(PowerFlowConfig, bool "VAR_LIMIT_CHECK_LOGIC" => var_limit_check),
            field!(PowerFlowConfig, bool "EXPORT_JACOBIAN_LOGIC" => export_jacobian),
        ];
        FIELDS
    }
}
