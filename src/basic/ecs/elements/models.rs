use bevy_ecs::prelude::*;
use derive_more::derive::{Deref, DerefMut};
use indexmap::IndexMap;

/// One dynamic model attached to a device, with its numeric parameters.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelRecord {
    pub name: String,
    pub params: IndexMap<String, f64>,
}

/// Dynamic models of a device keyed by model type ("SYNC GENERATOR",
/// "EXCITER", "TURBINE GOVERNOR", ...).
#[derive(Component, Debug, Clone, Default, Deref, DerefMut, serde::Serialize, serde::Deserialize)]
pub struct DynamicModels(pub IndexMap<String, ModelRecord>);

impl DynamicModels {
    pub fn parameter(&self, model_type: &str, par: &str) -> Option<f64> {
        self.get(model_type)?.params.get(par).copied()
    }

    /// Looks `par` up in every attached model, in attachment order.
    pub fn any_parameter(&self, par: &str) -> Option<f64> {
        self.values().find_map(|m| m.params.get(par).copied())
    }

    pub fn parameter_count(&self) -> usize {
        self.values().map(|m| m.params.len()).sum()
    }
}
