use bevy_ecs::prelude::*;

use crate::basic::ecs::fields::{Field, ParamTable};
use crate::field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum GroupKind {
    Area,
    Zone,
    Owner,
}

impl GroupKind {
    pub const ALL: [GroupKind; 3] = [GroupKind::Area, GroupKind::Zone, GroupKind::Owner];

    pub fn name(self) -> &'static str {
        match self {
            GroupKind::Area => "AREA",
            GroupKind::Zone => "ZONE",
            GroupKind::Owner => "OWNER",
        }
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GroupID {
    pub kind: GroupKind,
    pub number: u32,
}

/// Interchange schedule of an area.
#[derive(Component, Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AreaData {
    pub swing_bus: u32,
    pub pdes_mw: f64,
    pub ptol_mw: f64,
}

impl ParamTable for GroupID {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<GroupID>] = &[field!(GroupID, ro int "NUMBER" => number)];
        FIELDS
    }
}

impl ParamTable for AreaData {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<AreaData>] = &[
            field!(AreaData, int "SWING_BUS", ["AREA_SWING_BUS"] => swing_bus),
            field!(AreaData, float "PDES_MW", ["P_WANTED_MW"] => pdes_mw),
            field!(AreaData, float "PTOL_MW", ["P_TOLERANCE_MW"] => ptol_mw),
        ];
        FIELDS
    }
}
