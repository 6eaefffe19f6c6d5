//! Components of the network database.
//!
//! Every bus, device, area, zone and owner is one entity. Devices carry a
//! [`DeviceTag`] with their canonical identifier, an [`EntityName`], an
//! [`Ownership`] record and the data component of their class.
mod bus;
mod equivalent;
mod fault;
mod grouping;
mod hvdc;
mod line;
mod load;
mod models;
mod shunt;
mod source;
mod trans;

use bevy_ecs::{component::Mutable, prelude::*};
use derive_more::derive::{Deref, DerefMut};

pub use bus::*;
pub use equivalent::*;
pub use fault::*;
pub use grouping::*;
pub use hvdc::*;
pub use line::*;
pub use load::*;
pub use models::*;
pub use shunt::*;
pub use source::*;
pub use trans::*;

use super::fields::{Field, ParamTable, narrow};
use crate::field;
use crate::toolkit::id::{DeviceId, Terminal};
use crate::toolkit::param::{ParamType, ParamValue};

/// Canonical identifier of the device stored on this entity.
#[derive(Component, Debug, Clone, PartialEq, Eq, Deref, serde::Serialize, serde::Deserialize)]
pub struct DeviceTag(pub DeviceId);

#[derive(Component, Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut, serde::Serialize, serde::Deserialize)]
pub struct EntityName(pub String);

/// Up to four owners and their shares of the device.
#[derive(Component, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ownership {
    pub owners: [u32; 4],
    pub fractions: [f64; 4],
}

impl Default for Ownership {
    fn default() -> Self {
        Self {
            owners: [0; 4],
            fractions: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Breaker state shared by every device data component.
pub trait DeviceData: Component<Mutability = Mutable> {
    fn in_service(&self) -> bool;
    fn set_in_service(&mut self, on: bool);
}

impl ParamTable for DeviceTag {
    fn fields() -> &'static [Field<Self>] {
        fn slot(tag: &DeviceTag, pos: usize) -> ParamValue {
            let b = match (tag.0.terminal, pos) {
                (Terminal::Single(b), 0) => b,
                (Terminal::Double(i, _), 0) | (Terminal::Triple(i, _, _), 0) => i,
                (Terminal::Double(_, j), 1) | (Terminal::Triple(_, j, _), 1) => j,
                (Terminal::Triple(_, _, k), 2) => k,
                _ => 0,
            };
            ParamValue::Integer(b as i64)
        }
        static FIELDS: &[Field<DeviceTag>] = &[
            Field {
                name: "ID",
                aliases: &["IDENTIFIER", "CIRCUIT"],
                kind: ParamType::String,
                get: |t: &DeviceTag| ParamValue::String(t.0.circuit.clone()),
                set: None,
            },
            Field {
                name: "BUS",
                aliases: &["IBUS", "BUS_SEND", "BUS_PRIMARY"],
                kind: ParamType::Integer,
                get: |t: &DeviceTag| slot(t, 0),
                set: None,
            },
            Field {
                name: "JBUS",
                aliases: &["BUS_RECEIVE", "BUS_SECONDARY"],
                kind: ParamType::Integer,
                get: |t: &DeviceTag| slot(t, 1),
                set: None,
            },
            Field {
                name: "KBUS",
                aliases: &["BUS_TERTIARY"],
                kind: ParamType::Integer,
                get: |t: &DeviceTag| slot(t, 2),
                set: None,
            },
        ];
        FIELDS
    }
}

impl ParamTable for EntityName {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<EntityName>] = &[field!(EntityName, string "NAME" => 0)];
        FIELDS
    }
}

impl ParamTable for Ownership {
    fn fields() -> &'static [Field<Self>] {
        macro_rules! share {
            ($owner:literal, $frac:literal, $i:literal) => {
                [
                    Field {
                        name: $owner,
                        aliases: &[],
                        kind: ParamType::Integer,
                        get: |o: &Ownership| ParamValue::Integer(o.owners[$i] as i64),
                        set: Some(|o: &mut Ownership, v: ParamValue| {
                            o.owners[$i] = narrow($owner, &v)?;
                            Ok(())
                        }),
                    },
                    Field {
                        name: $frac,
                        aliases: &[],
                        kind: ParamType::Float,
                        get: |o: &Ownership| ParamValue::Float(o.fractions[$i]),
                        set: Some(|o: &mut Ownership, v: ParamValue| {
                            o.fractions[$i] = v.as_f64();
                            Ok(())
                        }),
                    },
                ]
            };
        }
        static FIELDS: [[Field<Ownership>; 2]; 4] = [
            share!("OWNER1", "FRAC1", 0),
            share!("OWNER2", "FRAC2", 1),
            share!("OWNER3", "FRAC3", 2),
            share!("OWNER4", "FRAC4", 3),
        ];
        FIELDS.as_flattened()
    }
}
