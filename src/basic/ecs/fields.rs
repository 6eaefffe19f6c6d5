//! Name → typed accessor tables.
//!
//! Each component that carries user visible parameters implements
//! [`ParamTable`], listing its fields once with their declared type. The
//! generic [`read`]/[`write`] helpers do the name lookup and the type check,
//! so the dispatch logic exists in one place for every device class.
use bevy_ecs::{component::Mutable, prelude::*};

use crate::toolkit::error::{AccessError, AccessResult};
use crate::toolkit::param::{ParamType, ParamValue, Side};

pub type Getter<T> = fn(&T) -> ParamValue;
/// Rejects values the member cannot hold without touching it.
pub type Setter<T> = fn(&mut T, ParamValue) -> AccessResult<()>;

/// One named parameter of `T`. A field without a setter is read-only.
pub struct Field<T: 'static> {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: ParamType,
    pub get: Getter<T>,
    pub set: Option<Setter<T>>,
}

impl<T: 'static> Field<T> {
    fn matches(&self, wanted: &str) -> bool {
        same_name(self.name, wanted) || self.aliases.iter().any(|a| same_name(a, wanted))
    }
}

/// Compares a table name (upper case, `_` separated) against a normalized
/// caller name (upper case, space separated).
fn same_name(table: &str, wanted: &str) -> bool {
    table.len() == wanted.len()
        && table
            .bytes()
            .zip(wanted.bytes())
            .all(|(a, b)| if a == b'_' { b == b' ' } else { a == b })
}

pub trait ParamTable: Sized + 'static {
    fn fields() -> &'static [Field<Self>];

    fn field(wanted: &str) -> Option<&'static Field<Self>> {
        Self::fields().iter().find(|f| f.matches(wanted))
    }
}

/// `None` when `wanted` is not in the table of `T`.
pub fn read<T: ParamTable>(data: &T, wanted: &str, ty: ParamType) -> Option<AccessResult<ParamValue>> {
    let field = T::field(wanted)?;
    if field.kind != ty {
        return Some(Err(AccessError::TypeMismatch {
            name: field.name.to_string(),
            declared: field.kind,
            requested: ty,
        }));
    }
    Some(Ok((field.get)(data)))
}

pub fn write<T: ParamTable>(
    data: &mut T,
    wanted: &str,
    ty: ParamType,
    value: &ParamValue,
) -> Option<AccessResult<()>> {
    let field = T::field(wanted)?;
    let Some(set) = field.set else {
        return Some(Err(AccessError::ReadOnly(field.name.to_string())));
    };
    match value.coerce(field.kind) {
        Some(v) if field.kind == ty => Some(set(data, v)),
        _ => Some(Err(AccessError::TypeMismatch {
            name: field.name.to_string(),
            declared: field.kind,
            requested: ty,
        })),
    }
}

/// Narrows an INTEGER value into the integer type of a member.
pub fn narrow<N: TryFrom<i64>>(name: &str, value: &ParamValue) -> AccessResult<N> {
    let raw = value.as_i64();
    N::try_from(raw).map_err(|_| AccessError::OutOfRange {
        name: name.to_string(),
        value: raw,
    })
}

/// Declared type of `wanted` in the table of `T`.
pub fn kind_of<T: ParamTable>(wanted: &str) -> Option<ParamType> {
    T::field(wanted).map(|f| f.kind)
}

/// Type-erased table of one component kind, stored in per-class lists.
#[derive(Clone, Copy)]
pub struct TableOps {
    pub kind: fn(&str) -> Option<ParamType>,
    pub read: fn(&World, Entity, &str, ParamType) -> Option<AccessResult<ParamValue>>,
    pub write: fn(&mut World, Entity, &str, ParamType, &ParamValue) -> Option<AccessResult<()>>,
}

impl TableOps {
    pub const fn of<T>() -> Self
    where
        T: ParamTable + Component<Mutability = Mutable>,
    {
        TableOps {
            kind: kind_of::<T>,
            read: read_component::<T>,
            write: write_component::<T>,
        }
    }
}

/// Type-erased table of one resource kind.
#[derive(Clone, Copy)]
pub struct ResourceOps {
    pub read: fn(&World, &str, ParamType) -> Option<AccessResult<ParamValue>>,
    pub write: fn(&mut World, &str, ParamType, &ParamValue) -> Option<AccessResult<()>>,
}

impl ResourceOps {
    pub const fn of<T: ParamTable + Resource>() -> Self {
        ResourceOps {
            read: read_resource::<T>,
            write: write_resource::<T>,
        }
    }
}

fn read_component<T: ParamTable + Component>(
    world: &World,
    entity: Entity,
    wanted: &str,
    ty: ParamType,
) -> Option<AccessResult<ParamValue>> {
    read(world.get::<T>(entity)?, wanted, ty)
}

fn write_component<T>(
    world: &mut World,
    entity: Entity,
    wanted: &str,
    ty: ParamType,
    value: &ParamValue,
) -> Option<AccessResult<()>>
where
    T: ParamTable + Component<Mutability = Mutable>,
{
    // look the name up first so unrelated tables never trigger change detection
    T::field(wanted)?;
    let mut data = world.get_mut::<T>(entity)?;
    write(&mut *data, wanted, ty, value)
}

pub fn read_resource<T: ParamTable + Resource>(
    world: &World,
    wanted: &str,
    ty: ParamType,
) -> Option<AccessResult<ParamValue>> {
    read(world.get_resource::<T>()?, wanted, ty)
}

pub fn write_resource<T: ParamTable + Resource>(
    world: &mut World,
    wanted: &str,
    ty: ParamType,
    value: &ParamValue,
) -> Option<AccessResult<()>> {
    T::field(wanted)?;
    let mut data = world.get_resource_mut::<T>()?;
    write(&mut *data, wanted, ty, value)
}

/// A component made of independently addressable parts (transformer
/// windings, HVDC converters).
pub trait Sided: Component<Mutability = Mutable> {
    type Part: ParamTable;

    fn part(&self, side: Side) -> Option<&Self::Part>;
    fn part_mut(&mut self, side: Side) -> Option<&mut Self::Part>;
}

/// `Err(InvalidSide)` when the component has no such part.
pub fn read_side<T: Sided>(
    world: &World,
    entity: Entity,
    side: Side,
    wanted: &str,
    ty: ParamType,
) -> Option<AccessResult<ParamValue>> {
    let data = world.get::<T>(entity)?;
    match data.part(side) {
        Some(part) => read(part, wanted, ty),
        None => Some(Err(invalid_side(side))),
    }
}

pub fn write_side<T: Sided>(
    world: &mut World,
    entity: Entity,
    side: Side,
    wanted: &str,
    ty: ParamType,
    value: &ParamValue,
) -> Option<AccessResult<()>> {
    let mut data = world.get_mut::<T>(entity)?;
    match data.part_mut(side) {
        Some(part) => write(part, wanted, ty, value),
        None => Some(Err(invalid_side(side))),
    }
}

fn invalid_side(side: Side) -> AccessError {
    AccessError::InvalidSide {
        owner: "this device".to_string(),
        side: format!("{side:?}"),
    }
}

/// Builds a [`Field`] over a plain struct member.
///
/// ```ignore
/// field!(SourceDevice, float "PGEN_MW" => pgen_mw)
/// field!(SourceDevice, float "MBASE_MVA", ["MBASE"] => mbase_mva)
/// field!(BusID, ro int "NUMBER" => 0)
/// ```
#[macro_export]
macro_rules! field {
    ($ty:ty, float $name:literal $(, [$($alias:literal),*])? => $member:tt) => {
        $crate::basic::ecs::fields::Field::<$ty> {
            name: $name,
            aliases: &[$($($alias),*)?],
            kind: $crate::toolkit::param::ParamType::Float,
            get: |d: &$ty| $crate::toolkit::param::ParamValue::Float(d.$member),
            set: Some(|d: &mut $ty, v: $crate::toolkit::param::ParamValue| {
                d.$member = v.as_f64();
                Ok(())
            }),
        }
    };
    ($ty:ty, int $name:literal $(, [$($alias:literal),*])? => $member:tt) => {
        $crate::basic::ecs::fields::Field::<$ty> {
            name: $name,
            aliases: &[$($($alias),*)?],
            kind: $crate::toolkit::param::ParamType::Integer,
            get: |d: &$ty| $crate::toolkit::param::ParamValue::Integer(d.$member as i64),
            set: Some(|d: &mut $ty, v: $crate::toolkit::param::ParamValue| {
                d.$member = $crate::basic::ecs::fields::narrow($name, &v)?;
                Ok(())
            }),
        }
    };
    ($ty:ty, bool $name:literal $(, [$($alias:literal),*])? => $member:tt) => {
        $crate::basic::ecs::fields::Field::<$ty> {
            name: $name,
            aliases: &[$($($alias),*)?],
            kind: $crate::toolkit::param::ParamType::Boolean,
            get: |d: &$ty| $crate::toolkit::param::ParamValue::Boolean(d.$member),
            set: Some(|d: &mut $ty, v: $crate::toolkit::param::ParamValue| {
                d.$member = v.as_bool();
                Ok(())
            }),
        }
    };
    ($ty:ty, string $name:literal $(, [$($alias:literal),*])? => $member:tt) => {
        $crate::basic::ecs::fields::Field::<$ty> {
            name: $name,
            aliases: &[$($($alias),*)?],
            kind: $crate::toolkit::param::ParamType::String,
            get: |d: &$ty| $crate::toolkit::param::ParamValue::String(d.$member.clone()),
            set: Some(|d: &mut $ty, v: $crate::toolkit::param::ParamValue| {
                d.$member = v.as_str().to_string();
                Ok(())
            }),
        }
    };
    ($ty:ty, ro int $name:literal => $member:tt) => {
        $crate::basic::ecs::fields::Field::<$ty> {
            name: $name,
            aliases: &[],
            kind: $crate::toolkit::param::ParamType::Integer,
            get: |d: &$ty| $crate::toolkit::param::ParamValue::Integer(d.$member as i64),
            set: None,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gauge {
        level: f64,
        count: u32,
        on: bool,
        fixed: u32,
    }

    impl ParamTable for Gauge {
        fn fields() -> &'static [Field<Self>] {
            static FIELDS: &[Field<Gauge>] = &[
                crate::field!(Gauge, float "LEVEL_PU", ["LVL"] => level),
                crate::field!(Gauge, int "COUNT" => count),
                crate::field!(Gauge, bool "ON" => on),
                crate::field!(Gauge, ro int "FIXED" => fixed),
            ];
            FIELDS
        }
    }

    fn gauge() -> Gauge {
        Gauge {
            level: 1.0,
            count: 2,
            on: false,
            fixed: 7,
        }
    }

    #[test]
    fn names_fold_underscores_and_aliases() {
        let p = gauge();
        assert_eq!(read(&p, "LEVEL PU", ParamType::Float), Some(Ok(ParamValue::Float(1.0))));
        assert_eq!(read(&p, "LVL", ParamType::Float), Some(Ok(ParamValue::Float(1.0))));
        assert!(read(&p, "LEVEL", ParamType::Float).is_none());
    }

    #[test]
    fn write_checks_type_and_access() {
        let mut p = gauge();
        assert_eq!(write(&mut p, "COUNT", ParamType::Integer, &ParamValue::Integer(5)), Some(Ok(())));
        assert_eq!(p.count, 5);
        assert!(matches!(
            write(&mut p, "COUNT", ParamType::Float, &ParamValue::Float(5.0)),
            Some(Err(AccessError::TypeMismatch { .. }))
        ));
        assert!(matches!(
            write(&mut p, "FIXED", ParamType::Integer, &ParamValue::Integer(1)),
            Some(Err(AccessError::ReadOnly(_)))
        ));
        assert_eq!(write(&mut p, "ON", ParamType::Boolean, &ParamValue::Boolean(true)), Some(Ok(())));
        assert!(p.on);
        assert_eq!(p.fixed, 7);
    }

    #[test]
    fn integer_writes_never_wrap() {
        let mut p = gauge();
        for bad in [-1, (1i64 << 32) + 1] {
            assert_eq!(
                write(&mut p, "COUNT", ParamType::Integer, &ParamValue::Integer(bad)),
                Some(Err(AccessError::OutOfRange {
                    name: "COUNT".to_string(),
                    value: bad,
                }))
            );
            assert_eq!(p.count, 2);
        }
        assert_eq!(
            write(&mut p, "COUNT", ParamType::Integer, &ParamValue::Integer(u32::MAX as i64)),
            Some(Ok(()))
        );
        assert_eq!(p.count, u32::MAX);
    }
}
