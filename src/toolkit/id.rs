//! Device identifiers.
//!
//! Callers name devices with small tuples whose shape depends on the device
//! class:
//!
//! * single-bus `(bus, circuit)` for generators, wind-turbine generators, PV
//!   units, loads, fixed shunts, equivalent devices and energy storages,
//! * double-bus `(ibus, jbus, circuit)` for lines and HVDC links,
//! * triple-bus `(ibus, jbus, kbus, circuit)` for transformers, where the
//!   three-element form `(ibus, jbus, circuit)` stands for a two-winding
//!   transformer with `kbus = 0`.
//!
//! The circuit id is always the last element. [`DeviceId::decode`] turns a
//! tuple into the canonical identifier and [`DeviceId::encode`] turns it back
//! into the class's default tuple shape.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{IdError, ToolkitError};

pub type BusNumber = u32;

/// The device families held in a toolkit database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceClass {
    Generator,
    WtGenerator,
    PvUnit,
    Load,
    FixedShunt,
    Line,
    Transformer,
    Hvdc,
    EquivalentDevice,
    EnergyStorage,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 10] = [
        DeviceClass::Generator,
        DeviceClass::WtGenerator,
        DeviceClass::PvUnit,
        DeviceClass::Load,
        DeviceClass::FixedShunt,
        DeviceClass::Line,
        DeviceClass::Transformer,
        DeviceClass::Hvdc,
        DeviceClass::EquivalentDevice,
        DeviceClass::EnergyStorage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeviceClass::Generator => "GENERATOR",
            DeviceClass::WtGenerator => "WT GENERATOR",
            DeviceClass::PvUnit => "PV UNIT",
            DeviceClass::Load => "LOAD",
            DeviceClass::FixedShunt => "FIXED SHUNT",
            DeviceClass::Line => "LINE",
            DeviceClass::Transformer => "TRANSFORMER",
            DeviceClass::Hvdc => "HVDC",
            DeviceClass::EquivalentDevice => "EQUIVALENT DEVICE",
            DeviceClass::EnergyStorage => "ENERGY STORAGE",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            DeviceClass::Line | DeviceClass::Hvdc => Arity::Double,
            DeviceClass::Transformer => Arity::Triple,
            _ => Arity::Single,
        }
    }

    /// Generators, wind-turbine generators, PV units and energy storages
    /// share one data shape.
    pub fn is_source(self) -> bool {
        matches!(
            self,
            DeviceClass::Generator
                | DeviceClass::WtGenerator
                | DeviceClass::PvUnit
                | DeviceClass::EnergyStorage
        )
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceClass {
    type Err = ToolkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_name(s);
        let alias = match wanted.as_str() {
            "GEN" => Some(DeviceClass::Generator),
            "WTG" | "WT GEN" => Some(DeviceClass::WtGenerator),
            "PV" => Some(DeviceClass::PvUnit),
            "SHUNT" => Some(DeviceClass::FixedShunt),
            "TRANS" => Some(DeviceClass::Transformer),
            "ES" => Some(DeviceClass::EnergyStorage),
            _ => None,
        };
        alias
            .or_else(|| DeviceClass::ALL.into_iter().find(|c| c.name() == wanted))
            .ok_or_else(|| ToolkitError::UnknownClass(s.to_string()))
    }
}

/// Upper-cases a caller supplied name and folds `_` into spaces.
pub(crate) fn normalize_name(s: &str) -> String {
    s.trim().to_uppercase().replace('_', " ")
}

/// Accepted tuple lengths of an identifier shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    Double,
    Triple,
}

impl Arity {
    pub fn accepts(self, len: usize) -> bool {
        match self {
            Arity::Single => len == 2,
            Arity::Double => len == 3,
            Arity::Triple => len == 3 || len == 4,
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Arity::Single => "2",
            Arity::Double => "3",
            Arity::Triple => "3 or 4",
        }
    }
}

/// One element of an identifier tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdField {
    Bus(i64),
    Circuit(String),
}

impl From<i64> for IdField {
    fn from(v: i64) -> Self {
        IdField::Bus(v)
    }
}
impl From<i32> for IdField {
    fn from(v: i32) -> Self {
        IdField::Bus(v as i64)
    }
}
impl From<u32> for IdField {
    fn from(v: u32) -> Self {
        IdField::Bus(v as i64)
    }
}
impl From<&str> for IdField {
    fn from(v: &str) -> Self {
        IdField::Circuit(v.to_string())
    }
}
impl From<String> for IdField {
    fn from(v: String) -> Self {
        IdField::Circuit(v)
    }
}

/// Anything that can be flattened into an identifier tuple.
pub trait IdTuple {
    fn to_fields(&self) -> Vec<IdField>;
}

impl<B: Into<i64> + Copy, C: AsRef<str>> IdTuple for (B, C) {
    fn to_fields(&self) -> Vec<IdField> {
        vec![IdField::Bus(self.0.into()), self.1.as_ref().into()]
    }
}
impl<B: Into<i64> + Copy, C: AsRef<str>> IdTuple for (B, B, C) {
    fn to_fields(&self) -> Vec<IdField> {
        vec![
            IdField::Bus(self.0.into()),
            IdField::Bus(self.1.into()),
            self.2.as_ref().into(),
        ]
    }
}
impl<B: Into<i64> + Copy, C: AsRef<str>> IdTuple for (B, B, B, C) {
    fn to_fields(&self) -> Vec<IdField> {
        vec![
            IdField::Bus(self.0.into()),
            IdField::Bus(self.1.into()),
            IdField::Bus(self.2.into()),
            self.3.as_ref().into(),
        ]
    }
}
impl IdTuple for [IdField] {
    fn to_fields(&self) -> Vec<IdField> {
        self.to_vec()
    }
}
impl IdTuple for Vec<IdField> {
    fn to_fields(&self) -> Vec<IdField> {
        self.clone()
    }
}
impl IdTuple for DeviceId {
    fn to_fields(&self) -> Vec<IdField> {
        self.encode()
    }
}
impl<T: IdTuple + ?Sized> IdTuple for &T {
    fn to_fields(&self) -> Vec<IdField> {
        (**self).to_fields()
    }
}

/// Terminal buses of a device in the order they were given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terminal {
    Single(BusNumber),
    Double(BusNumber, BusNumber),
    /// `kbus == 0` marks a two-winding transformer.
    Triple(BusNumber, BusNumber, BusNumber),
}

impl Terminal {
    /// Connected buses, skipping the unused third winding.
    pub fn buses(&self) -> Vec<BusNumber> {
        match *self {
            Terminal::Single(b) => vec![b],
            Terminal::Double(i, j) => vec![i, j],
            Terminal::Triple(i, j, 0) => vec![i, j],
            Terminal::Triple(i, j, k) => vec![i, j, k],
        }
    }

    fn slots(&self) -> [BusNumber; 3] {
        match *self {
            Terminal::Single(b) => [b, 0, 0],
            Terminal::Double(i, j) => [i, j, 0],
            Terminal::Triple(i, j, k) => [i, j, k],
        }
    }
}

/// Canonical identifier of one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub class: DeviceClass,
    pub terminal: Terminal,
    pub circuit: String,
}

/// Lookup key: terminal buses compared as a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceKey {
    class: DeviceClass,
    buses: [BusNumber; 3],
    circuit: String,
}

impl DeviceId {
    /// Decodes `tuple` for `class`, validating its arity and bus numbers.
    pub fn decode(class: DeviceClass, tuple: &(impl IdTuple + ?Sized)) -> Result<Self, IdError> {
        let fields = tuple.to_fields();
        let arity = class.arity();
        if !arity.accepts(fields.len()) {
            return Err(IdError::WrongArity {
                class,
                expected: arity.expected(),
                got: fields.len(),
            });
        }
        let (circuit, buses) = match fields.split_last() {
            Some((IdField::Circuit(c), buses)) => (c.trim().to_string(), buses),
            _ => return Err(IdError::MissingCircuit),
        };
        let mut numbers = Vec::with_capacity(buses.len());
        for (pos, field) in buses.iter().enumerate() {
            let IdField::Bus(v) = field else {
                return Err(IdError::ExpectedBus(pos));
            };
            // the third winding bus of a transformer may be 0
            let may_be_zero = class == DeviceClass::Transformer && pos == 2;
            match u32::try_from(*v) {
                Ok(0) if may_be_zero => numbers.push(0),
                Ok(b) if b > 0 => numbers.push(b),
                _ => return Err(IdError::InvalidBus(*v)),
            }
        }
        let terminal = match (arity, numbers.as_slice()) {
            (Arity::Single, &[b]) => Terminal::Single(b),
            (Arity::Double, &[i, j]) => Terminal::Double(i, j),
            (Arity::Triple, &[i, j]) => Terminal::Triple(i, j, 0),
            (Arity::Triple, &[i, j, k]) => Terminal::Triple(i, j, k),
            _ => {
                return Err(IdError::WrongArity {
                    class,
                    expected: arity.expected(),
                    got: fields.len(),
                });
            }
        };
        Ok(DeviceId {
            class,
            terminal,
            circuit,
        })
    }

    /// Re-encodes into the default tuple shape of the class. Two-winding
    /// transformers come back as three elements.
    pub fn encode(&self) -> Vec<IdField> {
        let mut fields: Vec<IdField> = self
            .terminal
            .buses()
            .into_iter()
            .map(IdField::from)
            .collect();
        fields.push(IdField::Circuit(self.circuit.clone()));
        fields
    }

    pub fn buses(&self) -> Vec<BusNumber> {
        self.terminal.buses()
    }

    pub fn touches(&self, bus: BusNumber) -> bool {
        bus != 0 && self.terminal.buses().contains(&bus)
    }

    pub fn key(&self) -> DeviceKey {
        let mut buses = self.terminal.slots();
        buses.sort_unstable();
        DeviceKey {
            class: self.class,
            buses,
            circuit: self.circuit.clone(),
        }
    }

    /// The same identifier with every reference to `old` replaced by `new`.
    pub fn renumbered(&self, old: BusNumber, new: BusNumber) -> Self {
        let swap = |b: BusNumber| if b == old { new } else { b };
        let terminal = match self.terminal {
            Terminal::Single(b) => Terminal::Single(swap(b)),
            Terminal::Double(i, j) => Terminal::Double(swap(i), swap(j)),
            Terminal::Triple(i, j, k) => Terminal::Triple(swap(i), swap(j), swap(k)),
        };
        DeviceId {
            terminal,
            ..self.clone()
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.class)?;
        for b in self.terminal.buses() {
            write!(f, "{b}, ")?;
        }
        write!(f, "\"{}\")", self.circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_then_encode_is_identity() {
        let cases: Vec<(DeviceClass, Vec<IdField>)> = vec![
            (DeviceClass::Generator, (1, "G1").to_fields()),
            (DeviceClass::Load, (7, "L").to_fields()),
            (DeviceClass::Line, (1, 2, "1").to_fields()),
            (DeviceClass::Hvdc, (3, 4, "DC").to_fields()),
            (DeviceClass::Transformer, (1, 2, "T1").to_fields()),
            (DeviceClass::Transformer, (1, 2, 3, "T3").to_fields()),
        ];
        for (class, tuple) in cases {
            let id = DeviceId::decode(class, &tuple).unwrap();
            assert_eq!(id.encode(), tuple, "{class}");
            assert_eq!(DeviceId::decode(class, &id.encode()).unwrap(), id);
        }
    }

    #[test]
    fn short_transformer_tuple_synthesizes_kbus() {
        let two = DeviceId::decode(DeviceClass::Transformer, &(1, 2, "T1")).unwrap();
        let four = DeviceId::decode(DeviceClass::Transformer, &(1, 2, 0, "T1")).unwrap();
        assert_eq!(two, four);
        assert_eq!(two.terminal, Terminal::Triple(1, 2, 0));
        assert_eq!(four.encode().len(), 3);
    }

    #[test]
    fn rejects_bad_tuples() {
        assert!(matches!(
            DeviceId::decode(DeviceClass::Line, &(1, "1")),
            Err(IdError::WrongArity { got: 2, .. })
        ));
        assert!(matches!(
            DeviceId::decode(DeviceClass::Generator, &(0, "1")),
            Err(IdError::InvalidBus(0))
        ));
        assert!(matches!(
            DeviceId::decode(DeviceClass::Line, &(1, -2, "1")),
            Err(IdError::InvalidBus(-2))
        ));
        let circuit_first = vec![IdField::from("1"), IdField::from(1), IdField::from(2)];
        assert_eq!(
            DeviceId::decode(DeviceClass::Line, &circuit_first),
            Err(IdError::MissingCircuit)
        );
    }

    #[test]
    fn parallel_keys_ignore_terminal_order() {
        let a = DeviceId::decode(DeviceClass::Line, &(1, 2, "1")).unwrap();
        let b = DeviceId::decode(DeviceClass::Line, &(2, 1, "1")).unwrap();
        let c = DeviceId::decode(DeviceClass::Line, &(1, 2, "2")).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn class_names_parse_loosely() {
        assert_eq!("wt_generator".parse::<DeviceClass>().unwrap(), DeviceClass::WtGenerator);
        assert_eq!("Fixed Shunt".parse::<DeviceClass>().unwrap(), DeviceClass::FixedShunt);
        assert_eq!("HVDC".parse::<DeviceClass>().unwrap(), DeviceClass::Hvdc);
        assert!("BUS".parse::<DeviceClass>().is_err());
    }
}
