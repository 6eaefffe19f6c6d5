//! Meters: scalar taps sampled once per simulation step.
//!
//! A meter is registered against a bus or a device with a meter type. The
//! type is either one of the named meters of the holder's class (e.g.
//! "VOLTAGE IN PU" on a bus) or directly the name of any numeric or boolean
//! parameter. "MODEL INTERNAL VARIABLE" reads a named parameter of the
//! device's dynamic models instead.
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use super::sim_time::Time;
use crate::basic::ecs::access::{Holder, locate, read_entity};
use crate::basic::ecs::elements::DynamicModels;
use crate::toolkit::id::{BusNumber, DeviceClass, normalize_name};
use crate::toolkit::param::{EntityRef, ParamType, Side};

pub const MODEL_INTERNAL_VARIABLE: &str = "MODEL INTERNAL VARIABLE";

/// What the caller asks to record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterSpec {
    pub target: EntityRef,
    pub meter_type: String,
    #[serde(default)]
    pub side: Side,
    #[serde(default)]
    pub var: String,
}

impl MeterSpec {
    pub fn new(target: impl Into<EntityRef>, meter_type: &str) -> Self {
        Self {
            target: target.into(),
            meter_type: meter_type.to_string(),
            side: Side::Whole,
            var: String::new(),
        }
    }

    pub fn on_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn variable(mut self, var: &str) -> Self {
        self.var = var.to_string();
        self
    }
}

/// Named meters of each holder kind: meter type → parameter name.
pub fn named_meters(holder: Holder) -> &'static [(&'static str, &'static str)] {
    static BUS: &[(&str, &str)] = &[("VOLTAGE IN PU", "VM PU"), ("ANGLE IN DEG", "VA DEG")];
    static SOURCE: &[(&str, &str)] = &[
        ("ACTIVE POWER IN MW", "PGEN MW"),
        ("REACTIVE POWER IN MVAR", "QGEN MVAR"),
        ("ROTOR ANGLE IN DEG", "ROTOR ANGLE DEG"),
    ];
    static LOAD: &[(&str, &str)] = &[("ACTIVE POWER IN MW", "P MW"), ("REACTIVE POWER IN MVAR", "Q MVAR")];
    static SHUNT: &[(&str, &str)] = &[("REACTIVE POWER IN MVAR", "Q MVAR")];
    static EQUIVALENT: &[(&str, &str)] = &[
        ("ACTIVE POWER GENERATION IN MW", "PGEN MW"),
        ("ACTIVE POWER LOAD IN MW", "PLOAD MW"),
    ];
    static BRANCH: &[(&str, &str)] = &[("STATUS", "STATUS")];
    static HVDC: &[(&str, &str)] = &[("DC POWER IN MW", "PDCN MW"), ("BLOCKED", "BLOCKED")];
    match holder {
        Holder::Bus => BUS,
        Holder::Device(class) if class.is_source() => SOURCE,
        Holder::Device(DeviceClass::Load) => LOAD,
        Holder::Device(DeviceClass::FixedShunt) => SHUNT,
        Holder::Device(DeviceClass::EquivalentDevice) => EQUIVALENT,
        Holder::Device(DeviceClass::Line | DeviceClass::Transformer) => BRANCH,
        Holder::Device(_) => HVDC,
        Holder::Group(_) => &[],
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Reading {
    Field { name: String, ty: ParamType },
    ModelVariable(String),
}

#[derive(Debug, Clone)]
pub struct Meter {
    pub name: String,
    target: EntityRef,
    side: Side,
    reading: Reading,
    pub values: Vec<f64>,
}

impl Meter {
    /// Checks `spec` against the holder and builds the meter. `Err` carries
    /// the reason for the log.
    pub fn build(spec: &MeterSpec, holder: Holder) -> Result<Self, String> {
        let meter_type = normalize_name(&spec.meter_type);
        let reading = if meter_type == MODEL_INTERNAL_VARIABLE {
            let var = normalize_name(&spec.var);
            if var.is_empty() || !matches!(holder, Holder::Device(_)) {
                return Err(format!("{MODEL_INTERNAL_VARIABLE} needs a device and a variable name"));
            }
            Reading::ModelVariable(var)
        } else {
            let field = named_meters(holder)
                .iter()
                .find(|(t, _)| *t == meter_type)
                .map_or(meter_type.as_str(), |(_, f)| *f)
                .to_string();
            match holder.field_type(spec.side, &field) {
                Some(ParamType::String) | None => {
                    return Err(format!("'{meter_type}' cannot be metered on {}", spec.target));
                }
                Some(ty) => Reading::Field { name: field, ty },
            }
        };
        let mut name = format!("{meter_type} @ {}", spec.target);
        if spec.side != Side::Whole {
            name.push_str(&format!(" {:?}", spec.side).to_uppercase());
        }
        if let Reading::ModelVariable(var) = &reading {
            name.push_str(&format!(" : {var}"));
        }
        Ok(Self {
            name,
            target: spec.target.clone(),
            side: spec.side,
            reading,
            values: Vec::new(),
        })
    }

    /// Current value; NaN when the holder no longer exists.
    fn read(&self, world: &World) -> f64 {
        let Some((entity, holder)) = locate(world, &self.target) else {
            return f64::NAN;
        };
        match &self.reading {
            Reading::Field { name, ty } => match read_entity(world, entity, holder, self.side, name, *ty) {
                Some(Ok(v)) => v.to_scalar(),
                _ => f64::NAN,
            },
            Reading::ModelVariable(var) => world
                .get::<DynamicModels>(entity)
                .and_then(|m| m.any_parameter(var))
                .unwrap_or(f64::NAN),
        }
    }
}

/// Registered meters and the sample times shared by all of them.
#[derive(Debug, Default, Resource)]
pub struct MeterRegistry {
    pub meters: Vec<Meter>,
    pub times: Vec<f64>,
}

impl MeterRegistry {
    /// Adds a meter unless one with the same name exists. A meter added
    /// mid-run is back-filled with NaN for the samples it missed.
    pub fn register(&mut self, mut meter: Meter) -> bool {
        if self.meters.iter().any(|m| m.name == meter.name) {
            return false;
        }
        meter.values = vec![f64::NAN; self.times.len()];
        self.meters.push(meter);
        true
    }

    /// Points meters on bus `old`, or on a device connected to it, at the
    /// renumbered holder. Names keep the number they were registered with.
    pub fn retarget_bus(&mut self, old: BusNumber, new: BusNumber) {
        for meter in &mut self.meters {
            match &mut meter.target {
                EntityRef::Bus(b) if *b == old => *b = new,
                EntityRef::Device(id) if id.touches(old) => *id = id.renumbered(old, new),
                _ => {}
            }
        }
    }

    pub fn clear_samples(&mut self) {
        self.times.clear();
        for meter in &mut self.meters {
            meter.values.clear();
        }
    }

    pub fn sample(&mut self, world: &World, t: f64) {
        self.times.push(t);
        for meter in &mut self.meters {
            let v = meter.read(world);
            meter.values.push(v);
        }
    }
}

/// Records one sample of every meter at the current time.
pub fn record_sample(world: &mut World) {
    let t = world.resource::<Time>().0;
    world.resource_scope(|world, mut registry: Mut<MeterRegistry>| registry.sample(world, t));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::ecs::network::{DataOps, PowerGrid};
    use crate::toolkit::id::DeviceId;

    #[test]
    fn named_meters_and_plain_fields() {
        let spec = MeterSpec::new(EntityRef::Bus(1), "voltage in pu");
        let meter = Meter::build(&spec, Holder::Bus).unwrap();
        assert_eq!(meter.reading, Reading::Field { name: "VM PU".into(), ty: ParamType::Float });
        assert_eq!(meter.name, "VOLTAGE IN PU @ BUS 1");

        let raw = MeterSpec::new(EntityRef::Bus(1), "BASE");
        assert!(Meter::build(&raw, Holder::Bus).is_ok());
        let text = MeterSpec::new(EntityRef::Bus(1), "NAME");
        assert!(Meter::build(&text, Holder::Bus).is_err());
        let model = MeterSpec::new(EntityRef::Bus(1), MODEL_INTERNAL_VARIABLE).variable("DELTA");
        assert!(Meter::build(&model, Holder::Bus).is_err());
    }

    #[test]
    fn late_meters_are_back_filled() {
        let mut grid = PowerGrid::default();
        grid.add_bus(1, "A", 110.0);
        let id = DeviceId::decode(DeviceClass::Generator, &(1, "G")).unwrap();
        grid.add_device(id.clone());

        let mut registry = MeterRegistry::default();
        let bus = Meter::build(&MeterSpec::new(EntityRef::Bus(1), "VOLTAGE IN PU"), Holder::Bus).unwrap();
        assert!(registry.register(bus.clone()));
        assert!(!registry.register(bus));
        registry.sample(grid.world(), 0.0);

        let holder = Holder::Device(DeviceClass::Generator);
        let p = Meter::build(&MeterSpec::new(id, "ACTIVE POWER IN MW"), holder).unwrap();
        registry.register(p);
        registry.sample(grid.world(), 0.01);

        assert_eq!(registry.times, vec![0.0, 0.01]);
        assert_eq!(registry.meters[0].values, vec![1.0, 1.0]);
        assert!(registry.meters[1].values[0].is_nan());
        assert_eq!(registry.meters[1].values[1], 0.0);
    }
}
