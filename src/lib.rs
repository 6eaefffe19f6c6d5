//! Multi-instance power-system network toolkit.
//!
//! Each [`toolkit::Toolkit`] owns an isolated network database (buses,
//! devices, areas, zones, owners) stored in an ECS world, with typed
//! parameter access, enumeration, topology and fault events, and control of
//! a stepped dynamic simulation with meters.
pub mod basic;
pub mod io;
pub mod logging;
pub mod timeseries;
pub mod toolkit;

pub mod prelude {
    pub use nalgebra::Complex;

    pub use crate::logging::init_tracing;
    pub use crate::timeseries::{MeterSpec, Phase};
    pub use crate::toolkit::config::ToolkitConfig;
    pub use crate::toolkit::error::{AccessError, ToolkitError};
    pub use crate::toolkit::id::{BusNumber, DeviceClass, DeviceId, IdTuple};
    pub use crate::toolkit::param::{EntityRef, ParamType, ParamValue, Side};
    pub use crate::toolkit::search::BusFilter;
    pub use crate::toolkit::{DEFAULT_TOOLKIT_INDEX, Toolkit};
}
