//! Caller-facing toolkit API.
//!
//! A [`Toolkit`] is a handle to one network database living in the shared
//! engine. Every operation is synchronous and never fails at the call level:
//! rejected requests are written to the toolkit's log sink and answered with
//! a documented sentinel. The `try_*` accessors in [`param`] expose the
//! underlying [`error::AccessError`] for callers that need it.
pub mod config;
pub mod database;
pub mod diagnostics;
pub mod dynamics;
pub mod error;
pub mod id;
pub mod param;
pub mod registry;
pub mod search;
pub mod topology;

pub use registry::{DEFAULT_TOOLKIT_INDEX, EngineContext, Toolkit};
