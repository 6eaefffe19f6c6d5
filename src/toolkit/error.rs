use std::path::PathBuf;

use thiserror::Error;

use super::id::DeviceClass;
use super::param::ParamType;

/// Why a typed parameter read or write did not reach its target.
///
/// The sentinel-returning accessors swallow these; the `try_*` family hands
/// them to callers that need to tell a stored zero from a lookup miss.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    #[error("{0} does not exist")]
    UnknownEntity(String),
    #[error("parameter '{name}' is not defined for {owner}")]
    UnknownParameter { owner: String, name: String },
    #[error("parameter '{name}' is {declared:?}, not {requested:?}")]
    TypeMismatch {
        name: String,
        declared: ParamType,
        requested: ParamType,
    },
    #[error("'{0}' is not a valid parameter type tag")]
    InvalidTypeTag(String),
    #[error("'{side}' is not a valid side for {owner}")]
    InvalidSide { owner: String, side: String },
    #[error("parameter '{0}' is read-only")]
    ReadOnly(String),
    #[error("{value} is out of range for parameter '{name}'")]
    OutOfRange { name: String, value: i64 },
    #[error("parameter '{name}' must be positive, got {value}")]
    NotPositive { name: String, value: f64 },
    #[error("{0}")]
    Unsupported(String),
}

/// Rejections raised while decoding a device identifier tuple.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("{class} identifiers take {expected} elements, got {got}")]
    WrongArity {
        class: DeviceClass,
        expected: &'static str,
        got: usize,
    },
    #[error("bus number must be a positive 32-bit integer, got {0}")]
    InvalidBus(i64),
    #[error("element {0} must be a bus number")]
    ExpectedBus(usize),
    #[error("the circuit id must be the last element")]
    MissingCircuit,
}

/// Failures outside the sentinel contract: files, configuration, exports.
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toolkit configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("no device class is named '{0}'")]
    UnknownClass(String),
    #[error("tracing subscriber: {0}")]
    Tracing(String),
}

pub type Result<T> = std::result::Result<T, ToolkitError>;
pub type AccessResult<T> = std::result::Result<T, AccessError>;
