//! Toolkit configuration files.
//!
//! A configuration is applied to a fresh toolkit before it is populated:
//!
//! ```json
//! {
//!   "name": "IEEE 39",
//!   "log_file": "ieee39.log",
//!   "max_bus_number": 1000,
//!   "device_capacities": { "GENERATOR": 20, "LINE": 100 },
//!   "time_step": 0.005
//! }
//! ```
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Toolkit;
use super::error::{Result, ToolkitError};
use super::id::DeviceClass;
use crate::basic::ecs::network::{DEFAULT_CAPACITY, DEFAULT_MAX_BUS_NUMBER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    pub name: String,
    /// Empty logs to stdout.
    pub log_file: String,
    pub detailed_log: bool,
    pub parallel_threads: usize,
    pub sbase_mva: f64,
    pub max_bus_number: u32,
    pub bus_capacity: usize,
    /// Keyed by class name; aliases such as "WT GENERATOR" are accepted.
    pub device_capacities: BTreeMap<String, usize>,
    pub area_capacity: usize,
    pub zone_capacity: usize,
    pub owner_capacity: usize,
    pub dynamic_model_capacity: usize,
    pub time_step: f64,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            log_file: String::new(),
            detailed_log: false,
            parallel_threads: 1,
            sbase_mva: 100.0,
            max_bus_number: DEFAULT_MAX_BUS_NUMBER,
            bus_capacity: DEFAULT_CAPACITY,
            device_capacities: BTreeMap::new(),
            area_capacity: DEFAULT_CAPACITY,
            zone_capacity: DEFAULT_CAPACITY,
            owner_capacity: DEFAULT_CAPACITY,
            dynamic_model_capacity: DEFAULT_CAPACITY,
            time_step: 0.01,
        }
    }
}

impl ToolkitConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ToolkitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    fn device_capacities(&self) -> Result<Vec<(DeviceClass, usize)>> {
        self.device_capacities
            .iter()
            .map(|(name, &n)| {
                name.parse::<DeviceClass>()
                    .map(|class| (class, n))
                    .map_err(|_| ToolkitError::UnknownClass(name.clone()))
            })
            .collect()
    }
}

impl Toolkit {
    /// Allocates a new toolkit set up from `config`. Nothing is allocated
    /// when the configuration names an unknown device class.
    pub fn with_config(config: &ToolkitConfig) -> Result<Self> {
        let devices = config.device_capacities()?;
        let tk = Toolkit::new(&config.log_file);
        tk.apply(config, &devices);
        debug!(index = tk.index(), name = config.name, "toolkit configured");
        Ok(tk)
    }

    fn apply(&self, config: &ToolkitConfig, devices: &[(DeviceClass, usize)]) {
        self.set_toolkit_data("S", "TOOLKIT NAME", config.name.as_str());
        self.set_toolkit_data("F", "SBASE", config.sbase_mva);
        self.set_toolkit_data("B", "DETAILED LOG LOGIC", config.detailed_log);
        self.set_parallel_thread_number(config.parallel_threads);
        self.set_allowed_max_bus_number(config.max_bus_number);
        self.set_bus_capacity(config.bus_capacity);
        for &(class, n) in devices {
            self.set_device_capacity(class, n);
        }
        self.set_area_capacity(config.area_capacity);
        self.set_zone_capacity(config.zone_capacity);
        self.set_owner_capacity(config.owner_capacity);
        self.set_dynamic_model_database_capacity(config.dynamic_model_capacity);
        self.set_dynamic_simulation_time_step(config.time_step);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = ToolkitConfig::from_json_str(
            r#"{"name": "case", "max_bus_number": 99, "device_capacities": {"wt generator": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.sbase_mva, 100.0);
        let tk = Toolkit::with_config(&config).unwrap();
        assert_eq!(tk.get_toolkit_data("S", "TOOLKIT_NAME").as_str(), "case");
        assert_eq!(tk.get_allowed_max_bus_number(), 99);
        assert_eq!(tk.get_device_capacity(DeviceClass::WtGenerator), 2);
        assert_eq!(tk.get_device_capacity(DeviceClass::Line), DEFAULT_CAPACITY);
        assert_eq!(tk.get_dynamic_simulation_time_step(), 0.01);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            ToolkitConfig::from_json_str(r#"{"nmae": "typo"}"#),
            Err(ToolkitError::Config(_))
        ));
        let config = ToolkitConfig {
            device_capacities: BTreeMap::from([("SWITCH".to_string(), 3)]),
            ..Default::default()
        };
        assert!(matches!(Toolkit::with_config(&config), Err(ToolkitError::UnknownClass(c)) if c == "SWITCH"));
        assert!(matches!(
            ToolkitConfig::from_file(Path::new("/nonexistent/gridkit.json")),
            Err(ToolkitError::Io { .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"time_step": 0.002, "detailed_log": true}}"#).unwrap();
        let config = ToolkitConfig::from_file(file.path()).unwrap();
        let tk = Toolkit::with_config(&config).unwrap();
        assert_eq!(tk.get_dynamic_simulation_time_step(), 0.002);
        assert!(tk.get_toolkit_data("B", "DETAILED_LOG_LOGIC").as_bool());
    }
}
