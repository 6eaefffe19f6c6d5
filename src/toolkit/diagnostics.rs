//! Data and network checks. Each check writes a table of findings to the
//! toolkit log sink; none of them changes data except
//! [`Toolkit::check_network_connectivity`] when asked to remove islands.
use bevy_ecs::prelude::*;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::debug;

use super::Toolkit;
use super::id::{BusNumber, DeviceClass};
use crate::basic::ecs::elements::*;
use crate::basic::ecs::network::{DataOps, PowerGrid};
use crate::basic::ecs::topology::device_in_service;

/// One row of a diagnostics report.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct Finding {
    pub device: String,
    pub issue: String,
}

impl Finding {
    fn new(device: impl ToString, issue: impl ToString) -> Self {
        Self {
            device: device.to_string(),
            issue: issue.to_string(),
        }
    }
}

/// Model type every in-service dynamic source and HVDC link needs.
fn required_model(class: DeviceClass) -> Option<&'static str> {
    match class {
        DeviceClass::Generator => Some("SYNC GENERATOR"),
        DeviceClass::WtGenerator => Some("WT GENERATOR"),
        DeviceClass::PvUnit => Some("PV UNIT"),
        DeviceClass::EnergyStorage => Some("ENERGY STORAGE"),
        DeviceClass::Hvdc => Some("HVDC"),
        _ => None,
    }
}

fn render(grid: &mut PowerGrid, title: &str, findings: &[Finding]) {
    debug!(check = title, findings = findings.len(), "diagnostics");
    if findings.is_empty() {
        grid.report(format!("{title}: no problem found."));
        return;
    }
    let mut table = Table::new(findings);
    table.with(Style::markdown());
    grid.report(format!("{title}: {} problem(s) found.\n{table}", findings.len()));
}

fn powerflow_findings(world: &mut World) -> Vec<Finding> {
    let mut out = Vec::new();
    for (id, data) in world.query::<(&BusID, &BusData)>().iter(world) {
        let bus = format!("BUS {}", id.0);
        if data.base_kv <= 0.0 {
            out.push(Finding::new(&bus, format!("base voltage {} kV is not positive", data.base_kv)));
        }
        if data.vmax_pu < data.vmin_pu {
            out.push(Finding::new(&bus, "voltage upper limit is below the lower limit"));
        }
    }
    for (tag, s) in world.query::<(&DeviceTag, &SourceDevice)>().iter(world) {
        if s.status && s.mbase_mva <= 0.0 {
            out.push(Finding::new(&**tag, "in service with non-positive MBASE"));
        }
        if s.pmax_mw < s.pmin_mw {
            out.push(Finding::new(&**tag, "PMAX is below PMIN"));
        }
        if s.qmax_mvar < s.qmin_mvar {
            out.push(Finding::new(&**tag, "QMAX is below QMIN"));
        }
    }
    for (tag, line) in world.query::<(&DeviceTag, &LineDevice)>().iter(world) {
        if line.r_pu < 0.0 {
            out.push(Finding::new(&**tag, "negative resistance"));
        }
    }
    for (tag, tr) in world.query::<(&DeviceTag, &TransformerDevice)>().iter(world) {
        if tr.used_windings().iter().any(|w| w.tap_pu <= 0.0) {
            out.push(Finding::new(&**tag, "non-positive tap"));
        }
    }
    for (tag, hvdc) in world.query::<(&DeviceTag, &HvdcDevice)>().iter(world) {
        if hvdc.pdcn_mw < 0.0 {
            out.push(Finding::new(&**tag, "negative power order"));
        }
    }
    out
}

fn dynamic_findings(world: &mut World) -> Vec<Finding> {
    let mut out = Vec::new();
    for (tag, models) in world.query::<(&DeviceTag, &DynamicModels)>().iter(world) {
        for (model_type, record) in models.iter() {
            for (par, value) in &record.params {
                if !value.is_finite() {
                    out.push(Finding::new(&**tag, format!("{model_type} {} parameter {par} is not finite", record.name)));
                }
            }
        }
        if let Some(h) = models.parameter("SYNC GENERATOR", "H") {
            if h <= 0.0 {
                out.push(Finding::new(&**tag, format!("inertia H = {h} s is not positive")));
            }
        }
    }
    out
}

fn missing_model_findings(world: &mut World) -> Vec<Finding> {
    let mut out = Vec::new();
    for (entity, tag, models) in world.query::<(Entity, &DeviceTag, &DynamicModels)>().iter(world) {
        let Some(model_type) = required_model(tag.class) else {
            continue;
        };
        if device_in_service(world, entity, tag.class) && !models.contains_key(model_type) {
            out.push(Finding::new(&**tag, format!("no {model_type} model")));
        }
    }
    out
}

fn time_constant_findings(world: &mut World, dt: f64) -> Vec<Finding> {
    let mut out = Vec::new();
    for (tag, models) in world.query::<(&DeviceTag, &DynamicModels)>().iter(world) {
        for (model_type, record) in models.iter() {
            let constants = record
                .params
                .iter()
                .filter(|(par, t)| par.starts_with('T') && **t > 0.0);
            for (par, &t) in constants {
                let verdict = if t < 2.0 * dt {
                    "below 2 time steps"
                } else if t < 4.0 * dt {
                    "below 4 time steps"
                } else {
                    continue;
                };
                out.push(Finding::new(&**tag, format!("{model_type} {par} = {t} s is {verdict}")));
            }
        }
    }
    out
}

fn has_slack(grid: &PowerGrid, island: &[BusNumber]) -> bool {
    island.iter().any(|&b| {
        grid.bus_entity(b)
            .and_then(|e| grid.get::<BusData>(e))
            .is_some_and(|d| d.bus_type == BusType::Slack)
    })
}

impl Toolkit {
    /// Checks bus limits, source ratings and branch data used by power flow.
    pub fn check_powerflow_data(&self) {
        self.with_grid(|grid| {
            let findings = powerflow_findings(grid.world_mut());
            render(grid, "Power flow data check", &findings);
        })
    }

    pub fn check_dynamic_data(&self) {
        self.with_grid(|grid| {
            let findings = dynamic_findings(grid.world_mut());
            render(grid, "Dynamic data check", &findings);
        })
    }

    /// Lists in-service sources and HVDC links without their main model.
    pub fn check_missing_models(&self) {
        self.with_grid(|grid| {
            let findings = missing_model_findings(grid.world_mut());
            render(grid, "Missing model check", &findings);
        })
    }

    /// Flags model time constants (parameters named T*) shorter than four
    /// simulation time steps.
    pub fn check_least_dynamic_time_constants(&self) {
        self.with_grid(|grid| {
            let dt = grid.time_step();
            let findings = time_constant_findings(grid.world_mut(), dt);
            render(grid, &format!("Time constant check at {dt} s step"), &findings);
        })
    }

    /// Reports the AC islands and those without a slack bus. With
    /// `remove_void_islands` the buses of slackless islands are tripped.
    pub fn check_network_connectivity(&self, remove_void_islands: bool) {
        self.with_grid(|grid| {
            let islands = grid.islands();
            let mut findings = Vec::new();
            for (n, island) in islands.iter().enumerate() {
                if has_slack(grid, island) {
                    continue;
                }
                let issue = if remove_void_islands {
                    "no slack bus, removed"
                } else {
                    "no slack bus"
                };
                findings.push(Finding::new(format!("ISLAND {} ({} buses)", n + 1, island.len()), issue));
                if remove_void_islands {
                    for &bus in island {
                        grid.trip_bus(bus);
                    }
                }
            }
            grid.report(format!("{} AC island(s) found.", islands.len()));
            render(grid, "Network connectivity check", &findings);
        })
    }
}
