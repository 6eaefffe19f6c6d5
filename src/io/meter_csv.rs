//! CSV export of recorded meters: one `TIME` column followed by one column
//! per meter, one row per sample.
use std::path::Path;

use csv::WriterBuilder;

use crate::timeseries::MeterRegistry;
use crate::toolkit::error::{Result, ToolkitError};

pub fn write_meters(path: &Path, registry: &MeterRegistry) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|source| ToolkitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = WriterBuilder::new().from_writer(file);

    let mut header = vec!["TIME".to_string()];
    header.extend(registry.meters.iter().map(|m| m.name.clone()));
    writer.write_record(&header)?;

    for (row, t) in registry.times.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(format!("{t:.6}"));
        for meter in &registry.meters {
            let v = meter.values.get(row).copied().unwrap_or(f64::NAN);
            record.push(format!("{v:.6}"));
        }
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|source| ToolkitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::ecs::access::Holder;
    use crate::timeseries::{Meter, MeterSpec};
    use crate::toolkit::param::EntityRef;

    #[test]
    fn columns_follow_registration_order() {
        let mut registry = MeterRegistry::default();
        for bus in [2, 1] {
            let spec = MeterSpec::new(EntityRef::Bus(bus), "VOLTAGE IN PU");
            registry.register(Meter::build(&spec, Holder::Bus).unwrap());
        }
        registry.times = vec![0.0, 0.01];
        registry.meters[0].values = vec![1.0, 0.98];
        registry.meters[1].values = vec![1.02, 1.01];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meters.csv");
        write_meters(&path, &registry).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, vec!["TIME", "VOLTAGE IN PU @ BUS 2", "VOLTAGE IN PU @ BUS 1"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1].parse::<f64>().unwrap(), 0.98);
    }
}
