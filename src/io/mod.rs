pub mod meter_csv;

pub use meter_csv::write_meters;
