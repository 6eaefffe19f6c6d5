use gridkit::prelude::*;

#[test]
fn tripping_a_line_keeps_it_in_the_database() {
    let tk = Toolkit::default_toolkit();
    assert!(tk.is_default());
    assert!(tk.add_bus(1, "BUS1", 230.0));
    assert!(tk.add_bus(2, "BUS2", 230.0));
    assert!(tk.add_line((1, 2, "1")));
    assert_eq!(tk.get_line_count(), 1);

    assert!(tk.trip_line((1, 2, "1")));
    assert!(tk.is_line_exist((1, 2, "1")));
    assert!(!tk.is_device_in_service(DeviceClass::Line, (2, 1, "1")));

    // A second handle sees the same default database.
    let other = Toolkit::default_toolkit();
    assert_eq!(other.bus_number2name(1), "BUS1");
}

#[test]
fn typed_access_and_events_on_a_private_toolkit() {
    let tk = Toolkit::new("");
    tk.add_bus(1, "A", 110.0);
    tk.add_bus(2, "B", 110.0);
    tk.add_line((1, 2, "L"));
    tk.add_transformer((1, 2, 0, "T1"));
    tk.add_generator((1, "G"));

    tk.set_bus_data(1, "F", "BASE", 230.0);
    assert_eq!(tk.get_bus_data(1, "F", "BASE"), ParamValue::Float(230.0));
    assert_eq!(tk.get_bus_data(1, "S", "BASE"), ParamValue::String(String::new()));
    assert!(matches!(
        tk.try_get_data(&EntityRef::Bus(1), "S", "BASE"),
        Err(AccessError::TypeMismatch { .. })
    ));
    assert!(tk.is_transformer_exist((1, 2, "T1")));

    tk.shed_generator((1, "G"), 0.2);
    tk.shed_generator((1, "G"), 0.3);
    let mbase = tk.get_device_data(DeviceClass::Generator, (1, "G"), "", "F", "MBASE").as_f64();
    assert!((mbase - 100.0 * 0.56).abs() < 1e-9);

    let y = Complex::new(0.0, -2e3);
    tk.set_line_fault((1, 2, "L"), 1, 1.0, "THREE PHASES FAULT", y);
    let from_line = tk.fault_shunt_at_bus(2);
    tk.clear_all_faults();
    tk.set_bus_fault(2, "THREE PHASES FAULT", y);
    assert_eq!(from_line, tk.fault_shunt_at_bus(2));
}

#[test]
fn a_short_dynamic_run() {
    let tk = Toolkit::new("");
    tk.add_bus(1, "GEN", 20.0);
    tk.add_bus(2, "GRID", 230.0);
    tk.add_transformer((1, 2, "T"));
    tk.add_generator((1, "G"));
    tk.set_dynamic_model(DeviceClass::Generator, (1, "G"), "SYNC GENERATOR", "GENCLS", &[("H", 4.0)]);
    assert_eq!(tk.prepare_meters("GENERATOR"), 3);

    let out = tempfile::tempdir().unwrap();
    let stem = out.path().join("run");
    tk.set_dynamic_simulator_parameter("B", "CSV EXPORT LOGIC", true);
    tk.set_dynamic_simulator_parameter("S", "OUTPUT FILENAME", stem.to_str().unwrap());
    tk.set_dynamic_simulation_time_step(0.05);

    assert!(tk.start());
    assert!(tk.run_to_time(0.5));
    assert!(tk.stop());
    assert_eq!(tk.get_sampled_times().len(), 11);

    let csv = std::fs::read_to_string(out.path().join("run.csv")).unwrap();
    assert_eq!(csv.lines().count(), 12);
    assert!(csv.lines().next().unwrap().starts_with("TIME,"));
}
