use std::path::Path;

use crate::common;
use board_selftest::{
    config::Ds18b20Config,
    report::Verdict,
    selftest::{
        ds18b20::{CRC_FAILED, NO_SENSOR},
        Ds18b20SelfTest, SelfTest,
    },
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn add_sensor(bus: &Path, id: &str, crc: &str, milli_celsius: &str) {
    let device = bus.join(id);
    std::fs::create_dir_all(&device).unwrap();
    std::fs::write(
        device.join("w1_slave"),
        format!(
            "72 01 4b 46 7f ff 0e 10 57 : crc=57 {crc}\n72 01 4b 46 7f ff 0e 10 57 t={milli_celsius}\n"
        ),
    )
    .unwrap();
}

fn run(bus: &Path) -> board_selftest::report::TestReport {
    let config = Ds18b20Config { w1_devices: bus.to_owned(), ..Default::default() };
    Ds18b20SelfTest::new(config).run().unwrap()
}

#[test]
fn sane_temperature_passes() -> TestResult {
    common::prepare_logging();
    let bus = common::scratch_dir("ds18b20_pass");
    std::fs::create_dir_all(bus.join("w1_bus_master1"))?;
    add_sensor(&bus, "28-0000075a1b2c", "YES", "21500");

    let report = run(&bus);

    assert_eq!(report.verdict, Verdict::Pass, "{:?}", report.reasons);
    assert!(report.details.contains(&("Measured temperature".into(), "21.50 °C".into())));
    assert!(report.details.contains(&("Device".into(), "28-0000075a1b2c".into())));

    common::cleanup("ds18b20_pass");
    Ok(())
}

#[test]
fn first_sensor_is_used() -> TestResult {
    common::prepare_logging();
    let bus = common::scratch_dir("ds18b20_first");
    add_sensor(&bus, "28-000000000002", "YES", "85000");
    add_sensor(&bus, "28-000000000001", "YES", "21000");

    let report = run(&bus);

    assert_eq!(report.verdict, Verdict::Pass, "{:?}", report.reasons);
    assert!(report.details.contains(&("Device".into(), "28-000000000001".into())));

    common::cleanup("ds18b20_first");
    Ok(())
}

#[test]
fn empty_bus_fails() -> TestResult {
    common::prepare_logging();
    let bus = common::scratch_dir("ds18b20_empty");
    std::fs::create_dir_all(bus.join("w1_bus_master1"))?;

    assert_eq!(run(&bus).reasons, vec![NO_SENSOR]);

    common::cleanup("ds18b20_empty");
    Ok(())
}

#[test]
fn missing_bus_fails() {
    common::prepare_logging();
    let report = run(Path::new("tests/tmp/ds18b20_no_such_bus"));

    assert_eq!(report.verdict, Verdict::Fail);
    assert!(report.reasons[0].starts_with("1-Wire bus not available"));
}

#[test]
fn crc_error_fails() -> TestResult {
    common::prepare_logging();
    let bus = common::scratch_dir("ds18b20_crc");
    add_sensor(&bus, "28-0000075a1b2c", "NO", "23125");

    assert_eq!(run(&bus).reasons, vec![CRC_FAILED]);

    common::cleanup("ds18b20_crc");
    Ok(())
}

#[test]
fn power_on_value_fails() -> TestResult {
    common::prepare_logging();
    let bus = common::scratch_dir("ds18b20_85");
    add_sensor(&bus, "28-0000075a1b2c", "YES", "85000");

    let report = run(&bus);

    assert_eq!(report.reasons, vec!["Power-up default value detected (85 °C)"]);
    assert!(report.details.contains(&("Measured temperature".into(), "85.00 °C".into())));

    common::cleanup("ds18b20_85");
    Ok(())
}
