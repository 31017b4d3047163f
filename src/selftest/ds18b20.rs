//! DS18B20 self-test through the kernel's `w1_therm` driver.
//!
//! Every slave on the 1-Wire bus shows up as a directory under the w1 devices directory. DS18B20s
//! have the family code `28`. Reading their `w1_slave` file triggers a conversion and blocks
//! until it finished, so no explicit conversion delay is needed.

use std::path::{Path, PathBuf};

use super::{SelfTest, SelfTestError};
use crate::{config::Ds18b20Config, report::TestReport};

const FAMILY_PREFIX: &str = "28-";
const SLAVE_FILE: &str = "w1_slave";

/// Reported when the sensor does not answer
const NOT_RESPONDING_MILLI_C: i32 = -127_000;
/// Scratchpad value after power-up, before any conversion
const POWER_ON_RESET_MILLI_C: i32 = 85_000;

pub const NO_SENSOR: &str = "No DS18B20 detected on 1-Wire bus";
pub const CRC_FAILED: &str = "CRC check failed";
pub const NO_VALUE: &str = "Temperature read returned no value";

/// Parsed content of a `w1_slave` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub crc_ok: bool,
    pub milli_celsius: Option<i32>,
}

impl Reading {
    /// Parses the two line format, e.g.
    /// ```text
    /// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
    /// 72 01 4b 46 7f ff 0e 10 57 t=23125
    /// ```
    pub fn parse(content: &str) -> Reading {
        let mut lines = content.lines();
        let crc_ok = lines.next().is_some_and(|l| l.trim_end().ends_with("YES"));
        let milli_celsius = lines
            .next()
            .and_then(|l| l.split_once("t="))
            .and_then(|(_, t)| t.trim().parse().ok());

        Reading { crc_ok, milli_celsius }
    }

    pub fn celsius(&self) -> Option<f64> {
        self.milli_celsius.map(to_celsius)
    }
}

fn to_celsius(milli_celsius: i32) -> f64 {
    f64::from(milli_celsius) / 1000.0
}

/// Lists the DS18B20 device directories below `w1_devices`, sorted by id
pub fn find_sensors(w1_devices: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut sensors = Vec::new();
    for entry in std::fs::read_dir(w1_devices)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(FAMILY_PREFIX) {
            sensors.push(entry.path());
        }
    }
    sensors.sort();
    Ok(sensors)
}

/// Checks a converted value against the sentinel values and the configured sane range
pub fn check_temperature(milli_celsius: i32, config: &Ds18b20Config) -> Option<String> {
    let celsius = to_celsius(milli_celsius);
    match milli_celsius {
        NOT_RESPONDING_MILLI_C => Some("Sensor not responding (-127 °C)".into()),
        POWER_ON_RESET_MILLI_C => Some("Power-up default value detected (85 °C)".into()),
        _ if celsius < config.temp_min_c || celsius > config.temp_max_c => {
            Some(format!("Temperature out of sane range ({celsius:.2} °C)"))
        }
        _ => None,
    }
}

pub struct Ds18b20SelfTest {
    config: Ds18b20Config,
}

impl Ds18b20SelfTest {
    pub fn new(config: Ds18b20Config) -> Self {
        Self { config }
    }
}

impl SelfTest for Ds18b20SelfTest {
    fn name(&self) -> &str {
        "DS18B20 Temperature Sensor"
    }

    fn run(&mut self) -> Result<TestReport, SelfTestError> {
        let bus = &self.config.w1_devices;
        let sensors = match find_sensors(bus) {
            Ok(sensors) => sensors,
            Err(e) => {
                log::error!("Could not list {}: {e}", bus.display());
                return Ok(TestReport::fail(format!(
                    "1-Wire bus not available: {} ({e})",
                    bus.display()
                )));
            }
        };

        let Some(sensor) = sensors.first() else {
            return Ok(TestReport::fail(NO_SENSOR));
        };
        let device = sensor.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        log::info!("Found {} DS18B20 device(s), using {device}", sensors.len());

        let content = match std::fs::read_to_string(sensor.join(SLAVE_FILE)) {
            Ok(content) => content,
            Err(e) => return Ok(TestReport::fail(format!("Temperature read failed: {e}"))),
        };

        let reading = Reading::parse(&content);
        log::info!("Raw reading: {reading:?}");
        if !reading.crc_ok {
            return Ok(TestReport::fail(CRC_FAILED).with_detail("Device", device));
        }
        let (Some(milli_celsius), Some(celsius)) = (reading.milli_celsius, reading.celsius()) else {
            return Ok(TestReport::fail(NO_VALUE).with_detail("Device", device));
        };

        let reasons = check_temperature(milli_celsius, &self.config).into_iter().collect();
        Ok(TestReport::from_reasons(reasons)
            .with_detail("Measured temperature", format!("{celsius:.2} °C"))
            .with_detail("Device", device))
    }
}
