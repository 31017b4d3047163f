use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub log_path: String,
    pub log_level: String,
    pub gps: GpsConfig,
    pub ds18b20: Ds18b20Config,
    pub gpio: GpioConfig,
    pub relay: RelayConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_path: "log".into(),
            log_level: "Info".into(),
            gps: GpsConfig::default(),
            ds18b20: Ds18b20Config::default(),
            gpio: GpioConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Configuration {
    /// Reads the configuration at `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Unknown level names fall back to `Info`
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        log::LevelFilter::from_str(&self.log_level).unwrap_or(log::LevelFilter::Info)
    }
}

/// GT-U7 wiring and the two acquisition windows
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub uart: String,
    pub baudrate: u32,
    pub activity_window_ms: u64,
    pub fix_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            uart: "/dev/ttyS0".into(),
            baudrate: 9600,
            activity_window_ms: 5_000,
            fix_timeout_ms: 120_000,
            poll_interval_ms: 100,
        }
    }
}

impl GpsConfig {
    #[must_use]
    pub fn activity_window(&self) -> Duration {
        Duration::from_millis(self.activity_window_ms)
    }

    #[must_use]
    pub fn fix_timeout(&self) -> Duration {
        Duration::from_millis(self.fix_timeout_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Ds18b20Config {
    /// Directory the kernel's w1 driver populates with one entry per slave
    pub w1_devices: PathBuf,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
}

impl Default for Ds18b20Config {
    fn default() -> Self {
        Self { w1_devices: "/sys/bus/w1/devices".into(), temp_min_c: -40.0, temp_max_c: 125.0 }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// (output, input) BCM pin numbers that are wired together
    pub pairs: Vec<(u8, u8)>,
    pub settle_ms: u64,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self { pairs: vec![(14, 19), (12, 18)], settle_ms: 50 }
    }
}

impl GpioConfig {
    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Serial connection to the board's MicroPython REPL
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub uart: String,
    pub baudrate: u32,
    pub timeout_s: u64,
    /// Module imported on the board to start the tests
    pub runner: String,
    /// Wait after opening the port, the board may reset on connect
    pub settle_ms: u64,
    /// Wait after interrupting whatever the board was running
    pub interrupt_delay_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            uart: "/dev/ttyUSB0".into(),
            baudrate: 115_200,
            timeout_s: 600,
            runner: "test_runner_system".into(),
            settle_ms: 2_000,
            interrupt_delay_ms: 1_000,
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
