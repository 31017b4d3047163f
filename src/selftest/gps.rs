//! GT-U7 GPS self-test.
//!
//! The test runs through `INIT -> PROBING -> WAITING_FOR_FIX -> VERDICT` exactly once:
//! open the UART, make sure the module sends anything at all, then collect NMEA sentences until
//! a fix with position and satellite counts is known or the fix timeout expires.

use std::{
    thread,
    time::{Duration, Instant},
};

use super::{SelfTest, SelfTestError};
use crate::{
    communication::{open_port, ComResult, LineBuffer, SerialLink},
    config::GpsConfig,
    nmea::Sentence,
    report::TestReport,
};

pub const UART_INIT_FAILED: &str = "UART initialization failed";
pub const NO_UART_DATA: &str = "No UART data received from GPS";
pub const NO_FIX: &str = "No GPS fix acquired";
pub const INVALID_POSITION: &str = "Invalid latitude/longitude";
pub const NO_SATELLITES_USED: &str = "Satellites used not reported";
pub const NO_SATELLITES_IN_VIEW: &str = "Satellites in view not reported";

/// Read timeout of the port itself. Reads only happen once bytes are known to be buffered.
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// What has been learned about the receiver's fix so far
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixRecord {
    pub fix_valid: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub satellites_used: Option<u8>,
    pub satellites_in_view: Option<u8>,
}

impl FixRecord {
    /// Records the fields `sentence` carries, overwriting earlier values.
    ///
    /// A position is only taken from an active RMC sentence, and only if both coordinates
    /// decode. A void RMC leaves the record untouched.
    /// ## Returns
    /// Wether the record changed
    pub fn apply(&mut self, sentence: &Sentence) -> bool {
        match *sentence {
            Sentence::Rmc { active: true, latitude: Some(lat), longitude: Some(lon) } => {
                self.fix_valid = true;
                self.latitude = Some(lat);
                self.longitude = Some(lon);
            }
            Sentence::Rmc { active: true, .. } => {
                log::debug!("Ignoring active RMC with undecodable position");
                return false;
            }
            Sentence::Gga { satellites_used: Some(n) } => self.satellites_used = Some(n),
            Sentence::Gsv { satellites_in_view: Some(n) } => self.satellites_in_view = Some(n),
            _ => return false,
        }
        true
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fix_valid
            && self.latitude.is_some()
            && self.longitude.is_some()
            && self.satellites_used.is_some()
            && self.satellites_in_view.is_some()
    }

    /// The position, if there is a valid fix
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        if !self.fix_valid {
            return None;
        }
        Some((self.latitude?, self.longitude?))
    }

    /// Judges the record. Every check is evaluated, so a failing report names all missing parts.
    pub fn verdict(&self) -> TestReport {
        let mut reasons = Vec::new();
        if !self.fix_valid {
            reasons.push(NO_FIX.to_owned());
        }
        if self.latitude.is_none() || self.longitude.is_none() {
            reasons.push(INVALID_POSITION.to_owned());
        }
        if self.satellites_used.is_none() {
            reasons.push(NO_SATELLITES_USED.to_owned());
        }
        if self.satellites_in_view.is_none() {
            reasons.push(NO_SATELLITES_IN_VIEW.to_owned());
        }

        let mut report = TestReport::from_reasons(reasons);
        if let (Some((lat, lon)), Some(used), Some(in_view)) =
            (self.position(), self.satellites_used, self.satellites_in_view)
        {
            report = report
                .with_detail("Latitude", format!("{lat:.6}"))
                .with_detail("Longitude", format!("{lon:.6}"))
                .with_detail("Satellites in view", in_view)
                .with_detail("Satellites used", used);
        }
        report
    }
}

/// Drains the link for the whole `window` without parsing anything.
/// ## Returns
/// The total number of bytes received
pub fn probe_activity(
    link: &mut (impl SerialLink + ?Sized),
    window: Duration,
    poll_interval: Duration,
) -> ComResult<usize> {
    let start = Instant::now();
    let mut received = 0;

    while start.elapsed() < window {
        let count = link.drain()?;
        received += count;
        if count == 0 {
            thread::sleep(poll_interval.min(window.saturating_sub(start.elapsed())));
        }
    }

    Ok(received)
}

/// Feeds incoming lines into a [`FixRecord`] until it is complete or `timeout` elapses.
/// Lines that are not recognized sentences are skipped.
pub fn acquire_fix(
    link: &mut (impl SerialLink + ?Sized),
    timeout: Duration,
    poll_interval: Duration,
) -> ComResult<FixRecord> {
    let start = Instant::now();
    let mut record = FixRecord::default();
    let mut lines = LineBuffer::new();

    while start.elapsed() < timeout {
        let count = link.read_into(&mut lines)?;

        while let Some(line) = lines.next_line() {
            match Sentence::parse(&line) {
                Some(sentence) => {
                    if record.apply(&sentence) {
                        log::debug!("{record:?}");
                    }
                }
                None => log::trace!("Skipping {line:?}"),
            }

            if record.is_complete() {
                log::info!("Fix complete after {:.1}s", start.elapsed().as_secs_f32());
                return Ok(record);
            }
        }

        if count == 0 {
            thread::sleep(poll_interval.min(timeout.saturating_sub(start.elapsed())));
        }
    }

    log::warn!("Fix incomplete after {}s: {record:?}", timeout.as_secs());
    Ok(record)
}

/// Runs the probe and fix phases on an already opened link
pub fn gps_self_test(
    link: &mut (impl SerialLink + ?Sized),
    config: &GpsConfig,
) -> Result<TestReport, SelfTestError> {
    log::info!("Probing UART for {}ms", config.activity_window_ms);
    let received = probe_activity(link, config.activity_window(), config.poll_interval())?;
    log::info!("UART bytes received: {received}");

    if received == 0 {
        log::error!("{NO_UART_DATA}");
        return Ok(TestReport::fail(NO_UART_DATA));
    }

    log::info!("Waiting up to {}ms for GPS fix", config.fix_timeout_ms);
    let record = acquire_fix(link, config.fix_timeout(), config.poll_interval())?;
    Ok(record.verdict().with_detail("UART bytes received", received))
}

pub struct GpsSelfTest {
    config: GpsConfig,
}

impl GpsSelfTest {
    pub fn new(config: GpsConfig) -> Self {
        Self { config }
    }
}

impl SelfTest for GpsSelfTest {
    fn name(&self) -> &str {
        "GPS GT-U7"
    }

    fn run(&mut self) -> Result<TestReport, SelfTestError> {
        let mut port = match open_port(&self.config.uart, self.config.baudrate, PORT_TIMEOUT) {
            Ok(port) => port,
            Err(e) => {
                log::error!("Could not open {}: {e}", self.config.uart);
                return Ok(TestReport::fail(format!("{UART_INIT_FAILED}: {e}")));
            }
        };

        gps_self_test(&mut port, &self.config)
    }
}
