use std::time::{Duration, Instant};

use crate::common::{self, fix_stream, gga, gps_config, gsv, rmc, sentence, ScriptedLink};
use board_selftest::{
    communication::CommunicationError,
    config::GpsConfig,
    report::{TestReport, Verdict},
    selftest::{
        gps::{self, gps_self_test, INVALID_POSITION, NO_FIX, NO_UART_DATA, UART_INIT_FAILED},
        suite::run_single,
        GpsSelfTest, SelfTest, SelfTestError,
    },
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Runs the GPS self-test on a link that is already open
struct WiredGps {
    link: ScriptedLink,
    config: GpsConfig,
}

impl SelfTest for WiredGps {
    fn name(&self) -> &str {
        "GPS GT-U7"
    }

    fn run(&mut self) -> Result<TestReport, SelfTestError> {
        gps_self_test(&mut self.link, &self.config)
    }
}

fn is_unplugged(result: &Result<TestReport, SelfTestError>) -> bool {
    match result {
        Err(SelfTestError::Communication(CommunicationError::Io(e))) => {
            e.to_string() == "device unplugged"
        }
        _ => false,
    }
}

fn detail<'a>(details: &'a [(String, String)], key: &str) -> Option<&'a str> {
    details.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[test]
fn scripted_fix_passes() -> TestResult {
    common::prepare_logging();
    let mut link = ScriptedLink::repeating(fix_stream("A"));

    let report = gps_self_test(&mut link, &gps_config(5_000))?;

    assert_eq!(report.verdict, Verdict::Pass, "{:?}", report.reasons);
    assert_eq!(detail(&report.details, "Latitude"), Some("48.117300"));
    assert_eq!(detail(&report.details, "Longitude"), Some("11.516667"));
    assert_eq!(detail(&report.details, "Satellites used"), Some("8"));
    assert_eq!(detail(&report.details, "Satellites in view"), Some("11"));
    Ok(())
}

#[test]
fn byte_at_a_time_passes() -> TestResult {
    common::prepare_logging();
    let mut link = ScriptedLink::repeating(fix_stream("A")).with_chunk(1);

    let report = gps_self_test(&mut link, &gps_config(5_000))?;

    assert_eq!(report.verdict, Verdict::Pass, "{:?}", report.reasons);
    Ok(())
}

#[test]
fn void_status_fails_without_position() -> TestResult {
    common::prepare_logging();
    let mut link = ScriptedLink::repeating(fix_stream("V"));

    let report = gps_self_test(&mut link, &gps_config(200))?;

    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.reasons, vec![NO_FIX, INVALID_POSITION]);
    assert_eq!(detail(&report.details, "Latitude"), None);
    Ok(())
}

#[test]
fn silent_uart_fails_before_fix_phase() -> TestResult {
    common::prepare_logging();
    let mut link = ScriptedLink::silent();
    let start = Instant::now();

    let report = gps_self_test(&mut link, &gps_config(60_000))?;

    assert_eq!(report.reasons, vec![NO_UART_DATA]);
    assert!(start.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[test]
fn probe_counts_every_byte() -> TestResult {
    let script = vec![b'x'; 100];
    let mut link = ScriptedLink::once(script).with_chunk(7);

    let received = gps::probe_activity(&mut link, Duration::from_millis(20), Duration::from_millis(1))?;

    assert_eq!(received, 100);
    Ok(())
}

#[test]
fn unparseable_latitude_is_skipped_until_valid() -> TestResult {
    common::prepare_logging();
    let script = [rmc("A", "48x7.038"), gga(), gsv(), rmc("A", "4807.038")].concat();
    let mut link = ScriptedLink::repeating(script.into_bytes());

    let report = gps_self_test(&mut link, &gps_config(5_000))?;

    assert_eq!(report.verdict, Verdict::Pass, "{:?}", report.reasons);
    assert_eq!(detail(&report.details, "Latitude"), Some("48.117300"));
    Ok(())
}

#[test]
fn only_unparseable_latitude_times_out() -> TestResult {
    common::prepare_logging();
    let script = [rmc("A", "48x7.038"), gga(), gsv()].concat();
    let mut link = ScriptedLink::repeating(script.into_bytes());

    let report = gps_self_test(&mut link, &gps_config(200))?;

    assert_eq!(report.reasons, vec![NO_FIX, INVALID_POSITION]);
    Ok(())
}

#[test]
fn noise_is_ignored() -> TestResult {
    common::prepare_logging();
    let mut script = vec![0xff, 0x00, 0x80, b'\n'];
    script.extend(b"$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K\r\n");
    script.extend(b"$GPGGA,123519,4807.038,N,01131.000,E,1,99,0.9,545.4,M,46.9,M,,*00\r\n");
    script.extend(sentence("$GPTXT,01,01,02,ANTENNA OK").into_bytes());
    script.extend(fix_stream("A"));
    let mut link = ScriptedLink::repeating(script);

    let report = gps_self_test(&mut link, &gps_config(5_000))?;

    assert_eq!(report.verdict, Verdict::Pass, "{:?}", report.reasons);
    assert_eq!(detail(&report.details, "Satellites used"), Some("8"));
    Ok(())
}

#[test]
fn missing_uart_fails_initialization() -> TestResult {
    common::prepare_logging();
    let mut test = GpsSelfTest::new(gps_config(100));

    let report = test.run()?;

    assert_eq!(report.verdict, Verdict::Fail);
    assert_eq!(report.reasons.len(), 1);
    assert!(report.reasons[0].starts_with(UART_INIT_FAILED), "{}", report.reasons[0]);
    Ok(())
}

#[test]
fn unplugged_uart_is_a_communication_error() {
    common::prepare_logging();
    let mut link = ScriptedLink::repeating(fix_stream("A")).unplugged_after(Duration::ZERO);

    let result = gps_self_test(&mut link, &gps_config(5_000));

    assert!(is_unplugged(&result), "{result:?}");
}

#[test]
fn unplug_while_waiting_for_fix_is_a_communication_error() {
    common::prepare_logging();
    let mut link =
        ScriptedLink::repeating(fix_stream("V")).unplugged_after(Duration::from_millis(150));
    let start = Instant::now();

    let result = gps_self_test(&mut link, &gps_config(5_000));

    assert!(is_unplugged(&result), "{result:?}");
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn unplugged_uart_is_reported_as_unhandled_failure() -> TestResult {
    common::prepare_logging();
    let mut test = WiredGps {
        link: ScriptedLink::repeating(fix_stream("A")).unplugged_after(Duration::ZERO),
        config: gps_config(5_000),
    };
    let mut out = Vec::new();

    let verdict = run_single(&mut test, &mut out)?;

    assert_eq!(verdict, Verdict::Fail);
    let out = String::from_utf8(out)?;
    assert!(
        out.ends_with(
            "- Unhandled error: Communication: io error: device unplugged\nCI_RESULT: FAIL\n"
        ),
        "{out}"
    );
    Ok(())
}

#[test]
fn fix_wait_does_not_overshoot_timeout() -> TestResult {
    common::prepare_logging();
    let mut link = ScriptedLink::silent();
    let start = Instant::now();

    let record = gps::acquire_fix(&mut link, Duration::from_millis(50), Duration::from_secs(2))?;

    assert!(!record.is_complete());
    assert!(start.elapsed() < Duration::from_millis(1_000), "{:?}", start.elapsed());
    Ok(())
}
