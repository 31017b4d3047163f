//! Drives the test runner on the board's MicroPython REPL and mirrors its verdict.

use std::{
    io::Write,
    thread,
    time::{Duration, Instant},
};

use crate::{
    communication::{ComResult, LineBuffer, SerialLink},
    config::RelayConfig,
    report::{parse_ci_result, Verdict},
};

/// Ctrl-C, interrupts whatever program the REPL is running
const INTERRUPT: u8 = 0x03;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Starts `config.runner` on the board and echoes everything it prints to `out` until a
/// `CI_RESULT:` line arrives or `config.timeout()` elapses. Only an explicit `CI_RESULT: PASS`
/// passes. Bytes that are not valid UTF-8 are stripped from the echoed lines.
pub fn relay(
    board: &mut (impl SerialLink + Write + ?Sized),
    config: &RelayConfig,
    out: &mut impl Write,
) -> ComResult<Verdict> {
    thread::sleep(Duration::from_millis(config.settle_ms));

    log::info!("Interrupting board");
    board.write_all(&[INTERRUPT])?;
    board.flush()?;
    thread::sleep(Duration::from_millis(config.interrupt_delay_ms));

    log::info!("Starting {}", config.runner);
    board.write_all(format!("import {}\n", config.runner).as_bytes())?;
    board.flush()?;

    let start = Instant::now();
    let mut lines = LineBuffer::lossy();
    let mut verdict = None;

    'receive: while start.elapsed() < config.timeout() {
        let count = board.read_into(&mut lines)?;

        while let Some(line) = lines.next_line() {
            writeln!(out, "{line}")?;
            if let Some(v) = parse_ci_result(&line) {
                verdict = Some(v);
                break 'receive;
            }
        }

        if count == 0 {
            thread::sleep(POLL_INTERVAL);
        }
    }

    let verdict = verdict.unwrap_or_else(|| {
        log::error!("No CI_RESULT within {}s", config.timeout_s);
        Verdict::Fail
    });
    writeln!(out, "FINAL RESULT: {verdict}")?;
    Ok(verdict)
}
