use std::io::Write;

use super::SelfTest;
use crate::report::{write_ci_result, TestReport, Verdict};

const RULE_WIDTH: usize = 60;

fn write_banner(out: &mut impl Write, title: &str) -> std::io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "{rule}")?;
    writeln!(out, "{title}")?;
    writeln!(out, "{rule}")
}

/// Runs `test`, turning an `Err` into a failing report
pub fn execute(test: &mut dyn SelfTest) -> TestReport {
    log::info!("Running {}", test.name());
    match test.run() {
        Ok(report) => {
            log::info!("{} finished with {}", test.name(), report.verdict);
            report
        }
        Err(e) => {
            log::error!("{} failed with {e}", test.name());
            TestReport::fail(format!("Unhandled error: {e}"))
        }
    }
}

/// Runs a single self-test and prints its verdict and `CI_RESULT` line
pub fn run_single(test: &mut dyn SelfTest, out: &mut impl Write) -> std::io::Result<Verdict> {
    write_banner(out, &format!("{} SELF-TEST", test.name().to_uppercase()))?;
    let report = execute(test);
    report.write_ci(out)?;
    Ok(report.verdict)
}

/// Runs every test in order and prints a summary. The suite only passes if every test passed,
/// an empty suite fails.
pub fn run_suite(tests: &mut [Box<dyn SelfTest>], out: &mut impl Write) -> std::io::Result<Verdict> {
    write_banner(out, "SYSTEM SELF-TEST SUITE")?;

    let mut results = Vec::with_capacity(tests.len());
    for test in tests.iter_mut() {
        writeln!(out)?;
        write_banner(out, &format!("RUNNING: {}", test.name()))?;
        let report = execute(test.as_mut());
        report.write_verdict(out)?;
        results.push((test.name().to_owned(), report.verdict));
    }

    writeln!(out)?;
    write_banner(out, "TEST SUMMARY")?;
    for (name, verdict) in &results {
        writeln!(out, "{name:<30} {verdict}")?;
    }

    let total = results.len();
    let passed = results.iter().filter(|(_, v)| *v == Verdict::Pass).count();
    writeln!(out, "\nTotal: {passed} / {total}")?;

    let verdict = if total > 0 && passed == total { Verdict::Pass } else { Verdict::Fail };
    log::info!("Suite finished: {passed} / {total} passed");
    write_ci_result(out, verdict)?;
    Ok(verdict)
}
