//! Verdicts and the plain text lines the CI harness scrapes from stdout.

use std::io::Write;

/// Marker the CI relay greps for. Followed by ` PASS` or ` FAIL`.
pub const CI_RESULT_PREFIX: &str = "CI_RESULT:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Process exit code the CI harness expects for this verdict
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}

/// Outcome of a single self-test
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub verdict: Verdict,
    /// Every violated condition. Empty for a pass.
    pub reasons: Vec<String>,
    /// Measured values, printed as `key: value`
    pub details: Vec<(String, String)>,
}

impl TestReport {
    /// Builds a report that passes exactly when no reasons were collected
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        let verdict = if reasons.is_empty() { Verdict::Pass } else { Verdict::Fail };
        TestReport { verdict, reasons, details: Vec::new() }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::from_reasons(vec![reason.into()])
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Writes `VERDICT: ...`, one `- reason` line per reason and the details
    pub fn write_verdict(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "VERDICT: {}", self.verdict)?;
        for reason in &self.reasons {
            writeln!(out, "- {reason}")?;
        }
        for (key, value) in &self.details {
            writeln!(out, "{key}: {value}")?;
        }
        Ok(())
    }

    /// Writes the verdict block followed by the final `CI_RESULT` line
    pub fn write_ci(&self, out: &mut impl Write) -> std::io::Result<()> {
        self.write_verdict(out)?;
        write_ci_result(out, self.verdict)
    }
}

pub fn write_ci_result(out: &mut impl Write, verdict: Verdict) -> std::io::Result<()> {
    writeln!(out, "{CI_RESULT_PREFIX} {verdict}")
}

/// Extracts the verdict from a line containing [`CI_RESULT_PREFIX`].
/// Anything after the marker other than `PASS` counts as a failure.
pub fn parse_ci_result(line: &str) -> Option<Verdict> {
    let (_, rest) = line.split_once(CI_RESULT_PREFIX)?;
    if rest.trim_start().starts_with("PASS") {
        Some(Verdict::Pass)
    } else {
        Some(Verdict::Fail)
    }
}
