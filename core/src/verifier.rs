//! Response verification and the end-of-run verdict
//!
//! Verification is pure: it maps an attempt outcome plus the latched
//! expectations to a classification, without touching I/O. Workers feed the
//! result into the counters and the metric record; the verdict is computed
//! once, at stop, from the counter tallies alone.

use std::time::Duration;

use crate::config::{CheckState, ResponseTimeMode};

/// Outcome of verifying one received response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// Whether the status code is in the expected set
    pub status_expected: bool,
    /// Body-substring check result, `None` when not configured
    pub body_ok: Option<bool>,
    /// Response-time check result, `None` when not configured
    pub time_ok: Option<bool>,
}

impl Verification {
    /// Whether the attempt counts as a success
    pub fn passed(&self) -> bool {
        self.status_expected && self.body_ok.unwrap_or(true) && self.time_ok.unwrap_or(true)
    }
}

/// Verify a received response against the latched expectations
///
/// `body` is `None` when the body could not be read; an unreadable or empty
/// body fails the substring check but does not turn the response into a
/// transport error.
pub fn verify_response(
    state: &CheckState,
    status: u16,
    body: Option<&[u8]>,
    response_time: Duration,
) -> Verification {
    let status_expected = state.expected_status_codes.matches_status(status);

    let body_ok = state.responses_contains.as_deref().map(|needle| match body {
        Some(bytes) if !bytes.is_empty() => {
            String::from_utf8_lossy(bytes).contains(needle)
        }
        _ => false,
    });

    let time_ok = state.response_time_rule.map(|rule| match rule.mode {
        ResponseTimeMode::ShorterThan => response_time <= rule.bound,
        ResponseTimeMode::LongerThan => response_time >= rule.bound,
        ResponseTimeMode::NoVerification => true,
    });

    Verification {
        status_expected,
        body_ok,
        time_ok,
    }
}

/// Whether a transport error counts as the expected outcome
pub fn error_expected(state: &CheckState) -> bool {
    state.expected_status_codes.expects_error()
}

/// Pass/fail outcome computed at stop
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Required success rate was met
    Passed {
        /// Achieved success rate in percent
        rate: f64,
    },
    /// Run failed, with a caller-displayable title
    Failed {
        /// Rendered failure title
        title: String,
    },
}

impl Verdict {
    /// Evaluate the verdict from the final counter tallies
    ///
    /// Zero completed attempts always fail; otherwise the rate is
    /// `100 * success / (success + failed)` compared against the threshold.
    pub fn evaluate(success: u64, failed: u64, threshold: u64) -> Self {
        let total = success + failed;
        if total == 0 {
            return Verdict::Failed {
                title: "No requests completed".to_string(),
            };
        }

        let rate = 100.0 * success as f64 / total as f64;
        if rate < threshold as f64 {
            Verdict::Failed {
                title: format!("Success Rate ({rate:.2}%) was below {threshold}%"),
            }
        } else {
            Verdict::Passed { rate }
        }
    }

    /// Whether the run passed
    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed { .. })
    }
}
