//! Check configuration: raw caller input and the validated, latched state
//!
//! [`CheckConfig`] mirrors the configuration map handed over by the caller at
//! `prepare` (camelCase keys, millisecond integers). Validation turns it into
//! an immutable [`CheckState`] that the engine components share for the whole
//! run: parsed URL and method, resolved status-code set, derived scheduling
//! delay, and the deadline for the externally time-controlled variant.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::status::StatusCodeSet;

/// Delay applied when a single-request run must never see a second tick
const IDLE_DELAY: Duration = Duration::from_secs(3600);

/// Which scheduling rule the check runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckKind {
    /// Fixed request rate, the caller decides when to stop
    Periodic,
    /// Fixed request count spread across the duration, stops itself
    FixedAmount,
}

/// Resolved scheduling mode with its parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Issue `requests_per_second` tickets per second until stopped
    Periodic {
        /// Target request rate
        requests_per_second: u64,
    },
    /// Issue exactly `number_of_requests` tickets, then shut down
    FixedAmount {
        /// Total tickets to issue
        number_of_requests: u64,
    },
}

/// Response-time verification mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseTimeMode {
    /// Do not verify response times
    #[default]
    NoVerification,
    /// Response time must be at most the bound
    ShorterThan,
    /// Response time must be at least the bound
    LongerThan,
}

/// A resolved response-time rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseTimeRule {
    /// Verification direction
    pub mode: ResponseTimeMode,
    /// Bound the measured response time is compared against
    pub bound: Duration,
}

/// One header entry as supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderEntry {
    /// Header name, matched case-insensitively on the wire
    pub key: String,
    /// Literal header value
    pub value: String,
}

/// Raw check configuration as supplied by the caller at `prepare`
///
/// All durations are millisecond integers, matching the wire format of the
/// lifecycle protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConfig {
    /// Target URL
    pub url: String,

    /// HTTP method, defaults to GET when empty
    #[serde(default)]
    pub method: String,

    /// Request body, sent when non-empty
    #[serde(default)]
    pub body: String,

    /// Headers applied to every attempt
    #[serde(default)]
    pub headers: Vec<HeaderEntry>,

    /// Expected status-code expression, e.g. `"200-299"` or `"200;error"`
    #[serde(default = "default_status_code")]
    pub status_code: String,

    /// Substring every response body must contain; empty disables the check
    #[serde(default)]
    pub responses_contains: String,

    /// Response-time verification mode
    #[serde(default)]
    pub response_time_mode: ResponseTimeMode,

    /// Response-time bound in milliseconds, required unless mode is
    /// NO_VERIFICATION
    #[serde(default)]
    pub response_time: Option<u64>,

    /// Run duration in milliseconds
    pub duration: u64,

    /// Per-attempt connect timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout: u64,

    /// Per-attempt total timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub read_timeout: u64,

    /// Follow 3xx redirects
    #[serde(default)]
    pub follow_redirects: bool,

    /// Skip peer-certificate verification
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Worker pool size and ticket capacity, 1..=10
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u64,

    /// Required success rate in percent, 0..=100
    #[serde(default = "default_success_rate")]
    pub success_rate: u64,

    /// Target rate, PERIODIC only
    #[serde(default)]
    pub requests_per_second: Option<u64>,

    /// Total request count, FIXED_AMOUNT only
    #[serde(default)]
    pub number_of_requests: Option<u64>,
}

fn default_status_code() -> String {
    "200-299".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_concurrent() -> u64 {
    5
}

fn default_success_rate() -> u64 {
    100
}

/// Validated check parameters, latched at `prepare` and immutable afterwards
#[derive(Debug, Clone)]
pub struct CheckState {
    /// Execution identifier this engine is bound to
    pub execution_id: Uuid,
    /// Parsed target URL
    pub url: Url,
    /// Request method
    pub method: Method,
    /// Request body, sent when non-empty
    pub body: String,
    /// Headers applied to every attempt
    pub headers: HeaderMap,
    /// Resolved expected-status set
    pub expected_status_codes: StatusCodeSet,
    /// Body-substring check, `None` when disabled
    pub responses_contains: Option<String>,
    /// Response-time rule, `None` when disabled
    pub response_time_rule: Option<ResponseTimeRule>,
    /// TCP/TLS handshake limit per attempt
    pub connect_timeout: Duration,
    /// Total round-trip limit per attempt
    pub read_timeout: Duration,
    /// Follow 3xx redirects
    pub follow_redirects: bool,
    /// Skip peer-certificate verification
    pub insecure_skip_verify: bool,
    /// Worker pool size and ticket capacity
    pub max_concurrent: usize,
    /// Verdict threshold in percent
    pub success_rate_threshold: u64,
    /// Instant after which the externally controlled run counts as complete
    pub deadline: Instant,
    /// Scheduling mode
    pub mode: ScheduleMode,
    /// Ticker period derived from the mode
    pub delay_between_requests: Duration,
}

impl CheckState {
    /// Validate a raw configuration and latch it into an immutable state
    ///
    /// All validation failures are [`Error::Config`] soft errors carrying a
    /// caller-displayable message.
    pub fn resolve(execution_id: Uuid, kind: CheckKind, config: &CheckConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("invalid url '{}': {e}", config.url)))?;

        let method = resolve_method(&config.method)?;
        let headers = resolve_headers(&config.headers)?;
        let expected_status_codes = StatusCodeSet::parse(&config.status_code)?;

        if config.duration == 0 {
            return Err(Error::config("duration must be greater than 0"));
        }
        let duration = Duration::from_millis(config.duration);

        if config.connect_timeout == 0 {
            return Err(Error::config("connect timeout must be greater than 0"));
        }
        if config.read_timeout == 0 {
            return Err(Error::config("read timeout must be greater than 0"));
        }

        if !(1..=10).contains(&config.max_concurrent) {
            return Err(Error::Config(format!(
                "max concurrent must be between 1 and 10, got {}",
                config.max_concurrent
            )));
        }
        if config.success_rate > 100 {
            return Err(Error::Config(format!(
                "success rate must be between 0 and 100, got {}",
                config.success_rate
            )));
        }

        let response_time_rule = match config.response_time_mode {
            ResponseTimeMode::NoVerification => None,
            mode => {
                let bound = config.response_time.ok_or_else(|| {
                    Error::config("response time bound is required for the selected mode")
                })?;
                if bound == 0 {
                    return Err(Error::config("response time bound must be greater than 0"));
                }
                Some(ResponseTimeRule {
                    mode,
                    bound: Duration::from_millis(bound),
                })
            }
        };

        let (mode, delay_between_requests) = resolve_schedule(kind, config, duration)?;

        let responses_contains = if config.responses_contains.is_empty() {
            None
        } else {
            Some(config.responses_contains.clone())
        };

        Ok(Self {
            execution_id,
            url,
            method,
            body: config.body.clone(),
            headers,
            expected_status_codes,
            responses_contains,
            response_time_rule,
            connect_timeout: Duration::from_millis(config.connect_timeout),
            read_timeout: Duration::from_millis(config.read_timeout),
            follow_redirects: config.follow_redirects,
            insecure_skip_verify: config.insecure_skip_verify,
            max_concurrent: config.max_concurrent as usize,
            success_rate_threshold: config.success_rate,
            deadline: Instant::now() + duration,
            mode,
            delay_between_requests,
        })
    }

    /// Capacity of the metric buffer: twice the effective per-second
    /// production rate, at least 2
    pub fn metric_buffer_capacity(&self) -> usize {
        let delay_ms = self.delay_between_requests.as_millis().max(1) as u64;
        let per_second = (1000 / delay_ms).max(1);
        (2 * per_second).max(2) as usize
    }
}

fn resolve_method(raw: &str) -> Result<Method> {
    if raw.is_empty() {
        return Ok(Method::GET);
    }
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "HEAD" => Ok(Method::HEAD),
        "DELETE" => Ok(Method::DELETE),
        other => Err(Error::Config(format!("unsupported HTTP method '{other}'"))),
    }
}

fn resolve_headers(entries: &[HeaderEntry]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(entries.len());
    for entry in entries {
        let name = HeaderName::try_from(entry.key.as_str())
            .map_err(|_| Error::Config(format!("invalid header name '{}'", entry.key)))?;
        let value = HeaderValue::try_from(entry.value.as_str())
            .map_err(|_| Error::Config(format!("invalid value for header '{}'", entry.key)))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn resolve_schedule(
    kind: CheckKind,
    config: &CheckConfig,
    duration: Duration,
) -> Result<(ScheduleMode, Duration)> {
    match kind {
        CheckKind::Periodic => {
            let rps = config
                .requests_per_second
                .ok_or_else(|| Error::config("requests per second is required"))?;
            if rps == 0 {
                return Err(Error::config("requests per second must be at least 1"));
            }
            let delay_ms = 1000 / rps;
            if delay_ms == 0 {
                return Err(Error::Config(format!(
                    "requests per second of {rps} yields a delay below 1 ms"
                )));
            }
            Ok((
                ScheduleMode::Periodic {
                    requests_per_second: rps,
                },
                Duration::from_millis(delay_ms),
            ))
        }
        CheckKind::FixedAmount => {
            let n = config
                .number_of_requests
                .ok_or_else(|| Error::config("number of requests is required"))?;
            if n == 0 {
                return Err(Error::config("number of requests must be at least 1"));
            }
            // n = 1 fires only the immediate first ticket; the ticker must
            // never produce a second one within the run's lifetime.
            let delay = if n == 1 {
                duration + IDLE_DELAY
            } else {
                // Spread endpoint-inclusive: the last request lands at the
                // end of the interval.
                duration / (n - 1) as u32
            };
            if delay < Duration::from_millis(1) {
                return Err(Error::Config(format!(
                    "{n} requests within {} ms yields a delay below 1 ms",
                    duration.as_millis()
                )));
            }
            Ok((
                ScheduleMode::FixedAmount {
                    number_of_requests: n,
                },
                delay,
            ))
        }
    }
}
