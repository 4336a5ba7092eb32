//! CLI argument parsing

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};

use httpprobe_core::config::{CheckConfig, CheckKind, HeaderEntry, ResponseTimeMode};

/// Synthetic HTTP probing tool
#[derive(Parser)]
#[command(name = "httpprobe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target URL
    pub url: String,

    /// HTTP method
    #[arg(short, long, default_value = "GET")]
    pub method: String,

    /// Request body
    #[arg(long, default_value = "")]
    pub body: String,

    /// Header as `name: value`, repeatable
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Expected status codes, e.g. "200-399;429" or "200;error"
    #[arg(long, default_value = "200-299")]
    pub status_codes: String,

    /// Substring every response body must contain
    #[arg(long, default_value = "")]
    pub contains: String,

    /// Response-time verification mode
    #[arg(long, value_enum, default_value = "no-verification")]
    pub response_time_mode: TimeMode,

    /// Response-time bound in milliseconds
    #[arg(long)]
    pub response_time_ms: Option<u64>,

    /// Run duration in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub duration_ms: u64,

    /// Connect timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub read_timeout_ms: u64,

    /// Follow 3xx redirects
    #[arg(long)]
    pub follow_redirects: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure_skip_verify: bool,

    /// Maximum concurrent requests (1-10)
    #[arg(long, default_value_t = 5)]
    pub max_concurrent: u64,

    /// Required success rate in percent
    #[arg(long, default_value_t = 100)]
    pub success_rate: u64,

    /// Requests per second (periodic mode)
    #[arg(long, conflicts_with = "requests")]
    pub rps: Option<u64>,

    /// Total number of requests spread over the duration (fixed-amount mode)
    #[arg(long)]
    pub requests: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Response-time verification mode as a CLI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeMode {
    /// Do not verify response times
    NoVerification,
    /// Response time must be at most the bound
    ShorterThan,
    /// Response time must be at least the bound
    LongerThan,
}

impl From<TimeMode> for ResponseTimeMode {
    fn from(mode: TimeMode) -> Self {
        match mode {
            TimeMode::NoVerification => ResponseTimeMode::NoVerification,
            TimeMode::ShorterThan => ResponseTimeMode::ShorterThan,
            TimeMode::LongerThan => ResponseTimeMode::LongerThan,
        }
    }
}

impl Cli {
    /// Turn the arguments into a check kind and configuration
    pub fn into_check(self) -> Result<(CheckKind, CheckConfig)> {
        let kind = match (self.rps, self.requests) {
            (Some(_), None) => CheckKind::Periodic,
            (None, Some(_)) => CheckKind::FixedAmount,
            (None, None) => bail!("one of --rps or --requests is required"),
            (Some(_), Some(_)) => unreachable!("clap rejects conflicting flags"),
        };

        let mut headers = Vec::with_capacity(self.headers.len());
        for raw in &self.headers {
            let Some((name, value)) = raw.split_once(':') else {
                bail!("invalid header '{raw}', expected 'name: value'");
            };
            headers.push(HeaderEntry {
                key: name.trim().to_string(),
                value: value.trim().to_string(),
            });
        }

        let config = CheckConfig {
            url: self.url,
            method: self.method,
            body: self.body,
            headers,
            status_code: self.status_codes,
            responses_contains: self.contains,
            response_time_mode: self.response_time_mode.into(),
            response_time: self.response_time_ms,
            duration: self.duration_ms,
            connect_timeout: self.connect_timeout_ms,
            read_timeout: self.read_timeout_ms,
            follow_redirects: self.follow_redirects,
            insecure_skip_verify: self.insecure_skip_verify,
            max_concurrent: self.max_concurrent,
            success_rate: self.success_rate,
            requests_per_second: self.rps,
            number_of_requests: self.requests,
        };

        Ok((kind, config))
    }
}
