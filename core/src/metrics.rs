//! Per-attempt measurement records
//!
//! Every attempt emits exactly one [`Metric`]: either the response shape
//! (carrying `http_status` and the verification tags) or the transport-error
//! shape (carrying `error`). The record serializes to the wire format the
//! consumer expects, with the tag map under the `metric` key.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Name carried by every record this engine produces
pub const METRIC_NAME: &str = "response_time";

/// One measurement record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name, always [`METRIC_NAME`]
    pub name: String,

    /// When the measurement was taken
    pub timestamp: DateTime<Utc>,

    /// Measured value in milliseconds
    pub value: f64,

    /// Tag map: `url`, one of `http_status`/`error`, `expected_http_status`,
    /// and the optional verification tags
    #[serde(rename = "metric")]
    pub tags: BTreeMap<String, String>,
}

impl Metric {
    /// Record for an attempt that received a response
    ///
    /// `body_ok` and `time_ok` are `None` when the respective check is not
    /// configured; their tags are omitted in that case.
    pub fn for_response(
        url: &Url,
        status: u16,
        response_time_ms: f64,
        status_expected: bool,
        body_ok: Option<bool>,
        time_ok: Option<bool>,
    ) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("url".to_string(), url.to_string());
        tags.insert("http_status".to_string(), status.to_string());
        tags.insert(
            "expected_http_status".to_string(),
            status_expected.to_string(),
        );
        if let Some(ok) = body_ok {
            tags.insert("response_constraints_fulfilled".to_string(), ok.to_string());
        }
        if let Some(ok) = time_ok {
            tags.insert(
                "response_time_constraints_fulfilled".to_string(),
                ok.to_string(),
            );
        }

        Self {
            name: METRIC_NAME.to_string(),
            timestamp: Utc::now(),
            value: response_time_ms,
            tags,
        }
    }

    /// Record for an attempt that failed in transport
    pub fn for_transport_error(
        url: &Url,
        error: &str,
        elapsed_ms: f64,
        status_expected: bool,
    ) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("url".to_string(), url.to_string());
        tags.insert("error".to_string(), error.to_string());
        tags.insert(
            "expected_http_status".to_string(),
            status_expected.to_string(),
        );

        Self {
            name: METRIC_NAME.to_string(),
            timestamp: Utc::now(),
            value: elapsed_ms,
            tags,
        }
    }

    /// The `http_status` tag, present on the response shape
    pub fn http_status(&self) -> Option<&str> {
        self.tags.get("http_status").map(String::as_str)
    }

    /// The `error` tag, present on the transport-error shape
    pub fn error(&self) -> Option<&str> {
        self.tags.get("error").map(String::as_str)
    }
}
