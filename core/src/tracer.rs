//! Per-attempt timing capture

use std::time::{Duration, Instant};

/// Captures the two instants that bound an attempt's response time
///
/// `request_written` is taken immediately before the request is handed to the
/// client, `first_byte_received` when the response headers arrive. Their
/// difference is the response time reported on the metric; errors fall back
/// to total elapsed wall time.
#[derive(Debug, Clone, Copy)]
pub struct RequestTracer {
    request_written: Instant,
    first_byte_received: Option<Instant>,
}

impl RequestTracer {
    /// Start tracing; records `request_written` now
    pub fn start() -> Self {
        Self {
            request_written: Instant::now(),
            first_byte_received: None,
        }
    }

    /// Record the arrival of the first response byte
    pub fn mark_first_byte(&mut self) {
        self.first_byte_received = Some(Instant::now());
    }

    /// Time from request hand-off to first response byte
    ///
    /// Zero when no byte was ever received.
    pub fn response_time(&self) -> Duration {
        self.first_byte_received
            .map(|t| t.duration_since(self.request_written))
            .unwrap_or(Duration::ZERO)
    }

    /// Wall time elapsed since the request was handed off
    pub fn total_elapsed(&self) -> Duration {
        self.request_written.elapsed()
    }
}
