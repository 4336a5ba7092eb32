//! Worker loop: one request attempt per ticket
//!
//! Workers are long-lived tasks sharing the ticket receiver. Each ticket
//! becomes one freshly built request; the outcome runs through the verifier
//! and produces exactly one metric. Cancellation observed at any suspension
//! point ends the attempt silently: no metric, no counter change.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use super::Ticket;
use crate::client::build_request;
use crate::config::CheckState;
use crate::counters::Counters;
use crate::metrics::Metric;
use crate::tracer::RequestTracer;
use crate::verifier;

/// Everything one worker task needs
pub(crate) struct WorkerContext {
    pub id: usize,
    pub state: Arc<CheckState>,
    pub client: Client,
    pub work: Arc<Mutex<mpsc::Receiver<Ticket>>>,
    pub metrics: mpsc::Sender<Metric>,
    pub counters: Arc<Counters>,
    pub cancel: CancellationToken,
}

/// Run the worker until the work channel closes or the token fires
pub(crate) async fn run(ctx: WorkerContext) {
    debug!(worker_id = ctx.id, "worker started");

    loop {
        let ticket = {
            let mut work = ctx.work.lock().await;
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                ticket = work.recv() => ticket,
            }
        };
        if ticket.is_none() {
            break;
        }
        perform_attempt(&ctx).await;
    }

    debug!(worker_id = ctx.id, "worker finished");
}

async fn perform_attempt(ctx: &WorkerContext) {
    let state = &ctx.state;
    let request = build_request(&ctx.client, state);

    if tracing::enabled!(tracing::Level::TRACE) {
        trace!(
            headers = ?state.headers,
            body = %state.body,
            "requesting {} {}", state.method, state.url
        );
    } else {
        debug!("requesting {} {}", state.method, state.url);
    }

    let mut tracer = RequestTracer::start();
    ctx.counters.add_started();

    let result = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return,
        result = request.send() => result,
    };

    match result {
        Err(err) => {
            error!(error = %err, "failed to execute request");
            let expected = verifier::error_expected(state);
            let elapsed_ms = tracer.total_elapsed().as_secs_f64() * 1000.0;
            let metric =
                Metric::for_transport_error(&state.url, &err.to_string(), elapsed_ms, expected);
            emit(ctx, metric).await;
            if expected {
                ctx.counters.add_success();
            } else {
                ctx.counters.add_failed();
            }
        }
        Ok(response) => {
            tracer.mark_first_byte();
            let status = response.status().as_u16();

            // Read eagerly; the substring check needs the bytes and the
            // connection must be fully consumed either way.
            let body = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return,
                body = response.bytes() => body,
            };
            let body_bytes = match &body {
                Ok(bytes) => Some(bytes.as_ref()),
                Err(err) => {
                    error!(error = %err, "failed to read response body");
                    None
                }
            };

            if tracing::enabled!(tracing::Level::TRACE) {
                trace!(
                    status,
                    body = %String::from_utf8_lossy(body_bytes.unwrap_or_default()),
                    "got response for {} {}", state.method, state.url
                );
            } else {
                debug!(
                    status,
                    body_size = body_bytes.map(<[u8]>::len).unwrap_or(0),
                    "got response for {} {}", state.method, state.url
                );
            }

            let response_time = tracer.response_time();
            let verification = verifier::verify_response(state, status, body_bytes, response_time);
            let metric = Metric::for_response(
                &state.url,
                status,
                response_time.as_secs_f64() * 1000.0,
                verification.status_expected,
                verification.body_ok,
                verification.time_ok,
            );
            emit(ctx, metric).await;
            if verification.passed() {
                ctx.counters.add_success();
            } else {
                ctx.counters.add_failed();
            }
        }
    }
}

/// Send one metric into the buffer
///
/// Blocks when the buffer is full, which is the backpressure the caller's
/// polling cadence is expected to absorb. A send still pending when the
/// engine is being torn down is abandoned so shutdown cannot deadlock on an
/// undrained buffer.
async fn emit(ctx: &WorkerContext, metric: Metric) {
    tokio::select! {
        biased;
        result = ctx.metrics.send(metric) => {
            if result.is_err() {
                debug!(worker_id = ctx.id, "metric buffer closed");
            }
        }
        _ = ctx.cancel.cancelled() => {
            debug!(worker_id = ctx.id, "dropping metric, engine stopping");
        }
    }
}
