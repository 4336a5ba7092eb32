//! Ticket scheduler
//!
//! Paces ticket issuance at the derived cadence. The first ticket is placed
//! immediately so the first request never waits for a tick. Every later tick
//! attempts a non-blocking push into the work channel; a full channel means
//! all workers are busy and the tick is dropped, which is the engine's only
//! form of backpressure. `requested` counts placed tickets, never ticks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Ticket;
use crate::config::{CheckState, ScheduleMode};
use crate::counters::Counters;

/// Run the scheduler until the target is reached or the token fires
///
/// Returning drops the work sender, which closes the channel; workers drain
/// any buffered tickets and exit on end-of-stream.
pub(crate) async fn run(
    state: Arc<CheckState>,
    counters: Arc<Counters>,
    work: mpsc::Sender<Ticket>,
    cancel: CancellationToken,
) {
    // The channel is fresh and has capacity for at least one ticket.
    if work.try_send(Ticket).is_ok() {
        let requested = counters.add_requested();
        debug!(requested, "scheduled first request");
        if target_reached(&state, requested) {
            debug!("request target reached, scheduler shutting down");
            return;
        }
    }

    let delay = state.delay_between_requests;
    let mut ticker = time::interval_at(Instant::now() + delay, delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("scheduler cancelled");
                return;
            }

            _ = ticker.tick() => {
                match work.try_send(Ticket) {
                    Ok(()) => {
                        let requested = counters.add_requested();
                        debug!(requested, "scheduled request");
                        if target_reached(&state, requested) {
                            debug!("request target reached, scheduler shutting down");
                            return;
                        }
                    }
                    Err(TrySendError::Full(_)) => {
                        debug!("dropping tick, all workers busy");
                    }
                    Err(TrySendError::Closed(_)) => return,
                }
            }
        }
    }
}

fn target_reached(state: &CheckState, requested: u64) -> bool {
    match state.mode {
        ScheduleMode::FixedAmount { number_of_requests } => requested >= number_of_requests,
        ScheduleMode::Periodic { .. } => false,
    }
}
