//! Engine assembly and teardown

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::{scheduler, worker, Ticket};
use crate::client::build_client;
use crate::config::{CheckState, ScheduleMode};
use crate::counters::Counters;
use crate::error::Result;
use crate::metrics::Metric;

/// Extra wait granted beyond the read timeout before workers are abandoned
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// One execution's probing engine
///
/// Constructed at `prepare`: the worker pool spawns immediately but blocks on
/// the empty work channel, so no request is issued before `start`. The
/// scheduler spawns at `start` and owns the work sender; dropping it (target
/// reached or cancellation) closes the channel and winds the workers down.
pub struct HttpChecker {
    state: Arc<CheckState>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    scheduler_cancel: CancellationToken,
    tracker: TaskTracker,
    work_tx: Mutex<Option<mpsc::Sender<Ticket>>>,
    metrics_rx: AsyncMutex<mpsc::Receiver<Metric>>,
}

impl HttpChecker {
    /// Build the engine for a validated state and spawn its worker pool
    pub fn new(state: CheckState) -> Result<Self> {
        let state = Arc::new(state);
        let client: Client = build_client(&state)?;
        let counters = Arc::new(Counters::new());
        let cancel = CancellationToken::new();
        let scheduler_cancel = cancel.child_token();
        let tracker = TaskTracker::new();

        let (work_tx, work_rx) = mpsc::channel(state.max_concurrent);
        let (metrics_tx, metrics_rx) = mpsc::channel(state.metric_buffer_capacity());
        let work_rx = Arc::new(AsyncMutex::new(work_rx));

        for id in 0..state.max_concurrent {
            tracker.spawn(worker::run(worker::WorkerContext {
                id,
                state: Arc::clone(&state),
                client: client.clone(),
                work: Arc::clone(&work_rx),
                metrics: metrics_tx.clone(),
                counters: Arc::clone(&counters),
                cancel: cancel.clone(),
            }));
        }
        tracker.close();

        debug!(
            execution_id = %state.execution_id,
            workers = state.max_concurrent,
            "engine prepared"
        );

        Ok(Self {
            state,
            counters,
            cancel,
            scheduler_cancel,
            tracker,
            work_tx: Mutex::new(Some(work_tx)),
            metrics_rx: AsyncMutex::new(metrics_rx),
        })
    }

    /// Start scheduling tickets
    ///
    /// The first ticket is placed immediately. Calling start a second time is
    /// a no-op.
    pub fn start(&self) {
        let Some(work_tx) = self.work_tx.lock().expect("work sender lock").take() else {
            debug!(execution_id = %self.state.execution_id, "scheduler already started");
            return;
        };

        self.tracker.spawn(scheduler::run(
            Arc::clone(&self.state),
            Arc::clone(&self.counters),
            work_tx,
            self.scheduler_cancel.clone(),
        ));
    }

    /// Stop issuing tickets without disturbing in-flight attempts
    ///
    /// Used when a completed fixed-amount run is observed at `status`; the
    /// caller still follows up with `stop` for the verdict.
    pub fn stop_scheduling(&self) {
        self.scheduler_cancel.cancel();
    }

    /// Whether the run's stop rule is satisfied
    ///
    /// Fixed-amount runs complete when the scheduler has issued the full
    /// ticket count, or once the deadline has passed. Periodic runs never
    /// complete on their own; the caller decides when to stop.
    pub fn is_completed(&self) -> bool {
        match self.state.mode {
            ScheduleMode::FixedAmount { number_of_requests } => {
                self.counters.requested() >= number_of_requests
                    || Instant::now() >= self.state.deadline
            }
            ScheduleMode::Periodic { .. } => false,
        }
    }

    /// Drain whatever is currently buffered, without blocking
    pub async fn drain_metrics(&self) -> Vec<Metric> {
        let mut rx = self.metrics_rx.lock().await;
        let mut drained = Vec::new();
        while let Ok(metric) = rx.try_recv() {
            drained.push(metric);
        }
        drained
    }

    /// Cancel all work and wait for the tasks to exit
    ///
    /// The wait is bounded by the read timeout plus a small grace; workers
    /// still running after that are abandoned, their counters remain valid.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        // Closes the work channel even when start was never called.
        self.work_tx.lock().expect("work sender lock").take();

        let bound = self.state.read_timeout + SHUTDOWN_GRACE;
        if timeout(bound, self.tracker.wait()).await.is_err() {
            warn!(
                execution_id = %self.state.execution_id,
                "workers did not exit within {bound:?}, abandoning"
            );
        }
    }

    /// The engine's counters
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// The latched check parameters
    pub fn state(&self) -> &CheckState {
        &self.state
    }
}

impl std::fmt::Debug for HttpChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChecker")
            .field("execution_id", &self.state.execution_id)
            .field("mode", &self.state.mode)
            .field("counters", &self.counters.snapshot())
            .finish()
    }
}
