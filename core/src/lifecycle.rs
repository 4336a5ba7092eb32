//! Lifecycle facade: prepare, start, status, stop
//!
//! [`ProbeService`] is the public entry point the surrounding orchestration
//! layer calls over its transport. Each call performs one registry lookup;
//! everything else is owned by the engine behind it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::checker::HttpChecker;
use crate::config::{CheckConfig, CheckKind, CheckState};
use crate::error::{Error, Result};
use crate::metrics::Metric;
use crate::registry::EngineRegistry;
use crate::verifier::Verdict;

/// Result of a `status` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// Whether the run's stop rule is satisfied
    pub completed: bool,
    /// Metrics produced since the previous `status`/`stop` call
    pub metrics: Vec<Metric>,
}

/// Failure attached to a stop report when the verdict is negative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    /// Caller-displayable failure title
    pub title: String,
    /// Failure status, always `"failed"`
    pub status: String,
}

impl CheckFailure {
    fn new(title: String) -> Self {
        Self {
            title,
            status: "failed".to_string(),
        }
    }
}

/// Result of a `stop` call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopReport {
    /// Metrics drained after all workers exited
    pub metrics: Vec<Metric>,
    /// Present when the success rate missed the threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CheckFailure>,
}

/// Public facade over the engine registry
#[derive(Debug, Default)]
pub struct ProbeService {
    registry: EngineRegistry,
}

impl ProbeService {
    /// Create a service with an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and allocate an engine
    ///
    /// The worker pool spawns blocked on the empty work channel; no request
    /// is issued until `start`. Validation failures are soft errors and
    /// leave no engine behind.
    pub fn prepare(
        &self,
        execution_id: Uuid,
        kind: CheckKind,
        config: &CheckConfig,
    ) -> Result<()> {
        let state = CheckState::resolve(execution_id, kind, config)?;
        let engine = HttpChecker::new(state)?;
        self.registry.register(execution_id, Arc::new(engine));
        Ok(())
    }

    /// Begin scheduling; the first request fires immediately
    pub fn start(&self, execution_id: Uuid) -> Result<()> {
        let engine = self.lookup(execution_id)?;
        engine.start();
        Ok(())
    }

    /// Drain buffered metrics and report completion
    ///
    /// Non-blocking. When a fixed-amount run reports completion the caller
    /// is expected to follow up with `stop` to collect the verdict.
    pub async fn status(&self, execution_id: Uuid) -> Result<StatusReport> {
        let engine = self.lookup(execution_id)?;
        let completed = engine.is_completed();
        if completed {
            engine.stop_scheduling();
            debug!(%execution_id, "check completed");
        }
        let metrics = engine.drain_metrics().await;
        Ok(StatusReport { completed, metrics })
    }

    /// Terminate the run and render the verdict
    ///
    /// Cancels outstanding work, waits for the workers to exit (bounded by
    /// the read timeout plus a grace period), drains the remaining metrics
    /// and evaluates the success rate. Stopping an unknown execution is a
    /// no-op, which makes the call idempotent.
    pub async fn stop(&self, execution_id: Uuid) -> Result<StopReport> {
        let Some(engine) = self.registry.remove(execution_id) else {
            debug!(%execution_id, "no engine registered, stop was already called");
            return Ok(StopReport::default());
        };

        engine.shutdown().await;
        let metrics = engine.drain_metrics().await;

        let snapshot = engine.counters().snapshot();
        let threshold = engine.state().success_rate_threshold;
        let verdict = Verdict::evaluate(snapshot.success, snapshot.failed, threshold);

        let error = match verdict {
            Verdict::Passed { rate } => {
                info!(%execution_id, "success rate ({rate:.2}%) was above/equal {threshold}%");
                None
            }
            Verdict::Failed { title } => {
                info!(%execution_id, "{title}");
                Some(CheckFailure::new(title))
            }
        };

        Ok(StopReport { metrics, error })
    }

    fn lookup(&self, execution_id: Uuid) -> Result<Arc<HttpChecker>> {
        self.registry
            .get(execution_id)
            .ok_or(Error::UnknownExecution(execution_id))
    }
}
