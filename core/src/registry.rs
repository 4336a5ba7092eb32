//! Process-wide engine registry
//!
//! Every lifecycle call looks its engine up exactly once by execution id.
//! The registry owns the engines; callers get short-lived `Arc` handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::checker::HttpChecker;

/// Concurrent mapping from execution id to engine
#[derive(Debug, Default)]
pub struct EngineRegistry {
    inner: Mutex<HashMap<Uuid, Arc<HttpChecker>>>,
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine under its execution id
    ///
    /// Replaces any engine previously registered under the same id.
    pub fn register(&self, execution_id: Uuid, engine: Arc<HttpChecker>) {
        self.inner
            .lock()
            .expect("registry lock")
            .insert(execution_id, engine);
    }

    /// Look up the engine for an execution id
    pub fn get(&self, execution_id: Uuid) -> Option<Arc<HttpChecker>> {
        self.inner
            .lock()
            .expect("registry lock")
            .get(&execution_id)
            .cloned()
    }

    /// Remove and return the engine for an execution id
    pub fn remove(&self, execution_id: Uuid) -> Option<Arc<HttpChecker>> {
        self.inner
            .lock()
            .expect("registry lock")
            .remove(&execution_id)
    }

    /// Number of registered engines
    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock").len()
    }

    /// Whether no engine is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
