use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::config::MetricsConfig;
use crate::counters::ExecutionCounters;
use crate::error::Result;
use crate::execution::{clamp_percentage, Execution, ExecutionStatus, ExecutionUpdate};
use crate::persistence::{HistorySnapshot, KeyValueStore};
use crate::projections::{self, DashboardData, ToolMetrics};

/// Change signal broadcast after every mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Changed,
}

/// Handle returned by `MetricsStore::subscribe`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChangeCallback = Box<dyn Fn() + Send + Sync>;

/// Single source of truth for tool execution telemetry
pub struct MetricsStore {
    /// In-flight executions
    active: HashMap<String, Execution>,

    /// Completed executions, newest first
    history: VecDeque<Execution>,

    history_limit: usize,

    backend: Arc<dyn KeyValueStore>,

    storage_key: String,

    counters: ExecutionCounters,

    /// Synchronous observers, in registration order
    subscribers: Vec<(SubscriptionId, ChangeCallback)>,

    next_subscription: u64,

    /// Event broadcaster for async consumers
    event_sender: broadcast::Sender<StoreEvent>,
}

impl MetricsStore {
    /// Create a store with default configuration, restoring persisted history
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_config(backend, &MetricsConfig::default())
    }

    /// Create a store with explicit configuration, restoring persisted history
    pub fn with_config(backend: Arc<dyn KeyValueStore>, config: &MetricsConfig) -> Result<Self> {
        let (tx, _) = broadcast::channel(64);
        let history_limit = config.history_limit.max(1);

        let mut history: VecDeque<Execution> =
            load_history(backend.as_ref(), &config.storage_key).into();
        history.truncate(history_limit);

        info!(
            restored = history.len(),
            history_limit,
            storage_key = %config.storage_key,
            "Metrics store initialized"
        );

        Ok(Self {
            active: HashMap::new(),
            history,
            history_limit,
            backend,
            storage_key: config.storage_key.clone(),
            counters: ExecutionCounters::new()?,
            subscribers: Vec::new(),
            next_subscription: 0,
            event_sender: tx,
        })
    }

    /// Register a change observer; it runs before each mutating call returns
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove an observer; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Subscribe to change events from async code
    pub fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_sender.subscribe()
    }

    /// Record a running or completed execution
    #[instrument(skip(self, exec), fields(execution_id = %exec.id, tool = %exec.tool, status = %exec.status))]
    pub fn add_execution(&mut self, mut exec: Execution) {
        exec.sync_duration();
        exec.percentage = clamp_percentage(exec.percentage);

        if exec.is_running() {
            if self.active.insert(exec.id.clone(), exec).is_none() {
                self.counters.execution_started();
            }
            debug!("Execution running");
        } else {
            // Terminal records that never ran through the active set count as started too
            if self.active.remove(&exec.id).is_none() {
                self.counters.execution_started();
            }

            match exec.status {
                ExecutionStatus::Failure => self.counters.execution_failed(exec.duration),
                _ => self.counters.execution_succeeded(exec.duration),
            }
            info!(duration = ?exec.duration, "Execution completed");

            self.history.push_front(exec);
            if self.history.len() > self.history_limit {
                let evicted = self.history.len() - self.history_limit;
                self.history.truncate(self.history_limit);
                self.counters.history_evicted(evicted);
            }
        }

        self.changed();
    }

    /// Merge a partial update into an active execution.
    ///
    /// Returns false and leaves the store untouched if `id` is not active.
    /// A terminal status set here does not move the record into history;
    /// that happens on the next `add_execution` for the same id.
    #[instrument(skip(self, update))]
    pub fn update_execution(&mut self, id: &str, update: ExecutionUpdate) -> bool {
        let Some(exec) = self.active.get_mut(id) else {
            debug!("Ignoring update for inactive execution");
            return false;
        };

        exec.apply(update);
        debug!(status = %exec.status, percentage = exec.percentage, "Execution updated");

        self.changed();
        true
    }

    /// Completed executions, newest first
    pub fn get_history(&self, limit: usize) -> Vec<Execution> {
        self.history.iter().take(limit).cloned().collect()
    }

    /// Executions currently in the active set
    pub fn get_running_executions(&self) -> Vec<Execution> {
        self.active.values().cloned().collect()
    }

    /// Look up an execution, active first, then the newest history entry
    pub fn get_execution(&self, id: &str) -> Option<Execution> {
        self.active
            .get(id)
            .or_else(|| self.history.iter().find(|exec| exec.id == id))
            .cloned()
    }

    pub fn get_metrics(&self) -> ToolMetrics {
        projections::tool_metrics(&self.history, self.active.len())
    }

    pub fn get_dashboard_data(&self) -> DashboardData {
        projections::dashboard_data(&self.history)
    }

    /// Drop all active and completed executions
    #[instrument(skip(self))]
    pub fn clear(&mut self) {
        let dropped = self.history.len() + self.active.len();
        self.active.clear();
        self.history.clear();
        info!(dropped, "Metrics store cleared");
        self.changed();
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Prometheus exposition text for this store's counters
    pub fn render_prometheus(&self) -> Result<String> {
        self.counters.render_text()
    }

    /// Persist, then notify observers
    fn changed(&mut self) {
        self.counters.set_active(self.active.len());
        self.persist();

        for (_, callback) in &self.subscribers {
            callback();
        }
        let _ = self.event_sender.send(StoreEvent::Changed);
    }

    /// Best-effort snapshot write; failures are logged only
    fn persist(&self) {
        let snapshot = HistorySnapshot {
            history: self.history.iter().cloned().collect(),
        };
        let value = match serde_json::to_value(&snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to serialize history snapshot");
                return;
            }
        };
        if let Err(e) = self.backend.set(&self.storage_key, value) {
            warn!(error = %e, storage_key = %self.storage_key, "Failed to persist history snapshot");
        }
    }
}

/// Read the persisted snapshot; anything unreadable yields an empty history
fn load_history(backend: &dyn KeyValueStore, key: &str) -> Vec<Execution> {
    let value = match backend.get(key) {
        Ok(Some(value)) => value,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, storage_key = %key, "Failed to read history snapshot");
            return Vec::new();
        }
    };

    match serde_json::from_value::<HistorySnapshot>(value) {
        Ok(snapshot) => snapshot
            .history
            .into_iter()
            .filter(|exec| !exec.is_running())
            .map(|mut exec| {
                exec.sync_duration();
                exec
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, storage_key = %key, "Discarding malformed history snapshot");
            Vec::new()
        }
    }
}
