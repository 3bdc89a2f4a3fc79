//! Progress event ingestion
//!
//! MCP proxies broadcast JSON progress events while a tool call runs:
//!
//! ```json
//! {"server": "CDE", "tool": "scanProject", "percentage": 0.4, "elapsed": 1.2, "message": "Scanning"}
//! ```
//!
//! Events may also carry an `id` (the JSON-RPC request id), a terminal
//! `status`, or an `error` string. The ingestor folds them into store calls.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::execution::{clamp_percentage, Execution, ExecutionStatus, ExecutionUpdate};
use crate::store::MetricsStore;

/// Event emitted when execution state changes
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutionEvent {
    Started(Execution),
    Progress(Execution),
    Completed(Execution),
}

impl ExecutionEvent {
    pub fn execution(&self) -> &Execution {
        match self {
            ExecutionEvent::Started(exec)
            | ExecutionEvent::Progress(exec)
            | ExecutionEvent::Completed(exec) => exec,
        }
    }
}

/// Progress event as broadcast by the monitoring proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(default, deserialize_with = "id_from_any")]
    pub id: Option<String>,
    pub server: String,
    pub tool: String,
    #[serde(default)]
    pub percentage: f64,
    /// Seconds since the tool call started
    #[serde(default)]
    pub elapsed: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

/// JSON-RPC ids may be numbers or strings
fn id_from_any<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl ProgressEvent {
    /// Key the execution is tracked under
    pub fn execution_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}:{}", self.server, self.tool),
        }
    }

    /// Terminal status implied by this event, if any
    pub fn terminal_status(&self) -> Option<ExecutionStatus> {
        match self.status {
            Some(status) if status.is_terminal() => Some(status),
            _ if self.error.is_some() => Some(ExecutionStatus::Failure),
            _ if self.percentage >= 1.0 => Some(ExecutionStatus::Success),
            _ => None,
        }
    }

    fn message_text(&self) -> Option<String> {
        self.error.clone().or_else(|| self.message.clone())
    }

    fn started_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.elapsed {
            Some(secs) if secs.is_finite() && secs > 0.0 => {
                let millis = (secs * 1000.0).round();
                let started = Duration::try_milliseconds(millis as i64)
                    .filter(|_| millis < i64::MAX as f64)
                    .and_then(|elapsed| now.checked_sub_signed(elapsed));
                match started {
                    Some(started) => started,
                    None => {
                        warn!(elapsed = secs, tool = %self.tool, "Elapsed time out of range, using event time as start");
                        now
                    }
                }
            }
            _ => now,
        }
    }
}

/// Folds progress events into a `MetricsStore`
#[derive(Debug, Default)]
pub struct ProgressIngestor;

impl ProgressIngestor {
    pub fn new() -> Self {
        Self
    }

    /// Apply an event at the current time
    pub fn apply(&self, store: &mut MetricsStore, event: &ProgressEvent) -> ExecutionEvent {
        self.apply_at(store, event, Utc::now())
    }

    /// Apply an event observed at `now`
    pub fn apply_at(
        &self,
        store: &mut MetricsStore,
        event: &ProgressEvent,
        now: DateTime<Utc>,
    ) -> ExecutionEvent {
        let id = event.execution_id();
        let known = store
            .get_running_executions()
            .into_iter()
            .any(|exec| exec.id == id);

        if !known {
            let mut exec = Execution::running(id.as_str(), &event.tool, &event.server, event.started_at(now));
            exec.message = event.message_text();
            exec.percentage = clamp_percentage(event.percentage);

            if event.terminal_status().is_none() {
                store.add_execution(exec.clone());
                debug!(execution_id = %id, tool = %event.tool, "Started execution from progress event");
                return ExecutionEvent::Started(exec);
            }

            // Completion without a prior start still passes through the active set
            exec.percentage = 0.0;
            store.add_execution(exec);
        }

        match event.terminal_status() {
            Some(status) => {
                let mut update = ExecutionUpdate::finish(status, now);
                update.message = event.message_text();
                store.update_execution(&id, update);

                let finished = store.get_running_executions().into_iter().find(|exec| exec.id == id);
                let finished = match finished {
                    Some(exec) => exec,
                    None => Execution::running(id.as_str(), &event.tool, &event.server, now)
                        .finished(status, now),
                };
                store.add_execution(finished.clone());
                ExecutionEvent::Completed(finished)
            }
            None => {
                let update = ExecutionUpdate {
                    percentage: Some(event.percentage),
                    message: event.message_text(),
                    ..Default::default()
                };
                store.update_execution(&id, update);
                let current = store
                    .get_execution(&id)
                    .unwrap_or_else(|| Execution::running(id.as_str(), &event.tool, &event.server, now));
                ExecutionEvent::Progress(current)
            }
        }
    }
}
