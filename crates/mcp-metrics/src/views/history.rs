use serde::Serialize;

use crate::execution::{Execution, ExecutionStatus};
use crate::store::MetricsStore;
use crate::views::format_duration;

/// Rows shown by default in the history list
pub const DEFAULT_HISTORY_ROWS: usize = 50;

/// One row of the history tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub execution_id: String,
    pub label: String,
    pub description: String,
    pub tooltip: String,
    pub icon: &'static str,
}

/// Navigable list of recent executions
#[derive(Debug, Clone)]
pub struct HistoryView {
    limit: usize,
}

impl Default for HistoryView {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_ROWS)
    }
}

impl HistoryView {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Running executions first, then completed ones newest first
    pub fn render(&self, store: &MetricsStore) -> Vec<HistoryItem> {
        let mut running = store.get_running_executions();
        running.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let history = store.get_history(self.limit);

        running
            .iter()
            .chain(history.iter())
            .take(self.limit)
            .map(item_for)
            .collect()
    }
}

fn item_for(exec: &Execution) -> HistoryItem {
    let description = match (exec.status, exec.duration) {
        (ExecutionStatus::Running, _) => format!("{:.0}%", exec.percentage * 100.0),
        (_, Some(duration)) => format_duration(duration),
        (status, None) => status.to_string(),
    };

    let mut tooltip = format!(
        "{} on {}\nstatus: {}\nstarted: {}",
        exec.tool,
        exec.server,
        exec.status,
        exec.start_time.to_rfc3339()
    );
    if let Some(message) = &exec.message {
        tooltip.push('\n');
        tooltip.push_str(message);
    }

    HistoryItem {
        execution_id: exec.id.clone(),
        label: exec.tool.clone(),
        description,
        tooltip,
        icon: match exec.status {
            ExecutionStatus::Running => "sync~spin",
            ExecutionStatus::Success => "pass",
            ExecutionStatus::Failure => "error",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryKeyValueStore;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[test]
    fn test_rows_put_running_first() {
        let mut store = MetricsStore::new(Arc::new(MemoryKeyValueStore::new())).unwrap();
        let t0 = Utc::now();
        store.add_execution(
            Execution::running("a", "scan", "cde", t0)
                .finished(ExecutionStatus::Failure, t0 + Duration::milliseconds(400)),
        );
        store.add_execution(Execution::running("b", "build", "cde", t0));

        let rows = HistoryView::new(10).render(&store);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "build");
        assert_eq!(rows[0].icon, "sync~spin");
        assert_eq!(rows[0].description, "0%");
        assert_eq!(rows[1].icon, "error");
        assert_eq!(rows[1].description, "400ms");
    }

    #[test]
    fn test_limit_caps_rows() {
        let mut store = MetricsStore::new(Arc::new(MemoryKeyValueStore::new())).unwrap();
        let t0 = Utc::now();
        for i in 0..5 {
            store.add_execution(
                Execution::running(format!("e{}", i), "scan", "cde", t0)
                    .finished(ExecutionStatus::Success, t0 + Duration::seconds(1)),
            );
        }
        assert_eq!(HistoryView::new(3).render(&store).len(), 3);
    }
}
