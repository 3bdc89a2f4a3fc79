use serde::Serialize;

use crate::store::MetricsStore;
use crate::views::format_duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub label: &'static str,
    pub value: String,
}

/// Rolling aggregate counters as label/value rows
#[derive(Debug, Clone, Default)]
pub struct MetricsSummaryView;

impl MetricsSummaryView {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, store: &MetricsStore) -> Vec<SummaryLine> {
        let metrics = store.get_metrics();
        let line = |label, value: String| SummaryLine { label, value };

        vec![
            line("Total executions", metrics.total_executions.to_string()),
            line("Running", metrics.running_count.to_string()),
            line("Succeeded", metrics.success_count.to_string()),
            line("Failed", metrics.failure_count.to_string()),
            line("Success rate", format!("{:.1}%", metrics.success_rate)),
            line("Average duration", format_duration(metrics.avg_duration)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Execution, ExecutionStatus};
    use crate::persistence::MemoryKeyValueStore;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[test]
    fn test_summary_lines() {
        let mut store = MetricsStore::new(Arc::new(MemoryKeyValueStore::new())).unwrap();
        let t0 = Utc::now();
        store.add_execution(
            Execution::running("a", "scan", "cde", t0)
                .finished(ExecutionStatus::Success, t0 + Duration::seconds(3)),
        );
        store.add_execution(
            Execution::running("b", "scan", "cde", t0)
                .finished(ExecutionStatus::Failure, t0 + Duration::seconds(1)),
        );

        let lines = MetricsSummaryView::new().render(&store);
        let value = |label: &str| {
            lines
                .iter()
                .find(|l| l.label == label)
                .map(|l| l.value.clone())
                .unwrap()
        };
        assert_eq!(value("Total executions"), "2");
        assert_eq!(value("Success rate"), "50.0%");
        assert_eq!(value("Average duration"), "2.0s");
    }
}
