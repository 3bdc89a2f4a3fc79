use serde_json::{json, Value};
use std::fmt::Write;

use crate::store::MetricsStore;
use crate::views::format_duration;

/// Unicode block characters for inline sparkline.
const SPARK_CHARS: &[char] = &[
    ' ', '\u{2581}', '\u{2582}', '\u{2583}', '\u{2584}', '\u{2585}', '\u{2586}', '\u{2587}',
    '\u{2588}',
];

/// Chart-ready dashboard payload and a text fallback
#[derive(Debug, Clone, Default)]
pub struct DashboardView;

impl DashboardView {
    pub fn new() -> Self {
        Self
    }

    /// Message posted to the dashboard webview
    pub fn payload(&self, store: &MetricsStore) -> Value {
        json!({
            "type": "update",
            "metrics": store.get_metrics(),
            "dashboard": store.get_dashboard_data(),
        })
    }

    pub fn render_text(&self, store: &MetricsStore) -> String {
        let metrics = store.get_metrics();
        let data = store.get_dashboard_data();
        let mut out = String::new();

        let _ = writeln!(
            out,
            "Executions: {} ({} running)  success rate {:.1}%  avg {}",
            metrics.total_executions,
            metrics.running_count,
            metrics.success_rate,
            format_duration(metrics.avg_duration)
        );
        let _ = writeln!(
            out,
            "Success/failure: {}/{}",
            data.success_failure_ratio.success, data.success_failure_ratio.failure
        );
        let _ = writeln!(out, "Latency: [{}]", sparkline(&metrics.durations));

        if !data.top_slowest_tools.is_empty() {
            let _ = writeln!(out, "Slowest tools:");
            for (rank, tool) in data.top_slowest_tools.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. {:<24} {}",
                    rank + 1,
                    tool.tool,
                    format_duration(tool.avg_duration)
                );
            }
        }

        if !data.execution_timeline.is_empty() {
            let _ = writeln!(out, "Recent:");
            for point in &data.execution_timeline {
                let _ = writeln!(
                    out,
                    "  {} {:<24} {}",
                    point.timestamp.format("%H:%M:%S"),
                    point.tool,
                    format_duration(point.duration)
                );
            }
        }

        out
    }
}

/// Scale values against the maximum and map to block characters
pub fn sparkline(values: &[f64]) -> String {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return " ".repeat(values.len());
    }
    values
        .iter()
        .map(|&v| {
            let normalized = ((v / max) * 8.0).round().max(0.0) as usize;
            SPARK_CHARS[normalized.min(SPARK_CHARS.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Execution, ExecutionStatus};
    use crate::persistence::MemoryKeyValueStore;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[test]
    fn test_sparkline_scales_to_max() {
        assert_eq!(sparkline(&[]), "");
        assert_eq!(sparkline(&[0.0, 0.0]), "  ");
        assert_eq!(sparkline(&[1.0, 2.0]), "\u{2584}\u{2588}");
    }

    #[test]
    fn test_payload_shape() {
        let mut store = MetricsStore::new(Arc::new(MemoryKeyValueStore::new())).unwrap();
        let t0 = Utc::now();
        store.add_execution(
            Execution::running("a", "scan", "cde", t0)
                .finished(ExecutionStatus::Success, t0 + Duration::seconds(2)),
        );

        let payload = DashboardView::new().payload(&store);
        assert_eq!(payload["type"], "update");
        assert_eq!(payload["metrics"]["successCount"], 1);
        assert_eq!(payload["dashboard"]["successFailureRatio"]["success"], 1);
        assert_eq!(payload["dashboard"]["topSlowestTools"][0]["tool"], "scan");

        let text = DashboardView::new().render_text(&store);
        assert!(text.contains("Success/failure: 1/0"));
        assert!(text.contains("1. scan"));
    }
}
