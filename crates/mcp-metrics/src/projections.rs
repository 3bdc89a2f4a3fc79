//! Derived read-only views over store state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::execution::{Execution, ExecutionStatus};

/// Duration samples exposed for histogram rendering
pub const DURATION_SAMPLES: usize = 50;

/// Timeline points on the dashboard
pub const TIMELINE_POINTS: usize = 20;

/// Tools listed in the slowest ranking
pub const SLOWEST_TOOLS: usize = 5;

/// Rolling aggregate counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetrics {
    pub total_executions: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub running_count: usize,
    /// Mean duration in seconds over history entries that have one
    pub avg_duration: f64,
    /// Percent of history entries that succeeded
    pub success_rate: f64,
    /// Most recent durations, oldest first
    pub durations: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub tool: String,
    pub duration: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessFailureRatio {
    pub success: usize,
    pub failure: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolLatency {
    pub tool: String,
    pub avg_duration: f64,
}

/// Chart-ready projections for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub execution_timeline: Vec<TimelinePoint>,
    pub success_failure_ratio: SuccessFailureRatio,
    /// Newest first
    pub latency_histogram: Vec<f64>,
    pub top_slowest_tools: Vec<ToolLatency>,
}

/// History entries paired with their recorded duration, newest first
fn timed<'a, I>(history: I) -> impl Iterator<Item = (&'a Execution, f64)>
where
    I: IntoIterator<Item = &'a Execution>,
{
    history
        .into_iter()
        .filter_map(|exec| exec.duration.map(|d| (exec, d)))
}

pub(crate) fn tool_metrics<'a, I>(history: I, running_count: usize) -> ToolMetrics
where
    I: IntoIterator<Item = &'a Execution>,
    I::IntoIter: Clone,
{
    let history = history.into_iter();

    let mut history_len = 0;
    let mut success_count = 0;
    let mut failure_count = 0;
    for exec in history.clone() {
        history_len += 1;
        match exec.status {
            ExecutionStatus::Success => success_count += 1,
            ExecutionStatus::Failure => failure_count += 1,
            ExecutionStatus::Running => {}
        }
    }

    let all_durations: Vec<f64> = timed(history).map(|(_, d)| d).collect();
    let avg_duration = mean(&all_durations);

    let success_rate = if history_len == 0 {
        0.0
    } else {
        success_count as f64 / history_len as f64 * 100.0
    };

    let mut durations: Vec<f64> = all_durations.into_iter().take(DURATION_SAMPLES).collect();
    durations.reverse();

    ToolMetrics {
        total_executions: history_len + running_count,
        success_count,
        failure_count,
        running_count,
        avg_duration,
        success_rate,
        durations,
    }
}

pub(crate) fn dashboard_data<'a, I>(history: I) -> DashboardData
where
    I: IntoIterator<Item = &'a Execution>,
{
    let with_duration: Vec<(&Execution, f64)> = timed(history).collect();

    let execution_timeline = with_duration
        .iter()
        .take(TIMELINE_POINTS)
        .map(|(exec, duration)| TimelinePoint {
            tool: exec.tool.clone(),
            duration: *duration,
            timestamp: exec.start_time,
        })
        .collect();

    // Only entries with a recorded duration count here, unlike ToolMetrics
    let mut success_failure_ratio = SuccessFailureRatio::default();
    for (exec, _) in &with_duration {
        match exec.status {
            ExecutionStatus::Success => success_failure_ratio.success += 1,
            ExecutionStatus::Failure => success_failure_ratio.failure += 1,
            ExecutionStatus::Running => {}
        }
    }

    let latency_histogram = with_duration
        .iter()
        .take(DURATION_SAMPLES)
        .map(|(_, d)| *d)
        .collect();

    DashboardData {
        execution_timeline,
        success_failure_ratio,
        latency_histogram,
        top_slowest_tools: slowest_tools(&with_duration),
    }
}

/// Per-tool mean duration, highest first; ties keep first-seen order
fn slowest_tools(with_duration: &[(&Execution, f64)]) -> Vec<ToolLatency> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();

    for &(exec, duration) in with_duration {
        let entry = totals.entry(exec.tool.as_str()).or_insert_with(|| {
            order.push(exec.tool.as_str());
            (0.0, 0)
        });
        entry.0 += duration;
        entry.1 += 1;
    }

    let mut ranked: Vec<ToolLatency> = order
        .into_iter()
        .map(|tool| {
            let (sum, count) = totals[tool];
            ToolLatency {
                tool: tool.to_string(),
                avg_duration: sum / count as f64,
            }
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.avg_duration.total_cmp(&a.avg_duration));
    ranked.truncate(SLOWEST_TOOLS);
    ranked
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn done(tool: &str, status: ExecutionStatus, secs: i64) -> Execution {
        let t0 = Utc::now();
        Execution::running(format!("{}-{}", tool, secs), tool, "srv", t0)
            .finished(status, t0 + Duration::seconds(secs))
    }

    fn no_duration(tool: &str, status: ExecutionStatus) -> Execution {
        let mut exec = Execution::running("nd", tool, "srv", Utc::now());
        exec.status = status;
        exec
    }

    #[test]
    fn test_empty_metrics() {
        let history: Vec<Execution> = Vec::new();
        assert_eq!(tool_metrics(&history, 0), ToolMetrics::default());
        assert_eq!(dashboard_data(&history), DashboardData::default());
    }

    #[test]
    fn test_success_rate_excludes_running() {
        let history = vec![
            done("a", ExecutionStatus::Success, 1),
            done("a", ExecutionStatus::Failure, 3),
        ];
        let metrics = tool_metrics(&history, 2);
        assert_eq!(metrics.total_executions, 4);
        assert_eq!(metrics.running_count, 2);
        assert_eq!(metrics.success_rate, 50.0);
        assert_eq!(metrics.avg_duration, 2.0);
    }

    #[test]
    fn test_durations_are_chronological_and_capped() {
        // history is newest first: durations 60, 59, ..., 1
        let history: Vec<Execution> = (1..=60)
            .rev()
            .map(|s| done("t", ExecutionStatus::Success, s))
            .collect();
        let metrics = tool_metrics(&history, 0);
        assert_eq!(metrics.durations.len(), DURATION_SAMPLES);
        assert_eq!(metrics.durations.first(), Some(&11.0));
        assert_eq!(metrics.durations.last(), Some(&60.0));

        let dashboard = dashboard_data(&history);
        assert_eq!(dashboard.latency_histogram.first(), Some(&60.0));
        assert_eq!(dashboard.latency_histogram.len(), DURATION_SAMPLES);
        assert_eq!(dashboard.execution_timeline.len(), TIMELINE_POINTS);
        assert_eq!(dashboard.execution_timeline[0].duration, 60.0);
    }

    #[test]
    fn test_ratio_filter_differs_from_metrics_counts() {
        let history = vec![
            done("a", ExecutionStatus::Success, 2),
            no_duration("a", ExecutionStatus::Failure),
        ];
        let metrics = tool_metrics(&history, 0);
        assert_eq!(metrics.failure_count, 1);

        let dashboard = dashboard_data(&history);
        assert_eq!(
            dashboard.success_failure_ratio,
            SuccessFailureRatio { success: 1, failure: 0 }
        );
    }

    #[test]
    fn test_slowest_tools_ties_keep_first_seen_order() {
        let history = vec![
            done("lint", ExecutionStatus::Success, 4),
            done("fmt", ExecutionStatus::Success, 4),
            done("deploy", ExecutionStatus::Success, 9),
        ];
        let ranked = dashboard_data(&history).top_slowest_tools;
        let names: Vec<&str> = ranked.iter().map(|t| t.tool.as_str()).collect();
        assert_eq!(names, vec!["deploy", "lint", "fmt"]);
    }

    #[test]
    fn test_slowest_tools_limited_to_five() {
        let history: Vec<Execution> = (1..=8)
            .map(|s| done(&format!("tool{}", s), ExecutionStatus::Success, s))
            .collect();
        let ranked = dashboard_data(&history).top_slowest_tools;
        assert_eq!(ranked.len(), SLOWEST_TOOLS);
        assert_eq!(ranked[0].tool, "tool8");
        assert_eq!(ranked[4].tool, "tool4");
    }
}
