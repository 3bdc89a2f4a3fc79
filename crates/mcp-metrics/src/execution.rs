use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single tool invocation, running or completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Caller-supplied execution ID, stable for one invocation
    pub id: String,

    /// Tool name being executed
    pub tool: String,

    /// Server that owns the tool
    pub server: String,

    /// Execution status
    pub status: ExecutionStatus,

    /// When the invocation began
    pub start_time: DateTime<Utc>,

    /// When the invocation finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Seconds between start and end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Progress or result text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Progress in [0.0, 1.0]
    #[serde(default)]
    pub percentage: f64,
}

/// Execution status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Execution is in flight
    Running,

    /// Execution completed successfully
    Success,

    /// Execution failed
    #[serde(alias = "error", alias = "failed")]
    Failure,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Partial execution record merged by `MetricsStore::update_execution`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionUpdate {
    pub tool: Option<String>,
    pub server: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub percentage: Option<f64>,
}

impl ExecutionUpdate {
    pub fn progress(percentage: f64, message: impl Into<String>) -> Self {
        Self {
            percentage: Some(percentage),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn finish(status: ExecutionStatus, end_time: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            end_time: Some(end_time),
            percentage: Some(1.0),
            ..Default::default()
        }
    }
}

impl Execution {
    /// Create a running execution with a generated ID
    pub fn start(tool: &str, server: &str) -> Self {
        Self::running(Uuid::new_v4().to_string(), tool, server, Utc::now())
    }

    /// Create a running execution with a known ID and start time
    pub fn running(
        id: impl Into<String>,
        tool: &str,
        server: &str,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            tool: tool.to_string(),
            server: server.to_string(),
            status: ExecutionStatus::Running,
            start_time,
            end_time: None,
            duration: None,
            message: None,
            percentage: 0.0,
        }
    }

    /// Finalize with a terminal status; duration follows from `end_time`
    pub fn finished(mut self, status: ExecutionStatus, end_time: DateTime<Utc>) -> Self {
        self.status = status;
        self.percentage = 1.0;
        self.set_end_time(end_time);
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == ExecutionStatus::Running
    }

    /// Set end time and recompute duration
    pub fn set_end_time(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.sync_duration();
    }

    /// Make `duration` agree with `end_time`: present iff the end is known
    pub(crate) fn sync_duration(&mut self) {
        self.duration = self
            .end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0);
    }

    /// Merge a partial update into this record
    pub(crate) fn apply(&mut self, update: ExecutionUpdate) {
        if let Some(tool) = update.tool {
            self.tool = tool;
        }
        if let Some(server) = update.server {
            self.server = server;
        }
        if let Some(status) = update.status {
            // Terminal records never go back to running
            if !(self.status.is_terminal() && status == ExecutionStatus::Running) {
                self.status = status;
            }
        }
        let retimed = update.start_time.is_some() || update.end_time.is_some();
        if let Some(start_time) = update.start_time {
            self.start_time = start_time;
        }
        if let Some(message) = update.message {
            self.message = Some(message);
        }
        if let Some(percentage) = update.percentage {
            self.percentage = clamp_percentage(percentage);
        }
        if let Some(end_time) = update.end_time {
            self.end_time = Some(end_time);
        }
        if retimed {
            self.sync_duration();
        }
    }
}

pub(crate) fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_duration_follows_end_time() {
        let t0 = Utc::now();
        let mut exec = Execution::running("a", "scan", "cde", t0);
        assert_eq!(exec.duration, None);

        exec.set_end_time(t0 + Duration::milliseconds(5250));
        assert_eq!(exec.duration, Some(5.25));

        exec.set_end_time(t0 + Duration::milliseconds(1000));
        assert_eq!(exec.duration, Some(1.0));
    }

    #[test]
    fn test_terminal_status_does_not_regress() {
        let t0 = Utc::now();
        let mut exec = Execution::running("a", "scan", "cde", t0)
            .finished(ExecutionStatus::Failure, t0 + Duration::seconds(2));

        exec.apply(ExecutionUpdate {
            status: Some(ExecutionStatus::Running),
            message: Some("late progress".to_string()),
            ..Default::default()
        });

        assert_eq!(exec.status, ExecutionStatus::Failure);
        assert_eq!(exec.message.as_deref(), Some("late progress"));
    }

    #[test]
    fn test_percentage_is_clamped() {
        let mut exec = Execution::start("scan", "cde");
        exec.apply(ExecutionUpdate::progress(1.7, "overshoot"));
        assert_eq!(exec.percentage, 1.0);
        exec.apply(ExecutionUpdate::progress(-0.2, "undershoot"));
        assert_eq!(exec.percentage, 0.0);
    }

    #[test]
    fn test_record_uses_camel_case_and_iso_timestamps() {
        let t0 = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let exec = Execution::running("a", "scan", "cde", t0)
            .finished(ExecutionStatus::Success, t0 + Duration::seconds(3));

        let value = serde_json::to_value(&exec).unwrap();
        assert_eq!(value["startTime"], "2025-01-02T03:04:05Z");
        assert_eq!(value["endTime"], "2025-01-02T03:04:08Z");
        assert_eq!(value["status"], "success");
        assert_eq!(value["duration"], 3.0);
    }

    #[test]
    fn test_error_alias_parses_as_failure() {
        let status: ExecutionStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(status, ExecutionStatus::Failure);
    }
}
