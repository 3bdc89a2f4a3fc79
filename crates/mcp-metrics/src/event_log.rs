//! Running log of execution events for the output panel, with JSON export

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::execution::ExecutionStatus;
use crate::progress::ExecutionEvent;

/// A logged event with the time it was observed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedEvent {
    pub logged_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ExecutionEvent,
}

/// Result of an export request; non-written outcomes are shown to the user
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Written(PathBuf),
    NoWorkspace,
    NoEvents,
}

impl ExportOutcome {
    pub fn message(&self) -> String {
        match self {
            ExportOutcome::Written(path) => format!("Exported execution log to {}", path.display()),
            ExportOutcome::NoWorkspace => "No workspace folder open; nothing exported".to_string(),
            ExportOutcome::NoEvents => "No execution events to export".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<LoggedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its output-panel line
    pub fn record(&mut self, event: ExecutionEvent) -> String {
        self.record_at(event, Utc::now())
    }

    pub fn record_at(&mut self, event: ExecutionEvent, logged_at: DateTime<Utc>) -> String {
        let logged = LoggedEvent { logged_at, event };
        let line = format_line(&logged);
        self.events.push(logged);
        line
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[LoggedEvent] {
        &self.events
    }

    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(format_line).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Write the log as pretty JSON into `workspace_root`
    pub fn export(&self, workspace_root: Option<&Path>) -> Result<ExportOutcome> {
        self.export_at(workspace_root, Utc::now())
    }

    pub fn export_at(&self, workspace_root: Option<&Path>, now: DateTime<Utc>) -> Result<ExportOutcome> {
        let Some(root) = workspace_root else {
            return Ok(ExportOutcome::NoWorkspace);
        };
        if self.events.is_empty() {
            return Ok(ExportOutcome::NoEvents);
        }

        let path = root.join(format!("mcp-executions-{}.json", now.format("%Y%m%d-%H%M%S")));
        let body = serde_json::to_string_pretty(&self.events)?;
        std::fs::write(&path, body)?;

        info!(path = %path.display(), events = self.events.len(), "Exported execution log");
        Ok(ExportOutcome::Written(path))
    }
}

fn format_line(logged: &LoggedEvent) -> String {
    let exec = logged.event.execution();
    let time = logged.logged_at.format("%H:%M:%S");
    match &logged.event {
        ExecutionEvent::Started(_) => {
            format!("[{}] ▶ {}/{} started ({})", time, exec.server, exec.tool, exec.id)
        }
        ExecutionEvent::Progress(_) => format!(
            "[{}] … {}/{} {:.0}% {}",
            time,
            exec.server,
            exec.tool,
            exec.percentage * 100.0,
            exec.message.as_deref().unwrap_or("")
        )
        .trim_end()
        .to_string(),
        ExecutionEvent::Completed(_) => format!(
            "[{}] {} {}/{} {} in {}",
            time,
            match exec.status {
                ExecutionStatus::Success => "✔",
                _ => "✖",
            },
            exec.server,
            exec.tool,
            exec.status,
            exec.duration
                .map(|d| format!("{:.2}s", d))
                .unwrap_or_else(|| "?".to_string())
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Execution;
    use chrono::Duration;
    use tempfile::TempDir;

    fn completed() -> ExecutionEvent {
        let t0 = Utc::now();
        ExecutionEvent::Completed(
            Execution::running("a", "scan", "CDE", t0)
                .finished(ExecutionStatus::Success, t0 + Duration::milliseconds(1250)),
        )
    }

    #[test]
    fn test_record_formats_line() {
        let mut log = EventLog::new();
        let line = log.record(completed());
        assert!(line.contains("CDE/scan success in 1.25s"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.lines(), vec![line]);
    }

    #[test]
    fn test_export_without_workspace() {
        let mut log = EventLog::new();
        log.record(completed());
        assert_eq!(log.export(None).unwrap(), ExportOutcome::NoWorkspace);
    }

    #[test]
    fn test_export_without_events() {
        let temp_dir = TempDir::new().unwrap();
        let log = EventLog::new();
        assert_eq!(log.export(Some(temp_dir.path())).unwrap(), ExportOutcome::NoEvents);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_writes_timestamped_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = EventLog::new();
        log.record(ExecutionEvent::Started(Execution::start("scan", "CDE")));
        log.record(completed());

        let now = DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        let outcome = log.export_at(Some(temp_dir.path()), now).unwrap();
        let expected = temp_dir.path().join("mcp-executions-20250304-050607.json");
        assert_eq!(outcome, ExportOutcome::Written(expected.clone()));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(expected).unwrap()).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 2);
        assert_eq!(written[0]["kind"], "started");
        assert_eq!(written[1]["kind"], "completed");
        assert_eq!(written[1]["tool"], "scan");
    }

    #[test]
    fn test_export_surfaces_write_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = EventLog::new();
        log.record(completed());
        let missing = temp_dir.path().join("does-not-exist");
        assert!(log.export(Some(missing.as_path())).is_err());
        assert_eq!(log.len(), 1);
    }
}
