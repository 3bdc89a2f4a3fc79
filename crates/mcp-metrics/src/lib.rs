//! MCP Metrics - Tool Execution Observability Store
//!
//! Aggregates tool execution telemetry for status views:
//! - Active set of running executions and a bounded, persisted history
//! - Aggregate metrics and chart-ready dashboard projections
//! - Synchronous change notifications plus a broadcast channel
//! - Progress event ingestion and an exportable event log

pub mod config;
pub mod counters;
pub mod error;
pub mod event_log;
pub mod execution;
pub mod persistence;
pub mod progress;
pub mod projections;
pub mod store;
pub mod views;

pub use config::MetricsConfig;
pub use error::{Error, Result};
pub use event_log::{EventLog, ExportOutcome};
pub use execution::{Execution, ExecutionStatus, ExecutionUpdate};
pub use persistence::{JsonFileStore, KeyValueStore, MemoryKeyValueStore};
pub use progress::{ExecutionEvent, ProgressEvent, ProgressIngestor};
pub use projections::{DashboardData, ToolMetrics};
pub use store::{MetricsStore, StoreEvent, SubscriptionId};
