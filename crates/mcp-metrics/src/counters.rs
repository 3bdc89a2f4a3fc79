use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

use crate::error::Result;

/// Prometheus counters mirroring store activity
#[derive(Clone)]
pub struct ExecutionCounters {
    /// Total executions started
    executions_started: IntCounter,

    /// Currently active executions
    active_executions: IntGauge,

    /// Executions completed successfully
    executions_succeeded: IntCounter,

    /// Executions failed
    executions_failed: IntCounter,

    /// Execution duration histogram
    execution_duration: Histogram,

    /// History entries dropped by the size bound
    history_evictions: IntCounter,

    registry: Registry,
}

impl ExecutionCounters {
    /// Create counters in a private registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let executions_started = IntCounter::new(
            "mcp_executions_started_total",
            "Total number of executions started",
        )?;
        registry.register(Box::new(executions_started.clone()))?;

        let active_executions = IntGauge::new(
            "mcp_active_executions",
            "Number of currently active executions",
        )?;
        registry.register(Box::new(active_executions.clone()))?;

        let executions_succeeded = IntCounter::new(
            "mcp_executions_succeeded_total",
            "Total number of successfully completed executions",
        )?;
        registry.register(Box::new(executions_succeeded.clone()))?;

        let executions_failed = IntCounter::new(
            "mcp_executions_failed_total",
            "Total number of failed executions",
        )?;
        registry.register(Box::new(executions_failed.clone()))?;

        let execution_duration = Histogram::with_opts(
            HistogramOpts::new(
                "mcp_execution_duration_seconds",
                "Execution duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(execution_duration.clone()))?;

        let history_evictions = IntCounter::new(
            "mcp_history_evictions_total",
            "Completed executions dropped from bounded history",
        )?;
        registry.register(Box::new(history_evictions.clone()))?;

        Ok(Self {
            executions_started,
            active_executions,
            executions_succeeded,
            executions_failed,
            execution_duration,
            history_evictions,
            registry,
        })
    }

    pub fn execution_started(&self) {
        self.executions_started.inc();
    }

    pub fn execution_succeeded(&self, duration_secs: Option<f64>) {
        self.executions_succeeded.inc();
        if let Some(duration) = duration_secs {
            self.execution_duration.observe(duration);
        }
    }

    pub fn execution_failed(&self, duration_secs: Option<f64>) {
        self.executions_failed.inc();
        if let Some(duration) = duration_secs {
            self.execution_duration.observe(duration);
        }
    }

    pub fn history_evicted(&self, count: usize) {
        self.history_evictions.inc_by(count as u64);
    }

    /// Gauge follows the size of the active set
    pub fn set_active(&self, count: usize) {
        self.active_executions.set(count as i64);
    }

    /// Render all counters in the text exposition format
    pub fn render_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
