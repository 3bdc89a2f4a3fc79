//! Read-side views over a `MetricsStore`
//!
//! Views never hold store state. They register a [`ChangeFlag`] as a store
//! subscriber and pull a fresh projection whenever the flag is set, so a burst
//! of mutations collapses into one render.

pub mod dashboard;
pub mod history;
pub mod summary;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::store::{MetricsStore, SubscriptionId};

pub use dashboard::DashboardView;
pub use history::{HistoryItem, HistoryView};
pub use summary::{MetricsSummaryView, SummaryLine};

/// Dirty marker shared between a store subscriber and a view
#[derive(Clone, Debug)]
pub struct ChangeFlag {
    dirty: Arc<AtomicBool>,
}

impl Default for ChangeFlag {
    fn default() -> Self {
        // Start dirty so the first render always happens
        Self {
            dirty: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl ChangeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `store` so every mutation marks this flag
    pub fn attach(&self, store: &mut MetricsStore) -> SubscriptionId {
        let dirty = Arc::clone(&self.dirty);
        store.subscribe(move || dirty.store(true, Ordering::Release))
    }

    /// Clear the flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

/// Format seconds the way status views show them
pub(crate) fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let minutes = (secs / 60.0).floor();
        format!("{:.0}m {:.0}s", minutes, secs - minutes * 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Execution;
    use crate::persistence::MemoryKeyValueStore;

    #[test]
    fn test_flag_coalesces_notifications() {
        let mut store = MetricsStore::new(Arc::new(MemoryKeyValueStore::new())).unwrap();
        let flag = ChangeFlag::new();
        flag.attach(&mut store);

        assert!(flag.take());
        assert!(!flag.take());

        store.add_execution(Execution::start("scan", "cde"));
        store.add_execution(Execution::start("lint", "cde"));
        assert!(flag.is_dirty());
        assert!(flag.take());
        assert!(!flag.is_dirty());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.25), "250ms");
        assert_eq!(format_duration(5.0), "5.0s");
        assert_eq!(format_duration(125.0), "2m 5s");
    }
}
