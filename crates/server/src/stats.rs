//! In-memory per-tool call statistics.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Global call counters.
#[derive(Default)]
pub struct ToolStats {
    pub total_calls: AtomicU64,
    pub success_calls: AtomicU64,
    pub failure_calls: AtomicU64,
    tools: Mutex<HashMap<String, CallStats>>,
}

/// Per-tool counters.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CallStats {
    pub calls: u64,
    pub success: u64,
    pub failure: u64,
    /// Summed wall time of all calls, in milliseconds.
    pub total_ms: u64,
}

/// JSON-serializable snapshot of current stats.
#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    pub success_calls: u64,
    pub failure_calls: u64,
    pub tools: HashMap<String, CallStats>,
}

impl ToolStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, tool: &str, elapsed: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_calls.fetch_add(1, Ordering::Relaxed);
        self.update(tool, elapsed, |entry| entry.success += 1);
    }

    pub fn record_failure(&self, tool: &str, elapsed: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_calls.fetch_add(1, Ordering::Relaxed);
        self.update(tool, elapsed, |entry| entry.failure += 1);
    }

    fn update(&self, tool: &str, elapsed: Duration, outcome: impl FnOnce(&mut CallStats)) {
        let mut map = self.tools.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(tool.to_string()).or_default();
        entry.calls += 1;
        entry.total_ms += u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        outcome(entry);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let tools = self
            .tools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        StatsSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            success_calls: self.success_calls.load(Ordering::Relaxed),
            failure_calls: self.failure_calls.load(Ordering::Relaxed),
            tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_success_and_failure() {
        let stats = ToolStats::new();
        stats.record_success("list_clusters", Duration::from_millis(40));
        stats.record_success("list_clusters", Duration::from_millis(60));
        stats.record_failure("get_cluster", Duration::from_millis(5));

        let snap = stats.snapshot();
        assert_eq!(snap.total_calls, 3);
        assert_eq!(snap.success_calls, 2);
        assert_eq!(snap.failure_calls, 1);

        let list = &snap.tools["list_clusters"];
        assert_eq!(list.calls, 2);
        assert_eq!(list.success, 2);
        assert_eq!(list.total_ms, 100);
        assert_eq!(snap.tools["get_cluster"].failure, 1);
    }

    #[test]
    fn test_counts_survive_poisoned_lock() {
        let stats = std::sync::Arc::new(ToolStats::new());
        let holder = stats.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.tools.lock().unwrap();
            panic!("panicked while holding the stats lock");
        })
        .join();
        assert!(stats.tools.is_poisoned());

        stats.record_success("list_clusters", Duration::from_millis(1));
        let snap = stats.snapshot();
        assert_eq!(snap.tools["list_clusters"].calls, 1);
        assert_eq!(snap.success_calls, 1);
    }

    #[test]
    fn test_snapshot_empty() {
        let snap = ToolStats::new().snapshot();
        assert_eq!(snap.total_calls, 0);
        assert!(snap.tools.is_empty());
    }
}
