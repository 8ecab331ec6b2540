//! Ambient observability counters. Pure bookkeeping: nothing here gates or alters the
//! engine's control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Cheaply-clonable handle onto a shared set of engine-wide counters.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    bytes_mapped: Arc<AtomicU64>,
    blocks_fetched: Arc<AtomicU64>,
    blocks_filtered: Arc<AtomicU64>,
    lines_indexed: Arc<AtomicU64>,
    filtered_lines: Arc<AtomicU64>,
    get_line_fast_path: Arc<AtomicU64>,
    get_line_rescans: Arc<AtomicU64>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mapping(&self, bytes: u64) {
        self.bytes_mapped.store(bytes, Ordering::Relaxed);
    }

    pub fn record_fetch(&self, lines: u32) {
        self.blocks_fetched.fetch_add(1, Ordering::Relaxed);
        self.lines_indexed.fetch_add(lines as u64, Ordering::Relaxed);
    }

    pub fn record_filter(&self, filtered_lines: u32) {
        self.blocks_filtered.fetch_add(1, Ordering::Relaxed);
        self.filtered_lines.fetch_add(filtered_lines as u64, Ordering::Relaxed);
    }

    pub fn record_get_line(&self, used_predicted_cursor: bool) {
        if used_predicted_cursor {
            self.get_line_fast_path.fetch_add(1, Ordering::Relaxed);
        } else {
            self.get_line_rescans.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_mapped: self.bytes_mapped.load(Ordering::Relaxed),
            blocks_fetched: self.blocks_fetched.load(Ordering::Relaxed),
            blocks_filtered: self.blocks_filtered.load(Ordering::Relaxed),
            lines_indexed: self.lines_indexed.load(Ordering::Relaxed),
            filtered_lines: self.filtered_lines.load(Ordering::Relaxed),
            get_line_fast_path: self.get_line_fast_path.load(Ordering::Relaxed),
            get_line_rescans: self.get_line_rescans.load(Ordering::Relaxed),
        }
    }

    /// Emits one multi-line summary at `info` level.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            "engine metrics:\n\
             bytes mapped: {}\n\
             blocks fetched/filtered: {}/{}\n\
             lines indexed/filtered: {}/{}\n\
             get_line fast-path/rescans: {}/{}",
            s.bytes_mapped,
            s.blocks_fetched,
            s.blocks_filtered,
            s.lines_indexed,
            s.filtered_lines,
            s.get_line_fast_path,
            s.get_line_rescans
        );
    }
}

/// A point-in-time read of [`EngineMetrics`]' counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub bytes_mapped: u64,
    pub blocks_fetched: u64,
    pub blocks_filtered: u64,
    pub lines_indexed: u64,
    pub filtered_lines: u64,
    pub get_line_fast_path: u64,
    pub get_line_rescans: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = EngineMetrics::new();
        m.record_mapping(4096);
        m.record_fetch(10);
        m.record_fetch(5);
        m.record_filter(3);
        m.record_get_line(true);
        m.record_get_line(false);
        m.record_get_line(true);

        let s = m.snapshot();
        assert_eq!(s.bytes_mapped, 4096);
        assert_eq!(s.blocks_fetched, 2);
        assert_eq!(s.lines_indexed, 15);
        assert_eq!(s.blocks_filtered, 1);
        assert_eq!(s.filtered_lines, 3);
        assert_eq!(s.get_line_fast_path, 2);
        assert_eq!(s.get_line_rescans, 1);
    }

    #[test]
    fn clone_shares_the_same_counters() {
        let m = EngineMetrics::new();
        let clone = m.clone();
        m.record_fetch(7);
        assert_eq!(clone.snapshot().lines_indexed, 7);
    }
}
