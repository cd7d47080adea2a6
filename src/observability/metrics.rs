//! Operational counters for the log manager.
//!
//! Counters only, monotonic, reset on process start. All values use atomic
//! operations with relaxed ordering; observers tolerate slightly stale
//! reads.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter registry for one log manager instance.
#[derive(Debug, Default)]
pub struct LogMetrics {
    /// Configured maximum segment size (set once at create).
    max_filesize: AtomicU64,
    /// Current preallocation target (tracks adaptive growth).
    prealloc_max: AtomicU64,
    /// Spare segment files created.
    prealloc_files: AtomicU64,
    /// Segment switches that found no spare available.
    prealloc_missed: AtomicU64,
    /// Write-LSN advances performed by the consolidator.
    write_lsn_advances: AtomicU64,
    /// Archive cycles that ran to completion.
    archive_runs: AtomicU64,
    /// Segment files removed by archiving.
    archive_removed: AtomicU64,
    /// Segment files fsynced and closed by the close server.
    close_syncs: AtomicU64,
}

impl LogMetrics {
    /// New registry with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the configured maximum segment size.
    pub fn set_max_filesize(&self, bytes: u64) {
        self.max_filesize.store(bytes, Ordering::Relaxed);
    }

    /// Configured maximum segment size.
    pub fn max_filesize(&self) -> u64 {
        self.max_filesize.load(Ordering::Relaxed)
    }

    /// Record the current preallocation target.
    pub fn set_prealloc_max(&self, target: u64) {
        self.prealloc_max.store(target, Ordering::Relaxed);
    }

    /// Current preallocation target.
    pub fn prealloc_max(&self) -> u64 {
        self.prealloc_max.load(Ordering::Relaxed)
    }

    /// Count one spare file created.
    pub fn incr_prealloc_files(&self) {
        self.prealloc_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Spare files created so far.
    pub fn prealloc_files(&self) -> u64 {
        self.prealloc_files.load(Ordering::Relaxed)
    }

    /// Count one segment switch that found no spare.
    pub fn incr_prealloc_missed(&self) {
        self.prealloc_missed.fetch_add(1, Ordering::Relaxed);
    }

    /// Segment switches that found no spare.
    pub fn prealloc_missed(&self) -> u64 {
        self.prealloc_missed.load(Ordering::Relaxed)
    }

    /// Count one write-LSN advance.
    pub fn incr_write_lsn_advances(&self) {
        self.write_lsn_advances.fetch_add(1, Ordering::Relaxed);
    }

    /// Write-LSN advances so far.
    pub fn write_lsn_advances(&self) -> u64 {
        self.write_lsn_advances.load(Ordering::Relaxed)
    }

    /// Count one completed archive cycle.
    pub fn incr_archive_runs(&self) {
        self.archive_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Completed archive cycles.
    pub fn archive_runs(&self) -> u64 {
        self.archive_runs.load(Ordering::Relaxed)
    }

    /// Count segment files removed by archiving.
    pub fn add_archive_removed(&self, count: u64) {
        self.archive_removed.fetch_add(count, Ordering::Relaxed);
    }

    /// Segment files removed by archiving.
    pub fn archive_removed(&self) -> u64 {
        self.archive_removed.load(Ordering::Relaxed)
    }

    /// Count one segment fsynced and closed.
    pub fn incr_close_syncs(&self) {
        self.close_syncs.fetch_add(1, Ordering::Relaxed);
    }

    /// Segments fsynced and closed.
    pub fn close_syncs(&self) -> u64 {
        self.close_syncs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = LogMetrics::new();
        assert_eq!(metrics.write_lsn_advances(), 0);
        assert_eq!(metrics.archive_removed(), 0);
        assert_eq!(metrics.prealloc_files(), 0);
        assert_eq!(metrics.close_syncs(), 0);
    }

    #[test]
    fn test_increments_accumulate() {
        let metrics = LogMetrics::new();
        metrics.incr_write_lsn_advances();
        metrics.incr_write_lsn_advances();
        metrics.add_archive_removed(4);
        assert_eq!(metrics.write_lsn_advances(), 2);
        assert_eq!(metrics.archive_removed(), 4);
    }

    #[test]
    fn test_set_values() {
        let metrics = LogMetrics::new();
        metrics.set_max_filesize(1 << 20);
        metrics.set_prealloc_max(5);
        assert_eq!(metrics.max_filesize(), 1 << 20);
        assert_eq!(metrics.prealloc_max(), 5);
    }
}
