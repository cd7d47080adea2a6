//! Write-LSN consolidator.
//!
//! Producers finish their slot I/O fully in parallel and in arbitrary
//! order; this server is what turns that back into a single total order.
//! Each pass scans the pool for `Written` slots, sorts them by the LSN
//! their bytes begin at, and advances `write_lsn` through the contiguous
//! prefix only — a gap means an earlier slot is still in flight and the
//! pass stops there. Slots behind the advance are freed; slots past a gap
//! stay `Written` untouched.
//!
//! Consolidation is latency-sensitive: when a pass processed something, a
//! neighbor slot is likely about to complete, so the loop spins with
//! bounded yields before falling back to a timed wait.

use std::thread;
use std::time::Duration;

use crate::errors::LogResult;
use crate::manager::LogState;
use crate::slot::{WrittenSlot, SLOT_POOL};

/// Yields attempted before blocking when no slot was processed.
pub(crate) const SPIN_YIELDS: u32 = 1000;

/// Timed-wait bound once the spin phase gives up.
pub(crate) const IDLE_WAIT: Duration = Duration::from_millis(100);

/// One consolidation pass. Returns how many slots were processed.
pub(crate) fn consolidate_once(
    state: &LogState,
    written: &mut Vec<WrittenSlot>,
) -> LogResult<usize> {
    state.pool.scan_written(written);
    if written.is_empty() {
        return Ok(0);
    }

    // Completion order is arbitrary; downstream consumers need a gap-free
    // prefix in release order.
    written.sort_by(|a, b| a.release_lsn.cmp(&b.release_lsn));

    let mut processed = 0;
    for entry in written.iter() {
        if entry.release_lsn != state.write_lsn.load() {
            break;
        }

        let end_lsn = state.pool.end_lsn(entry.index);
        let close_file = state.pool.close_flag(entry.index);

        state.write_lsn.store(end_lsn);
        state.metrics.incr_write_lsn_advances();
        state.write_sig.notify()?;
        if close_file {
            state.close_sig.notify()?;
        }
        state.pool.free(entry.index);
        processed += 1;
    }
    Ok(processed)
}

/// Consolidator thread body.
pub(crate) fn run(state: &LogState) {
    let mut written = Vec::with_capacity(SLOT_POOL);
    let mut idle = 0u32;

    while state.is_running() {
        match consolidate_once(state, &mut written) {
            Ok(processed) => {
                if processed > 0 {
                    idle = 0;
                }
            }
            Err(e) => {
                super::report_fatal("log-wrlsn-server", &e);
                return;
            }
        }

        if idle < SPIN_YIELDS {
            idle += 1;
            thread::yield_now();
        } else if let Err(e) = state.wrlsn_sig.wait_timeout(IDLE_WAIT) {
            super::report_fatal("log-wrlsn-server", &e);
            return;
        }
    }
}
