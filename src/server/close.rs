//! Close/sync server.
//!
//! The only writer of `sync_lsn` and the only closer of non-current
//! segment files. A pending file becomes eligible once its segment number
//! is strictly below the segment `write_lsn` points into — at that point
//! no byte of it can still be in flight. The server fsyncs the file, closes
//! it, and advances `sync_lsn` to the start of the next segment, so any
//! LSN below `sync_lsn` is backed by a confirmed flush to stable storage.

use std::time::Duration;

use crate::errors::{LogError, LogResult};
use crate::lsn::Lsn;
use crate::manager::LogState;
use crate::observability::Logger;

/// Timed-wait bound when no file is eligible to close.
pub(crate) const CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Close the pending segment if it is eligible.
///
/// Returns whether a file was closed. The fsync happens outside the sync
/// lock; only the close itself and the `sync_lsn` advance are guarded.
pub(crate) fn close_once(state: &LogState) -> LogResult<bool> {
    let pending = {
        let mut guard = state
            .close_file
            .lock()
            .map_err(|_| LogError::Resource("pending-close lock poisoned".to_string()))?;
        match guard.as_ref() {
            Some(seg) if seg.id < state.write_lsn.load().file => guard.take(),
            _ => None,
        }
    };
    let Some(seg) = pending else {
        return Ok(false);
    };

    seg.file
        .sync_all()
        .map_err(|e| LogError::io(format!("failed to fsync segment {}", seg.id), e))?;

    {
        let _sync = state
            .sync_lock
            .lock()
            .map_err(|_| LogError::Resource("sync lock poisoned".to_string()))?;
        let close_end = Lsn::new(seg.id + 1, 0);
        drop(seg);
        state.sync_lsn.store(close_end);
        state.metrics.incr_close_syncs();
        state.sync_sig.notify()?;
    }
    Ok(true)
}

/// Close/sync server thread body.
pub(crate) fn run(state: &LogState) {
    while state.is_running() {
        match close_once(state) {
            Ok(true) => {
                Logger::trace(
                    "LOG_SEGMENT_CLOSED",
                    &[("sync_lsn", &state.sync_lsn.load().to_string())],
                );
            }
            Ok(false) => {
                if let Err(e) = state.close_sig.wait_timeout(CLOSE_WAIT) {
                    super::report_fatal("log-close-server", &e);
                    return;
                }
            }
            Err(e) => {
                super::report_fatal("log-close-server", &e);
                return;
            }
        }
    }
}
