//! Archive and preallocation server.
//!
//! Archiving deletes segment files the engine can never need again: those
//! strictly below both the checkpoint boundary and the durability boundary
//! (or an explicit backup boundary when backup tooling supplies one).
//! Deleting past either boundary would discard bytes recovery or a backup
//! still depends on, so the cutoff is always the minimum.
//!
//! Preallocation runs in the same cycle: it keeps a target number of spare
//! segment files on disk so the reservation path never blocks on file
//! creation, and grows the target when switches missed a spare since the
//! last cycle.

use std::time::Duration;

use crate::errors::{LogError, LogResult};
use crate::filename;
use crate::lsn::Lsn;
use crate::manager::{ArchiveState, LogState};
use crate::observability::Logger;

/// Timed wait between periodic cycles.
pub(crate) const SERVER_WAIT: Duration = Duration::from_secs(60);

/// Delete every segment file below the archive cutoff.
///
/// The cutoff is `min(ckpt_lsn.file, backup_file)` when an explicit backup
/// boundary is given, else `min(ckpt_lsn.file, sync_lsn.file)` — the
/// durability-confirmed boundary, never the in-flight write boundary.
///
/// The caller holds the archive exclusion lock; `archive` is its view of
/// the hot-backup flag. An active hot backup pins the whole log, so the
/// cycle is skipped outright unless the backup itself supplied the
/// boundary.
pub(crate) fn archive_once(
    state: &LogState,
    backup_file: u32,
    archive: &ArchiveState,
) -> LogResult<()> {
    if archive.hot_backup && backup_file == 0 {
        Logger::trace("LOG_ARCHIVE_PINNED", &[]);
        return Ok(());
    }

    let ckpt_file = state.ckpt_lsn.load().file;
    let cutoff = if backup_file != 0 {
        ckpt_file.min(backup_file)
    } else {
        ckpt_file.min(state.sync_lsn.load().file)
    };

    Logger::trace("LOG_ARCHIVE_CUTOFF", &[("cutoff", &cutoff.to_string())]);

    let mut removed = 0u64;
    for name in filename::list_files(&state.path, filename::LOG_PREFIX)? {
        let lognum = filename::extract_log_number(&name)?;
        if lognum < cutoff {
            filename::remove_segment(&state.path, lognum)?;
            removed += 1;
        }
    }

    state.first_lsn.store(Lsn::new(cutoff, 0));
    state.metrics.incr_archive_runs();
    state.metrics.add_archive_removed(removed);
    Ok(())
}

/// Top the spare-file count up to the preallocation target.
///
/// Switches that missed a spare since the last cycle are folded into the
/// target before counting, then the miss counter resets: sustained demand
/// raises the target instead of requiring manual tuning.
pub(crate) fn prealloc_once(state: &LogState) -> LogResult<()> {
    use std::sync::atomic::Ordering;

    let missed = state.prep_missed.swap(0, Ordering::AcqRel);
    if missed > 0 {
        let target = state.prealloc_target.fetch_add(missed, Ordering::AcqRel) + missed;
        Logger::trace(
            "LOG_PREALLOC_GROW",
            &[("missed", &missed.to_string()), ("target", &target.to_string())],
        );
    }
    let target = state.prealloc_target.load(Ordering::Acquire);
    state.metrics.set_prealloc_max(target as u64);

    let existing = filename::list_files(&state.path, filename::PREP_PREFIX)?.len() as u32;
    for _ in existing..target {
        let id = state.prep_fileid.fetch_add(1, Ordering::AcqRel) + 1;
        let path = filename::prep_path(&state.path, id);
        filename::allocate_file(&path, state.file_max)?;
        state.metrics.incr_prealloc_files();
    }
    Ok(())
}

/// One periodic cycle: preallocate, then archive if the exclusion lock is
/// immediately available. Contention is not an error; the cycle defers.
pub(crate) fn server_cycle(state: &LogState) -> LogResult<()> {
    if state.prealloc_enabled {
        prealloc_once(state)?;
    }

    if state.archive_enabled {
        match state.archive_lock.try_write() {
            Ok(archive) => archive_once(state, 0, &archive)?,
            Err(std::sync::TryLockError::WouldBlock) => {
                Logger::trace("LOG_ARCHIVE_DEFERRED", &[]);
            }
            Err(std::sync::TryLockError::Poisoned(_)) => {
                return Err(LogError::Resource("archive lock poisoned".to_string()));
            }
        }
    }
    Ok(())
}

/// Archive/preallocate server thread body.
pub(crate) fn run(state: &LogState) {
    while state.is_running() {
        if let Err(e) = server_cycle(state) {
            super::report_fatal("log-server", &e);
            return;
        }
        if let Err(e) = state.server_sig.wait_timeout(SERVER_WAIT) {
            super::report_fatal("log-server", &e);
            return;
        }
    }
}
