//! Log manager lifecycle and shared state.
//!
//! One `LogManager` exists per open storage engine. `create` validates the
//! configuration snapshot, builds the shared `LogState`, and opens the
//! first segment file; `open` starts the background servers; `destroy`
//! stops and joins them in a fixed order, then releases every file handle.
//! Teardown accumulates failures instead of short-circuiting so that all
//! resources get a release attempt.
//!
//! `LogState` is the single owned context every background server receives
//! at spawn time; there are no ambient globals.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{EngineConfig, RecoveryPolicy, SyncMethod, TransactionSyncConfig};
use crate::errors::{LogError, LogResult};
use crate::filename;
use crate::lsn::{AtomicLsn, Lsn};
use crate::observability::{LogMetrics, Logger};
use crate::server;
use crate::slot::{SlotPool, SlotState};
use crate::sync::Signal;

/// Bounded yields while waiting for a free slot before giving up.
const RESERVE_RETRIES: u32 = 10_000;

/// A segment file the manager currently holds open.
#[derive(Debug)]
pub(crate) struct SegmentFile {
    /// Segment number encoded in the file name.
    pub(crate) id: u32,
    /// Open handle.
    pub(crate) file: File,
}

/// Hot-backup bookkeeping guarded by the archive exclusion lock.
///
/// The flag is only ever read or written while holding the lock, which
/// also serializes the periodic archive cycle against manual archive
/// requests — a reader of the flag cannot race an archiver into a
/// check-then-act window.
#[derive(Debug, Default)]
pub(crate) struct ArchiveState {
    /// A backup cursor is pinning the log.
    pub(crate) hot_backup: bool,
}

/// Shared state of one running log manager.
///
/// Boundary fields advance monotonically and each has exactly one writer:
/// `alloc_lsn` the reservation path, `write_lsn` the consolidator,
/// `sync_lsn` the close server, `first_lsn` the archive server, and
/// `ckpt_lsn` the checkpoint subsystem through the manager.
#[derive(Debug)]
pub(crate) struct LogState {
    /// Directory holding the segment files.
    pub(crate) path: PathBuf,
    /// Maximum segment size in bytes.
    pub(crate) file_max: u64,
    /// Periodic archiving configured.
    pub(crate) archive_enabled: bool,
    /// Preallocation configured (target > 0).
    pub(crate) prealloc_enabled: bool,

    /// Cooperative shutdown flag checked by every server loop.
    running: AtomicBool,

    /// Next byte position available for reservation.
    pub(crate) alloc_lsn: AtomicLsn,
    /// Highest LSN handed off for I/O, advanced in strict order.
    pub(crate) write_lsn: AtomicLsn,
    /// Highest LSN known durable on stable storage.
    pub(crate) sync_lsn: AtomicLsn,
    /// Boundary below which the last checkpoint no longer needs the log.
    pub(crate) ckpt_lsn: AtomicLsn,
    /// Lowest LSN still retained on disk.
    pub(crate) first_lsn: AtomicLsn,
    /// Truncation bookkeeping, maintained by collaborators.
    pub(crate) trunc_lsn: AtomicLsn,
    /// Directory-sync bookkeeping, maintained by collaborators.
    pub(crate) sync_dir_lsn: AtomicLsn,

    /// Number of the segment currently open for writing.
    pub(crate) fileid: AtomicU32,
    /// Sequence for naming spare files.
    pub(crate) prep_fileid: AtomicU32,
    /// Target number of spare files; grows adaptively.
    pub(crate) prealloc_target: AtomicU32,
    /// Segment switches since the last preallocation cycle that found no
    /// spare.
    pub(crate) prep_missed: AtomicU32,

    /// The write slot pool.
    pub(crate) pool: SlotPool,

    /// Guards reservation bookkeeping (`alloc_lsn`, segment switch).
    slot_lock: Mutex<()>,
    /// Guards `sync_lsn` updates and the close handoff. Never held across
    /// an fsync.
    pub(crate) sync_lock: Mutex<()>,
    /// Segment currently open for writing.
    pub(crate) current_file: Mutex<Option<SegmentFile>>,
    /// Segment waiting for the close server.
    pub(crate) close_file: Mutex<Option<SegmentFile>>,
    /// Serializes archiving against backup cursors and manual requests.
    pub(crate) archive_lock: RwLock<ArchiveState>,

    /// Wakes the consolidator when a slot becomes `Written`.
    pub(crate) wrlsn_sig: Signal,
    /// Announces a `write_lsn` advance.
    pub(crate) write_sig: Signal,
    /// Announces a `sync_lsn` advance.
    pub(crate) sync_sig: Signal,
    /// A file needs closing.
    pub(crate) close_sig: Signal,
    /// The archive/preallocate server should re-check for work.
    pub(crate) server_sig: Signal,

    /// Operational counters.
    pub(crate) metrics: LogMetrics,
}

impl LogState {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Reserve a slot for `len` bytes at the current allocation position.
    ///
    /// Switches to the next segment first when the bytes would not fit in
    /// the current one. The slot handed out after a switch is chained at
    /// the departed segment's end while its bytes start the new segment,
    /// keeping the consolidation chain gap-free across the boundary, and
    /// it carries the close-file flag so consolidating it signals the
    /// close server.
    pub(crate) fn reserve(&self, len: u32) -> LogResult<usize> {
        if len as u64 > self.file_max {
            return Err(LogError::InvalidOperation(format!(
                "reservation of {} bytes exceeds log.file_max {}",
                len, self.file_max
            )));
        }

        let guard = self
            .slot_lock
            .lock()
            .map_err(|_| LogError::Resource("slot lock poisoned".to_string()))?;

        let release_lsn = self.alloc_lsn.load();
        let mut start_lsn = release_lsn;
        let mut close_file = false;
        if release_lsn.offset > 0 && release_lsn.offset as u64 + len as u64 > self.file_max {
            self.switch_segment_locked(&guard)?;
            start_lsn = self.alloc_lsn.load();
            close_file = true;
        }

        let mut retries = 0;
        let index = loop {
            if let Some(index) = self
                .pool
                .try_reserve(release_lsn, start_lsn, len, close_file)
            {
                break index;
            }
            if retries >= RESERVE_RETRIES {
                return Err(LogError::Resource(
                    "slot pool exhausted; consolidator is not draining slots".to_string(),
                ));
            }
            retries += 1;
            thread::yield_now();
        };

        self.alloc_lsn.store(start_lsn.advance(len));
        Ok(index)
    }

    /// Mark slot `index` written: its bytes have been submitted for I/O.
    ///
    /// Wakes the consolidator.
    pub(crate) fn complete(&self, index: usize) -> LogResult<()> {
        let start = self.pool.start_lsn(index);
        let len = self.pool.reserved_len(index);
        self.pool.set_written(index, start.advance(len));
        self.wrlsn_sig.notify()
    }

    /// Close the current segment for writing and open the next one.
    pub(crate) fn switch_segment(&self) -> LogResult<()> {
        let guard = self
            .slot_lock
            .lock()
            .map_err(|_| LogError::Resource("slot lock poisoned".to_string()))?;
        self.switch_segment_locked(&guard)
    }

    fn switch_segment_locked(&self, _guard: &MutexGuard<'_, ()>) -> LogResult<()> {
        let new_id = self.fileid.fetch_add(1, Ordering::AcqRel) + 1;
        let seg_path = filename::segment_path(&self.path, new_id);

        // Prefer renaming a spare into place; creating a file here is the
        // latency the preallocator exists to avoid.
        let file = match filename::oldest_spare(&self.path)? {
            Some(spare_id) => {
                let spare = filename::prep_path(&self.path, spare_id);
                fs::rename(&spare, &seg_path).map_err(|e| {
                    LogError::io(
                        format!("failed to recycle spare {} into {}", spare.display(), seg_path.display()),
                        e,
                    )
                })?;
                filename::open_file(&seg_path)?
            }
            None => {
                if self.prealloc_enabled {
                    self.prep_missed.fetch_add(1, Ordering::AcqRel);
                    self.metrics.incr_prealloc_missed();
                }
                filename::allocate_file(&seg_path, self.file_max)?
            }
        };

        let old = {
            let mut current = self
                .current_file
                .lock()
                .map_err(|_| LogError::Resource("current-file lock poisoned".to_string()))?;
            current.replace(SegmentFile { id: new_id, file })
        };
        if let Some(old) = old {
            self.stage_pending_close(old)?;
        }

        self.alloc_lsn.store(Lsn::new(new_id, 0));
        self.close_sig.notify()?;
        Ok(())
    }

    /// Hand a departed segment to the close server.
    ///
    /// If the close server has not collected the previous pending file yet,
    /// that older file is fsynced and closed inline; `sync_lsn` is left for
    /// the close server, which only advances it at file boundaries it has
    /// confirmed itself.
    fn stage_pending_close(&self, seg: SegmentFile) -> LogResult<()> {
        let mut pending = self
            .close_file
            .lock()
            .map_err(|_| LogError::Resource("pending-close lock poisoned".to_string()))?;
        if let Some(prev) = pending.take() {
            Logger::warn(
                "LOG_FORCED_CLOSE",
                &[("segment", &prev.id.to_string())],
            );
            prev.file.sync_all().map_err(|e| {
                LogError::io(format!("failed to fsync segment {}", prev.id), e)
            })?;
        }
        *pending = Some(seg);
        Ok(())
    }

    /// Block until `sync_lsn >= target` or `timeout` elapses.
    pub(crate) fn wait_sync_lsn(&self, target: Lsn, timeout: Duration) -> LogResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.sync_lsn.load() >= target {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            self.sync_sig.wait_timeout(deadline - now)?;
        }
    }
}

/// The write-ahead log manager.
pub struct LogManager {
    /// Shared state; `None` when logging is disabled by configuration.
    state: Option<Arc<LogState>>,
    /// Retained even when disabled, for later cleanup.
    log_path: PathBuf,
    archive_enabled: bool,
    server_wanted: bool,
    txn_sync: TransactionSyncConfig,
    recover: RecoveryPolicy,
    close_thread: Option<JoinHandle<()>>,
    wrlsn_thread: Option<JoinHandle<()>>,
    server_thread: Option<JoinHandle<()>>,
}

impl LogManager {
    /// Build a log manager from the engine's configuration snapshot.
    ///
    /// With `log.enabled = false` this is a no-op that still retains the
    /// configured log path. Otherwise the log directory is created, the
    /// first segment file opened, and every boundary LSN initialized; no
    /// threads start until [`LogManager::open`].
    pub fn create(config: &EngineConfig) -> LogResult<LogManager> {
        config.log.validate()?;
        let log = &config.log;

        if !log.enabled {
            return Ok(LogManager {
                state: None,
                log_path: log.path.clone(),
                archive_enabled: false,
                server_wanted: false,
                txn_sync: config.transaction_sync.clone(),
                recover: log.recover,
                close_thread: None,
                wrlsn_thread: None,
                server_thread: None,
            });
        }

        fs::create_dir_all(&log.path).map_err(|e| {
            LogError::io(
                format!("failed to create log directory {}", log.path.display()),
                e,
            )
        })?;

        let seg_path = filename::segment_path(&log.path, 1);
        let file = if seg_path.exists() {
            filename::open_file(&seg_path)?
        } else {
            filename::allocate_file(&seg_path, log.file_max)?
        };

        let state = LogState {
            path: log.path.clone(),
            file_max: log.file_max,
            archive_enabled: log.archive,
            prealloc_enabled: log.prealloc > 0,
            running: AtomicBool::new(false),
            alloc_lsn: AtomicLsn::new(Lsn::FIRST),
            write_lsn: AtomicLsn::new(Lsn::FIRST),
            sync_lsn: AtomicLsn::new(Lsn::FIRST),
            ckpt_lsn: AtomicLsn::new(Lsn::FIRST),
            first_lsn: AtomicLsn::new(Lsn::FIRST),
            trunc_lsn: AtomicLsn::new(Lsn::FIRST),
            sync_dir_lsn: AtomicLsn::new(Lsn::ZERO),
            fileid: AtomicU32::new(1),
            prep_fileid: AtomicU32::new(0),
            prealloc_target: AtomicU32::new(log.prealloc),
            prep_missed: AtomicU32::new(0),
            pool: SlotPool::new(),
            slot_lock: Mutex::new(()),
            sync_lock: Mutex::new(()),
            current_file: Mutex::new(Some(SegmentFile { id: 1, file })),
            close_file: Mutex::new(None),
            archive_lock: RwLock::new(ArchiveState::default()),
            wrlsn_sig: Signal::new("log-wrlsn"),
            write_sig: Signal::new("log-write"),
            sync_sig: Signal::new("log-sync"),
            close_sig: Signal::new("log-close"),
            server_sig: Signal::new("log-server"),
            metrics: LogMetrics::new(),
        };
        state.metrics.set_max_filesize(log.file_max);

        Logger::info(
            "LOG_MANAGER_CREATE",
            &[
                ("path", &log.path.display().to_string()),
                ("file_max", &log.file_max.to_string()),
                ("archive", &log.archive.to_string()),
                ("prealloc", &log.prealloc.to_string()),
            ],
        );

        Ok(LogManager {
            state: Some(Arc::new(state)),
            log_path: log.path.clone(),
            archive_enabled: log.archive,
            server_wanted: log.wants_server(),
            txn_sync: config.transaction_sync.clone(),
            recover: log.recover,
            close_thread: None,
            wrlsn_thread: None,
            server_thread: None,
        })
    }

    /// Whether logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Configured log directory, retained even when logging is disabled.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Configured commit flush behavior, read by the commit path.
    pub fn sync_method(&self) -> SyncMethod {
        self.txn_sync.method
    }

    /// Whether commits force a flush.
    pub fn sync_on_commit(&self) -> bool {
        self.txn_sync.enabled
    }

    /// Configured startup recovery policy.
    pub fn recovery_policy(&self) -> RecoveryPolicy {
        self.recover
    }

    /// Start the background servers.
    ///
    /// The close server and the consolidator always run; the
    /// archive/preallocate server runs only when configured. Calling `open`
    /// on an already-running manager just signals the archive server to
    /// re-check for work.
    pub fn open(&mut self) -> LogResult<()> {
        let Some(state) = self.state.clone() else {
            return Ok(());
        };

        if state.running.swap(true, Ordering::AcqRel) {
            if self.server_wanted {
                state.server_sig.notify()?;
            }
            return Ok(());
        }

        self.close_thread = Some(spawn_server(
            "log-close-server",
            Arc::clone(&state),
            server::close::run,
        )?);
        self.wrlsn_thread = Some(spawn_server(
            "log-wrlsn-server",
            Arc::clone(&state),
            server::wrlsn::run,
        )?);

        if self.server_wanted {
            self.server_thread = Some(spawn_server(
                "log-server",
                Arc::clone(&state),
                server::archive::run,
            )?);
        }

        Logger::info(
            "LOG_MANAGER_OPEN",
            &[("path", &self.log_path.display().to_string())],
        );
        Ok(())
    }

    /// Stop the servers, join them, and release every resource.
    ///
    /// Teardown order is fixed: archive server, close server, consolidator,
    /// then the remaining file handles. Individual failures are accumulated
    /// and reported together; every step is always attempted.
    pub fn destroy(mut self) -> LogResult<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> LogResult<()> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };
        let mut failures: Vec<String> = Vec::new();

        state.running.store(false, Ordering::Release);

        let stops = [
            (self.server_thread.take(), &state.server_sig, "log-server"),
            (self.close_thread.take(), &state.close_sig, "log-close-server"),
            (self.wrlsn_thread.take(), &state.wrlsn_sig, "log-wrlsn-server"),
        ];
        for (handle, sig, name) in stops {
            let Some(handle) = handle else { continue };
            if let Err(e) = sig.notify() {
                failures.push(format!("{}: {}", name, e));
            }
            if handle.join().is_err() {
                failures.push(format!("{} panicked", name));
            }
        }

        for (slot, what) in [
            (&state.close_file, "pending-close segment"),
            (&state.current_file, "current segment"),
        ] {
            match slot.lock() {
                Ok(mut guard) => {
                    if let Some(seg) = guard.take() {
                        if let Err(e) = seg.file.sync_all() {
                            failures.push(format!("failed to fsync {} {}: {}", what, seg.id, e));
                        }
                    }
                }
                Err(_) => failures.push(format!("{} lock poisoned", what)),
            }
        }

        Logger::info(
            "LOG_MANAGER_DESTROY",
            &[("failures", &failures.len().to_string())],
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LogError::Teardown(failures.join("; ")))
        }
    }

    fn shared(&self) -> LogResult<&Arc<LogState>> {
        self.state
            .as_ref()
            .ok_or_else(|| LogError::InvalidOperation("logging is disabled".to_string()))
    }

    /// Reserve a slot for `len` bytes. Producer-side entry point.
    pub fn reserve(&self, len: u32) -> LogResult<usize> {
        self.shared()?.reserve(len)
    }

    /// Mark a reserved slot's bytes as submitted for I/O.
    pub fn complete(&self, slot: usize) -> LogResult<()> {
        self.shared()?.complete(slot)
    }

    /// Close the current segment for writing and open the next one.
    pub fn switch_segment(&self) -> LogResult<()> {
        self.shared()?.switch_segment()
    }

    /// Delete segment files behind the checkpoint/backup boundary now.
    ///
    /// Used by backup tooling. Fails with an invalid-operation error when
    /// the periodic archive server is configured and running — two
    /// independent deleters must never race. The conflict check happens
    /// under the archive exclusion lock.
    pub fn truncate_files(&self, backup_file: Option<u32>) -> LogResult<()> {
        let state = self.shared()?;
        let archive = state
            .archive_lock
            .write()
            .map_err(|_| LogError::Resource("archive lock poisoned".to_string()))?;

        if self.archive_enabled && self.server_thread.is_some() && state.is_running() {
            return Err(LogError::InvalidOperation(
                "cannot archive manually while the log archive server is running".to_string(),
            ));
        }

        let backup_file = backup_file.unwrap_or(0);
        debug_assert!(backup_file <= state.alloc_lsn.load().file);
        Logger::info(
            "LOG_TRUNCATE_FILES",
            &[("backup_file", &backup_file.to_string())],
        );
        server::archive::archive_once(state, backup_file, &archive)
    }

    /// Record the checkpoint boundary. Written by the checkpoint subsystem.
    pub fn set_ckpt_lsn(&self, lsn: Lsn) -> LogResult<()> {
        self.shared()?.ckpt_lsn.store(lsn);
        Ok(())
    }

    /// Toggle the hot-backup flag under the archive exclusion lock.
    pub fn set_hot_backup(&self, active: bool) -> LogResult<()> {
        let state = self.shared()?;
        let mut archive = state
            .archive_lock
            .write()
            .map_err(|_| LogError::Resource("archive lock poisoned".to_string()))?;
        archive.hot_backup = active;
        Ok(())
    }

    /// Wake the archive/preallocate server for an immediate cycle.
    pub fn signal_server(&self) -> LogResult<()> {
        self.shared()?.server_sig.notify()
    }

    /// Highest LSN handed off for I/O.
    pub fn write_lsn(&self) -> LogResult<Lsn> {
        Ok(self.shared()?.write_lsn.load())
    }

    /// Highest LSN known durable.
    pub fn sync_lsn(&self) -> LogResult<Lsn> {
        Ok(self.shared()?.sync_lsn.load())
    }

    /// Current checkpoint boundary.
    pub fn ckpt_lsn(&self) -> LogResult<Lsn> {
        Ok(self.shared()?.ckpt_lsn.load())
    }

    /// Lowest LSN still retained on disk.
    pub fn first_lsn(&self) -> LogResult<Lsn> {
        Ok(self.shared()?.first_lsn.load())
    }

    /// State of one pool slot.
    pub fn slot_state(&self, index: usize) -> LogResult<SlotState> {
        Ok(self.shared()?.pool.state(index))
    }

    /// Block until `sync_lsn >= target` or `timeout` elapses. Returns
    /// whether the target was reached.
    pub fn wait_sync_lsn(&self, target: Lsn, timeout: Duration) -> LogResult<bool> {
        self.shared()?.wait_sync_lsn(target, timeout)
    }

    /// Operational counters.
    pub fn metrics(&self) -> LogResult<&LogMetrics> {
        Ok(&self.shared()?.metrics)
    }

    #[cfg(test)]
    pub(crate) fn state_for_tests(&self) -> &Arc<LogState> {
        self.state.as_ref().expect("logging enabled")
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        // Best effort; destroy() reports errors, Drop cannot.
        let _ = self.teardown();
    }
}

fn spawn_server(
    name: &'static str,
    state: Arc<LogState>,
    body: fn(&LogState),
) -> LogResult<JoinHandle<()>> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(&state))
        .map_err(|e| LogError::Resource(format!("failed to spawn {}: {}", name, e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::LogConfig;
    use tempfile::TempDir;

    pub(crate) fn test_config(dir: &Path) -> EngineConfig {
        EngineConfig {
            log: LogConfig {
                enabled: true,
                path: dir.to_path_buf(),
                archive: false,
                file_max: 4096,
                prealloc: 0,
                ..LogConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_disabled_manager_is_inert() {
        let config = EngineConfig::default();
        let mut manager = LogManager::create(&config).unwrap();
        assert!(!manager.is_enabled());
        assert_eq!(manager.log_path(), Path::new("log"));

        manager.open().unwrap();
        assert!(manager.write_lsn().is_err());
        manager.destroy().unwrap();
    }

    #[test]
    fn test_create_opens_first_segment() {
        let dir = TempDir::new().unwrap();
        let manager = LogManager::create(&test_config(dir.path())).unwrap();

        assert!(filename::segment_path(dir.path(), 1).exists());
        assert_eq!(manager.write_lsn().unwrap(), Lsn::FIRST);
        assert_eq!(manager.sync_lsn().unwrap(), Lsn::FIRST);
        assert_eq!(manager.metrics().unwrap().max_filesize(), 4096);

        manager.destroy().unwrap();
    }

    #[test]
    fn test_reserve_advances_alloc_lsn() {
        let dir = TempDir::new().unwrap();
        let manager = LogManager::create(&test_config(dir.path())).unwrap();
        let state = Arc::clone(manager.state_for_tests());

        let a = manager.reserve(100).unwrap();
        let b = manager.reserve(50).unwrap();
        assert_eq!(state.pool.release_lsn(a), Lsn::new(1, 0));
        assert_eq!(state.pool.release_lsn(b), Lsn::new(1, 100));
        assert_eq!(state.alloc_lsn.load(), Lsn::new(1, 150));

        manager.destroy().unwrap();
    }

    #[test]
    fn test_reserve_larger_than_file_max_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = LogManager::create(&test_config(dir.path())).unwrap();
        assert!(matches!(
            manager.reserve(8192),
            Err(LogError::InvalidOperation(_))
        ));
        manager.destroy().unwrap();
    }

    #[test]
    fn test_reserve_switches_segment_when_full() {
        let dir = TempDir::new().unwrap();
        let manager = LogManager::create(&test_config(dir.path())).unwrap();
        let state = Arc::clone(manager.state_for_tests());

        manager.reserve(3000).unwrap();
        let b = manager.reserve(3000).unwrap();

        // The second reservation did not fit in segment 1: it is chained at
        // segment 1's end but its bytes start segment 2.
        assert_eq!(state.pool.release_lsn(b), Lsn::new(1, 3000));
        assert_eq!(state.pool.start_lsn(b), Lsn::new(2, 0));
        assert!(state.pool.close_flag(b));
        assert_eq!(state.alloc_lsn.load(), Lsn::new(2, 3000));
        assert!(filename::segment_path(dir.path(), 2).exists());

        // Segment 1 is waiting for the close server.
        let pending = state.close_file.lock().unwrap();
        assert_eq!(pending.as_ref().map(|s| s.id), Some(1));

        drop(pending);
        manager.destroy().unwrap();
    }

    #[test]
    fn test_switch_reuses_spare() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.log.prealloc = 1;
        let manager = LogManager::create(&config).unwrap();
        let state = Arc::clone(manager.state_for_tests());

        filename::allocate_file(&filename::prep_path(dir.path(), 1), 4096).unwrap();

        manager.switch_segment().unwrap();
        assert!(filename::segment_path(dir.path(), 2).exists());
        assert!(!filename::prep_path(dir.path(), 1).exists());
        assert_eq!(state.prep_missed.load(Ordering::Relaxed), 0);

        // No spare left for the next switch.
        manager.switch_segment().unwrap();
        assert_eq!(state.prep_missed.load(Ordering::Relaxed), 1);
        assert_eq!(state.metrics.prealloc_missed(), 1);

        manager.destroy().unwrap();
    }

    #[test]
    fn test_destroy_flushes_open_files() {
        let dir = TempDir::new().unwrap();
        let manager = LogManager::create(&test_config(dir.path())).unwrap();
        manager.switch_segment().unwrap();
        // Segment 1 pending close, segment 2 current; both are released.
        manager.destroy().unwrap();
        assert!(filename::segment_path(dir.path(), 1).exists());
        assert!(filename::segment_path(dir.path(), 2).exists());
    }

    #[test]
    fn test_open_and_destroy_join_servers() {
        let dir = TempDir::new().unwrap();
        let mut manager = LogManager::create(&test_config(dir.path())).unwrap();
        manager.open().unwrap();
        assert!(manager.state_for_tests().is_running());
        manager.destroy().unwrap();
    }

    #[test]
    fn test_set_ckpt_lsn() {
        let dir = TempDir::new().unwrap();
        let manager = LogManager::create(&test_config(dir.path())).unwrap();
        manager.set_ckpt_lsn(Lsn::new(5, 0)).unwrap();
        assert_eq!(manager.ckpt_lsn().unwrap(), Lsn::new(5, 0));
        manager.destroy().unwrap();
    }
}
