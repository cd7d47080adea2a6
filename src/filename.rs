//! Segment file naming and directory listing.
//!
//! Segment files are named `ember-wal.<number>` and preallocated spares
//! `ember-prep.<number>`, where `<number>` is the zero-padded decimal
//! segment or spare id. The numeric suffix is the only thing the rest of
//! the manager ever derives from a name.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::{LogError, LogResult};

/// Prefix of live segment files.
pub const LOG_PREFIX: &str = "ember-wal";

/// Prefix of preallocated spare files.
pub const PREP_PREFIX: &str = "ember-prep";

/// File name of segment `id`.
pub fn log_filename(id: u32) -> String {
    format!("{}.{:010}", LOG_PREFIX, id)
}

/// File name of spare `id`.
pub fn prep_filename(id: u32) -> String {
    format!("{}.{:010}", PREP_PREFIX, id)
}

/// Full path of segment `id` under `dir`.
pub fn segment_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(log_filename(id))
}

/// Full path of spare `id` under `dir`.
pub fn prep_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(prep_filename(id))
}

/// Extract the numeric suffix from a segment or spare file name.
pub fn extract_log_number(name: &str) -> LogResult<u32> {
    let suffix = name
        .rsplit_once('.')
        .map(|(_, s)| s)
        .ok_or_else(|| LogError::InvalidOperation(format!("unrecognized log file name {:?}", name)))?;
    suffix
        .parse::<u32>()
        .map_err(|_| LogError::InvalidOperation(format!("unrecognized log file name {:?}", name)))
}

/// List file names under `dir` that start with `prefix`, in no particular
/// order.
pub fn list_files(dir: &Path, prefix: &str) -> LogResult<Vec<String>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| LogError::io(format!("failed to list log directory {}", dir.display()), e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| LogError::io(format!("failed to list log directory {}", dir.display()), e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) {
            names.push(name.into_owned());
        }
    }
    Ok(names)
}

/// Remove segment file `id` under `dir`.
pub fn remove_segment(dir: &Path, id: u32) -> LogResult<()> {
    let path = segment_path(dir, id);
    fs::remove_file(&path)
        .map_err(|e| LogError::io(format!("failed to remove segment {}", path.display()), e))
}

/// Create a file preallocated to `size` bytes and flushed to stable storage.
pub fn allocate_file(path: &Path, size: u64) -> LogResult<File> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| LogError::io(format!("failed to create log file {}", path.display()), e))?;
    file.set_len(size)
        .map_err(|e| LogError::io(format!("failed to extend log file {}", path.display()), e))?;
    file.sync_all()
        .map_err(|e| LogError::io(format!("failed to fsync log file {}", path.display()), e))?;
    Ok(file)
}

/// Open an existing file for writing (segment switch after spare reuse).
pub fn open_file(path: &Path) -> LogResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| LogError::io(format!("failed to open log file {}", path.display()), e))
}

/// Find the lowest-numbered spare file under `dir`, if any.
pub fn oldest_spare(dir: &Path) -> LogResult<Option<u32>> {
    let mut lowest: Option<u32> = None;
    for name in list_files(dir, PREP_PREFIX)? {
        let num = extract_log_number(&name)?;
        lowest = Some(match lowest {
            Some(prev) => prev.min(num),
            None => num,
        });
    }
    Ok(lowest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filename_round_trip() {
        let name = log_filename(42);
        assert_eq!(name, "ember-wal.0000000042");
        assert_eq!(extract_log_number(&name).unwrap(), 42);

        let name = prep_filename(7);
        assert_eq!(name, "ember-prep.0000000007");
        assert_eq!(extract_log_number(&name).unwrap(), 7);
    }

    #[test]
    fn test_extract_rejects_garbage() {
        assert!(extract_log_number("ember-wal").is_err());
        assert!(extract_log_number("ember-wal.notanumber").is_err());
    }

    #[test]
    fn test_list_files_filters_by_prefix() {
        let dir = TempDir::new().unwrap();
        allocate_file(&segment_path(dir.path(), 1), 64).unwrap();
        allocate_file(&segment_path(dir.path(), 2), 64).unwrap();
        allocate_file(&prep_path(dir.path(), 1), 64).unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let mut segments = list_files(dir.path(), LOG_PREFIX).unwrap();
        segments.sort();
        assert_eq!(
            segments,
            vec!["ember-wal.0000000001", "ember-wal.0000000002"]
        );

        let spares = list_files(dir.path(), PREP_PREFIX).unwrap();
        assert_eq!(spares, vec!["ember-prep.0000000001"]);
    }

    #[test]
    fn test_allocate_file_sets_size() {
        let dir = TempDir::new().unwrap();
        let path = segment_path(dir.path(), 9);
        let file = allocate_file(&path, 4096).unwrap();
        drop(file);
        assert_eq!(fs::metadata(&path).unwrap().len(), 4096);
    }

    #[test]
    fn test_allocate_file_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = segment_path(dir.path(), 9);
        allocate_file(&path, 64).unwrap();
        assert!(allocate_file(&path, 64).is_err());
    }

    #[test]
    fn test_oldest_spare() {
        let dir = TempDir::new().unwrap();
        assert_eq!(oldest_spare(dir.path()).unwrap(), None);

        allocate_file(&prep_path(dir.path(), 5), 64).unwrap();
        allocate_file(&prep_path(dir.path(), 3), 64).unwrap();
        assert_eq!(oldest_spare(dir.path()).unwrap(), Some(3));
    }

    #[test]
    fn test_remove_segment() {
        let dir = TempDir::new().unwrap();
        allocate_file(&segment_path(dir.path(), 4), 64).unwrap();
        remove_segment(dir.path(), 4).unwrap();
        assert!(!segment_path(dir.path(), 4).exists());
        assert!(remove_segment(dir.path(), 4).is_err());
    }
}
