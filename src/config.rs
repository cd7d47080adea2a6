//! Log manager configuration.
//!
//! The engine hands the log manager a JSON configuration snapshot with two
//! recognized sections, `log` and `transaction_sync`. Unknown sections are
//! ignored here (they belong to other subsystems); malformed or conflicting
//! values inside the recognized sections fail `create` synchronously.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{LogError, LogResult};

/// Smallest accepted segment size. Below this the segment-switch overhead
/// dominates and the close server can never keep up.
pub const LOG_FILE_MIN: u64 = 1024;

/// Largest accepted segment size; offsets within a segment are 32 bits.
pub const LOG_FILE_LIMIT: u64 = u32::MAX as u64;

/// Compressor names the engine knows how to load.
const KNOWN_COMPRESSORS: &[&str] = &["none", "snappy", "zlib", "zstd"];

/// Top-level configuration snapshot handed in by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `log.*` options.
    #[serde(default)]
    pub log: LogConfig,

    /// `transaction_sync.*` options.
    #[serde(default)]
    pub transaction_sync: TransactionSyncConfig,
}

impl EngineConfig {
    /// Parse a JSON configuration snapshot.
    pub fn from_json(snapshot: &str) -> LogResult<Self> {
        serde_json::from_str(snapshot)
            .map_err(|e| LogError::Config(format!("malformed configuration snapshot: {}", e)))
    }
}

/// `log` section of the configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Whether logging is enabled at all (default: false).
    #[serde(default)]
    pub enabled: bool,

    /// Named record compressor, or "none" (default: "none").
    ///
    /// Compressor selection itself is the record codec's concern; this
    /// subsystem only validates that the name is one the engine can load.
    #[serde(default = "default_compressor")]
    pub compressor: String,

    /// Directory holding the segment files (default: "log").
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Enable periodic deletion of segments behind the checkpoint/durability
    /// boundary (default: true).
    #[serde(default = "default_archive")]
    pub archive: bool,

    /// Maximum segment file size in bytes (default: 100 MiB).
    #[serde(default = "default_file_max")]
    pub file_max: u64,

    /// Target number of preallocated spare segment files. Zero disables
    /// preallocation (default: 0). The target grows adaptively when the
    /// segment-switch path misses a spare.
    #[serde(default)]
    pub prealloc: u32,

    /// What to do when startup would require log replay (default: "on").
    #[serde(default)]
    pub recover: RecoveryPolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            compressor: default_compressor(),
            path: default_path(),
            archive: default_archive(),
            file_max: default_file_max(),
            prealloc: 0,
            recover: RecoveryPolicy::default(),
        }
    }
}

fn default_compressor() -> String {
    "none".to_string()
}

fn default_path() -> PathBuf {
    PathBuf::from("log")
}

fn default_archive() -> bool {
    true
}

fn default_file_max() -> u64 {
    100 * 1024 * 1024
}

impl LogConfig {
    /// Validate the section.
    ///
    /// When logging is disabled only the path needs to be usable (it is
    /// retained for later cleanup); everything else is ignored.
    pub fn validate(&self) -> LogResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(LogError::Config("log.path must not be empty".to_string()));
        }

        if !self.enabled {
            return Ok(());
        }

        if self.file_max < LOG_FILE_MIN {
            return Err(LogError::Config(format!(
                "log.file_max {} below minimum {}",
                self.file_max, LOG_FILE_MIN
            )));
        }
        if self.file_max > LOG_FILE_LIMIT {
            return Err(LogError::Config(format!(
                "log.file_max {} above limit {}",
                self.file_max, LOG_FILE_LIMIT
            )));
        }

        if !KNOWN_COMPRESSORS.contains(&self.compressor.as_str()) {
            return Err(LogError::Config(format!(
                "log.compressor \"{}\" is not recognized",
                self.compressor
            )));
        }

        Ok(())
    }

    /// Whether a background archive/preallocate server is wanted.
    pub fn wants_server(&self) -> bool {
        self.enabled && (self.archive || self.prealloc > 0)
    }
}

/// `log.recover` policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Replay the log on startup when needed.
    #[default]
    On,
    /// Fail startup if replay would be required.
    Error,
}

/// `transaction_sync` section of the configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSyncConfig {
    /// Whether commits force a log flush (default: true).
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,

    /// How a forced flush reaches stable storage (default: "fsync").
    #[serde(default)]
    pub method: SyncMethod,
}

impl Default for TransactionSyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            method: SyncMethod::default(),
        }
    }
}

fn default_sync_enabled() -> bool {
    true
}

/// Flush method used by the commit path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMethod {
    /// Synchronous write-through on every write.
    Dsync,
    /// Explicit fsync at commit.
    #[default]
    Fsync,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(!config.log.enabled);
        assert!(config.log.validate().is_ok());
        assert!(config.transaction_sync.enabled);
        assert_eq!(config.transaction_sync.method, SyncMethod::Fsync);
    }

    #[test]
    fn test_parse_snapshot() {
        let config = EngineConfig::from_json(
            r#"{
                "log": {
                    "enabled": true,
                    "path": "/var/lib/ember/log",
                    "archive": false,
                    "file_max": 1048576,
                    "prealloc": 3
                },
                "transaction_sync": { "enabled": true, "method": "dsync" }
            }"#,
        )
        .unwrap();

        assert!(config.log.enabled);
        assert!(!config.log.archive);
        assert_eq!(config.log.file_max, 1_048_576);
        assert_eq!(config.log.prealloc, 3);
        assert_eq!(config.transaction_sync.method, SyncMethod::Dsync);
        assert!(config.log.validate().is_ok());
    }

    #[test]
    fn test_malformed_snapshot_rejected() {
        let err = EngineConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, LogError::Config(_)));
    }

    #[test]
    fn test_file_max_bounds() {
        let mut config = LogConfig {
            enabled: true,
            ..LogConfig::default()
        };

        config.file_max = LOG_FILE_MIN - 1;
        assert!(config.validate().is_err());

        config.file_max = LOG_FILE_LIMIT + 1;
        assert!(config.validate().is_err());

        config.file_max = LOG_FILE_MIN;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_compressor_rejected() {
        let config = LogConfig {
            enabled: true,
            compressor: "zipzap".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(config.validate(), Err(LogError::Config(_))));
    }

    #[test]
    fn test_disabled_skips_validation() {
        // A disabled log section only needs a usable path.
        let config = LogConfig {
            enabled: false,
            compressor: "zipzap".to_string(),
            file_max: 1,
            ..LogConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_recover_error_policy() {
        let config = EngineConfig::from_json(
            r#"{ "log": { "enabled": true, "recover": "error" } }"#,
        )
        .unwrap();
        assert_eq!(config.log.recover, RecoveryPolicy::Error);
    }

    #[test]
    fn test_wants_server() {
        let mut config = LogConfig {
            enabled: true,
            archive: false,
            prealloc: 0,
            ..LogConfig::default()
        };
        assert!(!config.wants_server());

        config.archive = true;
        assert!(config.wants_server());

        config.archive = false;
        config.prealloc = 2;
        assert!(config.wants_server());

        config.enabled = false;
        assert!(!config.wants_server());
    }
}
