//! emberwal - Write-ahead log manager for the EmberDB storage engine
//!
//! Reservation, write-LSN consolidation, segment close/sync, archiving
//! and preallocation, driven by dedicated background server threads.

pub mod config;
pub mod errors;
pub mod filename;
pub mod lsn;
pub mod manager;
pub mod observability;
pub mod slot;

mod server;
mod sync;

pub use config::{EngineConfig, LogConfig, RecoveryPolicy, SyncMethod, TransactionSyncConfig};
pub use errors::{LogError, LogResult};
pub use lsn::{AtomicLsn, Lsn};
pub use manager::LogManager;
pub use observability::{LogMetrics, Logger, Severity};
pub use slot::{SlotState, SLOT_POOL};
