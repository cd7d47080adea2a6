//! Background server loops.
//!
//! Three cooperating threads run per manager: the write-LSN consolidator
//! (`wrlsn`), the close/sync server (`close`), and the archive/preallocate
//! server (`archive`). Each loop checks the manager's running flag every
//! iteration and is woken promptly through its signal on shutdown; no
//! thread is ever cancelled asynchronously.
//!
//! A failed iteration stops the server: a thread that cannot reliably
//! advance durability boundaries must not keep advancing them. The failure
//! is reported through the structured logger, the only channel a detached
//! loop has.

pub(crate) mod archive;
pub(crate) mod close;
pub(crate) mod wrlsn;

use crate::errors::LogError;
use crate::observability::Logger;

/// Report a fatal server-loop error before the thread exits.
pub(crate) fn report_fatal(server: &str, err: &LogError) {
    Logger::error(
        "LOG_SERVER_FAILED",
        &[("server", server), ("error", &err.to_string())],
    );
}
