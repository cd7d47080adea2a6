//! Log sequence numbers.
//!
//! An LSN addresses one byte position in the logical log stream as a
//! (segment file number, byte offset) pair. Segment files are numbered from
//! 1, so `(1, 0)` is the smallest address the log can ever produce. All of
//! the manager's boundary fields (`alloc`, `write`, `sync`, `ckpt`, `first`)
//! are LSNs and only ever move forward over the lifetime of the process.
//!
//! The shared boundary fields are read concurrently by every background
//! server and by producer threads, so they are stored packed inside a single
//! `AtomicU64` (`AtomicLsn`) rather than behind a lock. Stores use release
//! ordering and loads use acquire ordering: a thread that observes an
//! advanced boundary also observes every write that happened before the
//! advance.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A position in the logical log stream.
///
/// Ordering is total: segment file number first, then byte offset within
/// the segment. No arithmetic ever crosses the file/offset boundary here;
/// rolling over into the next segment is the segment-switch path's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn {
    /// Segment file number, numbered from 1.
    pub file: u32,
    /// Byte offset within the segment file.
    pub offset: u32,
}

impl Lsn {
    /// The smallest valid log address: start of the first segment.
    ///
    /// Every boundary field starts here before any log activity.
    pub const FIRST: Lsn = Lsn { file: 1, offset: 0 };

    /// Explicit non-boundary marker (file 0 is never a real segment).
    pub const ZERO: Lsn = Lsn { file: 0, offset: 0 };

    /// Create an LSN from a segment number and offset.
    pub const fn new(file: u32, offset: u32) -> Self {
        Lsn { file, offset }
    }

    /// The address `len` bytes further into the same segment.
    pub const fn advance(self, len: u32) -> Self {
        Lsn {
            file: self.file,
            offset: self.offset + len,
        }
    }

    /// Whether this is the zero marker.
    pub fn is_zero(&self) -> bool {
        *self == Lsn::ZERO
    }

    const fn pack(self) -> u64 {
        ((self.file as u64) << 32) | self.offset as u64
    }

    const fn unpack(raw: u64) -> Self {
        Lsn {
            file: (raw >> 32) as u32,
            offset: raw as u32,
        }
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.file, self.offset)
    }
}

/// An `Lsn` that may be read and written concurrently without a lock.
///
/// The pair is packed into one `AtomicU64` so a reader can never observe a
/// torn file/offset combination.
#[derive(Debug)]
pub struct AtomicLsn(AtomicU64);

impl AtomicLsn {
    /// Create an atomic LSN holding `initial`.
    pub fn new(initial: Lsn) -> Self {
        AtomicLsn(AtomicU64::new(initial.pack()))
    }

    /// Read the current value.
    pub fn load(&self) -> Lsn {
        Lsn::unpack(self.0.load(Ordering::Acquire))
    }

    /// Publish a new value.
    pub fn store(&self, lsn: Lsn) {
        self.0.store(lsn.pack(), Ordering::Release);
    }
}
