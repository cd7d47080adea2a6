//! Fixed-size write slot pool.
//!
//! Producer threads stage log bytes through slots: a reservation moves a
//! slot `Free -> Active` and stamps the LSN its bytes begin at; once the
//! bytes are submitted for I/O the producer moves it `Active -> Written`
//! and stamps the end LSN. The consolidator is the only thread that moves
//! a slot `Written -> Free`, and producers own the other two transitions,
//! so no two threads ever race on the same transition and the pool needs
//! no lock of its own.
//!
//! The state field is the publication point: producers release-store
//! `Written` after stamping the LSN fields, and the consolidator
//! acquire-loads the state before reading them.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::lsn::{AtomicLsn, Lsn};

/// Number of slots in the pool.
pub const SLOT_POOL: usize = 32;

/// Lifecycle state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SlotState {
    /// Available for reservation.
    Free = 0,
    /// Reserved by a producer; bytes are being written.
    Active = 1,
    /// Bytes submitted for I/O; awaiting consolidation.
    Written = 2,
}

impl SlotState {
    fn from_raw(raw: u32) -> SlotState {
        match raw {
            0 => SlotState::Free,
            1 => SlotState::Active,
            _ => SlotState::Written,
        }
    }
}

/// One entry of the pool. Slots live for the lifetime of the pool; only
/// their state changes, never their index.
#[derive(Debug)]
pub struct Slot {
    state: AtomicU32,
    /// Position of this slot in the logical chain; stamped at reservation.
    /// Equals `start_lsn` except for the slot that spans a segment switch,
    /// where it is the end of the departed segment so the chain stays
    /// gap-free across the file boundary.
    release_lsn: AtomicLsn,
    /// Physical LSN at which this slot's bytes begin.
    start_lsn: AtomicLsn,
    /// LSN immediately after this slot's bytes; stamped at completion.
    end_lsn: AtomicLsn,
    /// Bytes reserved for this slot.
    len: AtomicU32,
    /// This slot starts a new segment: once its bytes are consolidated the
    /// previous segment can no longer receive writes and should be closed.
    close_file: AtomicBool,
}

impl Slot {
    fn new() -> Self {
        Slot {
            state: AtomicU32::new(SlotState::Free as u32),
            release_lsn: AtomicLsn::new(Lsn::ZERO),
            start_lsn: AtomicLsn::new(Lsn::ZERO),
            end_lsn: AtomicLsn::new(Lsn::ZERO),
            len: AtomicU32::new(0),
            close_file: AtomicBool::new(false),
        }
    }
}

/// A `Written` slot observed by a consolidator scan.
#[derive(Debug, Clone, Copy)]
pub struct WrittenSlot {
    /// Index of the slot in the pool.
    pub index: usize,
    /// LSN at which the slot's bytes begin.
    pub release_lsn: Lsn,
}

/// The fixed-capacity slot pool shared by all producers.
#[derive(Debug)]
pub struct SlotPool {
    slots: Vec<Slot>,
}

impl SlotPool {
    /// Create a pool with every slot `Free`.
    pub fn new() -> Self {
        SlotPool {
            slots: (0..SLOT_POOL).map(|_| Slot::new()).collect(),
        }
    }

    /// Reserve a free slot for `len` bytes beginning at `start_lsn`, with
    /// chain position `release_lsn`.
    ///
    /// Returns the slot index, or `None` when every slot is busy (the
    /// caller backs off and retries; the pool never blocks).
    pub fn try_reserve(
        &self,
        release_lsn: Lsn,
        start_lsn: Lsn,
        len: u32,
        close_file: bool,
    ) -> Option<usize> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .state
                .compare_exchange(
                    SlotState::Free as u32,
                    SlotState::Active as u32,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                slot.release_lsn.store(release_lsn);
                slot.start_lsn.store(start_lsn);
                slot.len.store(len, Ordering::Relaxed);
                slot.close_file.store(close_file, Ordering::Relaxed);
                return Some(index);
            }
        }
        None
    }

    /// Publish slot `index` as `Written` with its end LSN.
    ///
    /// Producer-only transition. The release-store of the state makes the
    /// LSN stamps visible to the consolidator's acquire-load.
    pub fn set_written(&self, index: usize, end_lsn: Lsn) {
        let slot = &self.slots[index];
        debug_assert_eq!(
            SlotState::from_raw(slot.state.load(Ordering::Relaxed)),
            SlotState::Active
        );
        slot.end_lsn.store(end_lsn);
        slot.state.store(SlotState::Written as u32, Ordering::Release);
    }

    /// Return slot `index` to `Free`. Consolidator-only transition.
    pub fn free(&self, index: usize) {
        let slot = &self.slots[index];
        debug_assert_eq!(
            SlotState::from_raw(slot.state.load(Ordering::Relaxed)),
            SlotState::Written
        );
        slot.state.store(SlotState::Free as u32, Ordering::Release);
    }

    /// Collect every currently `Written` slot into `out`.
    ///
    /// Optimistic scan: a slot observed as `Written` cannot be re-reserved
    /// until the consolidator frees it, so the entries stay valid for the
    /// rest of the consolidation pass.
    pub fn scan_written(&self, out: &mut Vec<WrittenSlot>) {
        out.clear();
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.state.load(Ordering::Acquire) != SlotState::Written as u32 {
                continue;
            }
            out.push(WrittenSlot {
                index,
                release_lsn: slot.release_lsn.load(),
            });
        }
    }

    /// Current state of slot `index`.
    pub fn state(&self, index: usize) -> SlotState {
        SlotState::from_raw(self.slots[index].state.load(Ordering::Acquire))
    }

    /// Chain position of slot `index`.
    pub fn release_lsn(&self, index: usize) -> Lsn {
        self.slots[index].release_lsn.load()
    }

    /// Physical LSN at which slot `index`'s bytes begin.
    pub fn start_lsn(&self, index: usize) -> Lsn {
        self.slots[index].start_lsn.load()
    }

    /// LSN immediately after slot `index`'s bytes.
    pub fn end_lsn(&self, index: usize) -> Lsn {
        self.slots[index].end_lsn.load()
    }

    /// Bytes reserved for slot `index`.
    pub fn reserved_len(&self, index: usize) -> u32 {
        self.slots[index].len.load(Ordering::Relaxed)
    }

    /// Whether slot `index` carries the close-file flag.
    pub fn close_flag(&self, index: usize) -> bool {
        self.slots[index].close_file.load(Ordering::Relaxed)
    }
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_starts_all_free() {
        let pool = SlotPool::new();
        for i in 0..SLOT_POOL {
            assert_eq!(pool.state(i), SlotState::Free);
        }
    }

    #[test]
    fn test_reserve_write_free_cycle() {
        let pool = SlotPool::new();

        let at = Lsn::new(1, 0);
        let idx = pool.try_reserve(at, at, 50, false).unwrap();
        assert_eq!(pool.state(idx), SlotState::Active);
        assert_eq!(pool.release_lsn(idx), at);
        assert_eq!(pool.start_lsn(idx), at);
        assert_eq!(pool.reserved_len(idx), 50);

        pool.set_written(idx, Lsn::new(1, 50));
        assert_eq!(pool.state(idx), SlotState::Written);
        assert_eq!(pool.end_lsn(idx), Lsn::new(1, 50));

        pool.free(idx);
        assert_eq!(pool.state(idx), SlotState::Free);
    }

    #[test]
    fn test_pool_exhaustion() {
        let pool = SlotPool::new();
        for i in 0..SLOT_POOL {
            let at = Lsn::new(1, i as u32 * 10);
            assert!(pool.try_reserve(at, at, 10, false).is_some());
        }
        let at = Lsn::new(1, 999);
        assert!(pool.try_reserve(at, at, 10, false).is_none());
    }

    #[test]
    fn test_scan_sees_only_written() {
        let pool = SlotPool::new();

        let l0 = Lsn::new(1, 0);
        let l1 = Lsn::new(1, 10);
        let l2 = Lsn::new(1, 20);
        let a = pool.try_reserve(l0, l0, 10, false).unwrap();
        let b = pool.try_reserve(l1, l1, 10, false).unwrap();
        let _active = pool.try_reserve(l2, l2, 10, false).unwrap();

        pool.set_written(a, Lsn::new(1, 10));
        pool.set_written(b, Lsn::new(1, 20));

        let mut written = Vec::new();
        pool.scan_written(&mut written);

        let mut indexes: Vec<usize> = written.iter().map(|w| w.index).collect();
        indexes.sort_unstable();
        assert_eq!(indexes, vec![a, b]);
    }

    #[test]
    fn test_spanning_slot_keeps_chain_and_start_apart() {
        let pool = SlotPool::new();

        // A slot that spans a segment switch: chained at the old segment's
        // end, bytes at the new segment's start.
        let idx = pool
            .try_reserve(Lsn::new(1, 4000), Lsn::new(2, 0), 10, true)
            .unwrap();
        assert_eq!(pool.release_lsn(idx), Lsn::new(1, 4000));
        assert_eq!(pool.start_lsn(idx), Lsn::new(2, 0));
        assert!(pool.close_flag(idx));

        pool.set_written(idx, Lsn::new(2, 10));
        pool.free(idx);

        // Reuse clears the flag.
        let at = Lsn::new(2, 10);
        let idx = pool.try_reserve(at, at, 10, false).unwrap();
        assert!(!pool.close_flag(idx));
    }
}
