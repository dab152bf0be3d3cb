//! Per-slot state for a producer buffer's ring.
//!
//! Consumer access to a given buffer is serialized by
//! [`crate::ProducerBuffer::try_lock`], so cell state does not need to
//! arbitrate between concurrent readers the way a literal per-cell
//! fetch-add protocol would. It still earns its keep for two things: the
//! `exception-safe` feature's pop-repair path (a handler panic mid-pop
//! marks the cell `Failed` instead of leaving it in an ambiguous state),
//! and `Queue::unsafe_reset`'s `Dummy` decommission marker.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum CellState {
    /// No item committed, or already consumed and reset.
    Empty = 0,
    /// A producer has committed an item; available for consumption.
    Valid = 1,
    /// The `exception-safe` repair pass found this slot abandoned after a
    /// handler panic; the item inside was dropped without delivery.
    Failed = 2,
    /// The owning buffer was decommissioned by `unsafe_reset`.
    Dummy = 3,
}

impl From<u8> for CellState {
    fn from(v: u8) -> Self {
        match v {
            0 => CellState::Empty,
            1 => CellState::Valid,
            2 => CellState::Failed,
            _ => CellState::Dummy,
        }
    }
}

/// An atomic box around a [`CellState`], one per ring slot.
#[derive(Debug)]
pub(crate) struct RingCell {
    state: AtomicU8,
}

impl RingCell {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(CellState::Empty as u8),
        }
    }

    pub(crate) fn load(&self) -> CellState {
        CellState::from(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: CellState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Default for RingCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks a cell `Failed` if dropped while unwinding, i.e. a pop handler
/// panicked after the item was read out of the slot but before the normal
/// `Empty` transition ran. Defuse with [`Self::defuse`] on the success path.
///
/// Only armed under the `exception-safe` feature; elsewhere a plain
/// `Empty` store after the read is enough, matching the non-panic-safe
/// batch consumption paths.
#[cfg(feature = "exception-safe")]
pub(crate) struct PopGuard<'a> {
    cell: &'a RingCell,
    defused: bool,
}

#[cfg(feature = "exception-safe")]
impl<'a> PopGuard<'a> {
    pub(crate) fn new(cell: &'a RingCell) -> Self {
        Self { cell, defused: false }
    }

    pub(crate) fn defuse(mut self) {
        self.defused = true;
        self.cell.store(CellState::Empty);
    }
}

#[cfg(feature = "exception-safe")]
impl Drop for PopGuard<'_> {
    fn drop(&mut self) {
        if !self.defused && std::thread::panicking() {
            self.cell.store(CellState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        assert_eq!(RingCell::new().load(), CellState::Empty);
    }

    #[test]
    fn store_roundtrips_every_state() {
        let cell = RingCell::new();
        for state in [CellState::Empty, CellState::Valid, CellState::Failed, CellState::Dummy] {
            cell.store(state);
            assert_eq!(cell.load(), state);
        }
    }
}
