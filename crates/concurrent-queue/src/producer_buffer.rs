use crate::cell::{CellState, RingCell};
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_capacity_grew, debug_assert_head_not_past_tail,
    debug_assert_initialized_read, debug_assert_monotonic, debug_assert_no_wrap,
};
use crate::reservation::Reservation;
use crate::{Config, Metrics, MetricsSnapshot};
use atomic_shared_ptr::{make_shared, AtomicSharedPtr, SharedPtr};
use lockfree_support::Backoff;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Each producer buffer is still single-producer on the write side (exactly
// one `Producer<T>` ever calls `reserve`/`commit_internal` against a given
// buffer, as in the original design). The read side is no longer guaranteed
// single-consumer: a `Queue<T>` may relocate any number of consumer threads
// across buffers. Mutual exclusion on the read side is enforced a level up,
// by `Queue`'s per-buffer `locked` flag — at most one consumer holds a
// buffer at a time — so `head`'s Relaxed-load-then-Release-store protocol
// below remains sound despite there being more than one possible reader.
//
// **Producer (write path):** unchanged from the original: relaxed tail
// load, unsynchronized cached-head read, acquire-load head on cache miss,
// unordered slot writes, release-store on tail to publish.
//
// **Consumer (read path, while holding the buffer lock):** relaxed head
// load, unsynchronized cached-tail read, acquire-load tail on cache miss,
// unordered slot reads, release-store on head to publish consumption.
// =============================================================================

/// A growable single-producer buffer with lock-free operations, the unit a
/// [`crate::ProducerSlotArray`] entry points at.
///
/// Optimized with 128-byte alignment to prevent false sharing, cached
/// sequence numbers to minimize cross-core traffic, and batch operations to
/// amortize atomic overhead.
#[repr(C)]
pub struct ProducerBuffer<T> {
    // === PRODUCER HOT === (128-byte aligned)
    tail: CacheAligned<AtomicU64>,
    cached_head: CacheAligned<UnsafeCell<u64>>,

    // === CONSUMER HOT === (128-byte aligned)
    head: CacheAligned<AtomicU64>,
    cached_tail: CacheAligned<UnsafeCell<u64>>,

    // === COLD STATE ===
    closed: AtomicBool,
    /// Held by at most one consumer at a time; see the module doc comment.
    locked: AtomicBool,
    metrics: Metrics,
    config: Config,

    /// The next, larger buffer this producer switched to after filling this
    /// one. Once a consumer drains this buffer to empty and observes a
    /// successor, it permanently relocates there (see `Queue`'s relocation
    /// policy) and this buffer becomes unreachable once dropped.
    successor: AtomicSharedPtr<ProducerBuffer<T>>,

    cell_states: Box<[RingCell]>,
    buffer: UnsafeCell<Box<[MaybeUninit<T>]>>,
}

unsafe impl<T: Send> Send for ProducerBuffer<T> {}
unsafe impl<T: Send> Sync for ProducerBuffer<T> {}

impl<T> ProducerBuffer<T> {
    /// Creates a new buffer with `capacity` slots (must be a power of two).
    pub(crate) fn with_capacity(capacity: usize, config: Config) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, MaybeUninit::uninit);

        Self {
            tail: CacheAligned::new(AtomicU64::new(0)),
            cached_head: CacheAligned::new(UnsafeCell::new(0)),
            head: CacheAligned::new(AtomicU64::new(0)),
            cached_tail: CacheAligned::new(UnsafeCell::new(0)),
            closed: AtomicBool::new(false),
            locked: AtomicBool::new(false),
            metrics: Metrics::new(),
            config,
            successor: AtomicSharedPtr::null(),
            cell_states: (0..capacity).map(|_| RingCell::new()).collect(),
            buffer: UnsafeCell::new(buffer.into_boxed_slice()),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.cell_states.len()
    }

    #[inline]
    fn mask(&self) -> usize {
        self.capacity() - 1
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    // ---------------------------------------------------------------------
    // CONSUMER-SIDE MUTUAL EXCLUSION (relocation policy support)
    // ---------------------------------------------------------------------

    /// Attempts to take exclusive consumer access to this buffer.
    pub(crate) fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    // ---------------------------------------------------------------------
    // GROWTH
    // ---------------------------------------------------------------------

    /// Allocates a larger successor buffer and links it, for a producer
    /// that just observed `reserve` fail because this buffer is full.
    /// Returns the successor so the producer can switch its binding to it.
    ///
    /// The caller must hold exclusive producer access (true by construction:
    /// only the producer bound to this buffer calls this).
    pub(crate) fn grow(&self) -> SharedPtr<ProducerBuffer<T>> {
        let new_capacity = self.config.next_buffer_capacity(self.capacity());
        debug_assert_capacity_grew!(self.capacity(), new_capacity);
        let successor = make_shared(ProducerBuffer::with_capacity(new_capacity, self.config));
        self.successor.store(Some(successor.clone()));
        successor
    }

    /// Returns the successor buffer, if this producer has already grown
    /// past this one.
    pub(crate) fn successor(&self) -> Option<SharedPtr<ProducerBuffer<T>>> {
        self.successor.load()
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Reserve n slots for zero-copy writing. Returns `None` if full/closed.
    ///
    /// The returned [`Reservation`] may contain fewer than `n` items if the
    /// reservation wraps around the buffer boundary.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn reserve(&self, n: usize) -> Option<Reservation<'_, T>> {
        if n == 0 || n > self.capacity() || self.is_closed() {
            return None;
        }

        let tail = self.tail.load(Ordering::Relaxed);

        // SAFETY: cached_head has exactly one writer, the producer bound to
        // this buffer, on this same code path.
        let cached_head = unsafe { *self.cached_head.get() };
        let space = self.capacity().saturating_sub(tail.wrapping_sub(cached_head) as usize);

        if space >= n {
            return Some(self.make_reservation(tail, n));
        }

        let head = self.head.load(Ordering::Acquire);
        unsafe {
            *self.cached_head.get() = head;
        }

        let space = self.capacity().saturating_sub(tail.wrapping_sub(head) as usize);
        if space < n {
            return None;
        }

        Some(self.make_reservation(tail, n))
    }

    /// Reserve with adaptive backoff. Spins, yields, then gives up.
    pub(crate) fn reserve_with_backoff(&self, n: usize) -> Option<Reservation<'_, T>> {
        let mut backoff = Backoff::new();
        while !backoff.is_completed() {
            if let Some(r) = self.reserve(n) {
                return Some(r);
            }
            if self.is_closed() {
                return None;
            }
            if self.config.enable_metrics {
                self.metrics.add_reserve_spin();
            }
            backoff.snooze();
        }
        None
    }

    fn make_reservation(&self, tail: u64, n: usize) -> Reservation<'_, T> {
        let mask = self.mask();
        let idx = (tail as usize) & mask;
        let contiguous = n.min(self.capacity() - idx);

        // SAFETY: [idx, idx+contiguous) lies beyond the current tail, so no
        // consumer can be reading these slots; only this buffer's one
        // producer writes here.
        let slice = unsafe {
            let buffer = &mut *self.buffer.get();
            &mut buffer[idx..idx + contiguous]
        };

        Reservation::new(slice, self as *const Self)
    }

    /// As [`Self::reserve`], but returns `(tail, contiguous_len)` instead
    /// of a borrowed slice, so the reservation can be carried across an
    /// owned handle (see [`crate::queue::Reservation`]) instead of being
    /// tied to `&self`'s lifetime.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn reserve_slots(&self, n: usize) -> Option<(u64, usize)> {
        if n == 0 || n > self.capacity() || self.is_closed() {
            return None;
        }
        let tail = self.tail.load(Ordering::Relaxed);
        let cached_head = unsafe { *self.cached_head.get() };
        let space = self.capacity().saturating_sub(tail.wrapping_sub(cached_head) as usize);
        if space >= n {
            let idx = (tail as usize) & self.mask();
            return Some((tail, n.min(self.capacity() - idx)));
        }

        let head = self.head.load(Ordering::Acquire);
        unsafe {
            *self.cached_head.get() = head;
        }
        let space = self.capacity().saturating_sub(tail.wrapping_sub(head) as usize);
        if space < n {
            return None;
        }
        let idx = (tail as usize) & self.mask();
        Some((tail, n.min(self.capacity() - idx)))
    }

    /// Writes `value` into the `offset`-th slot of a reservation that
    /// started at `tail` (as returned by [`Self::reserve_slots`]).
    ///
    /// # Safety
    /// `tail + offset` must lie within a still-uncommitted reservation
    /// this buffer's single producer currently owns.
    pub(crate) unsafe fn write_slot(&self, tail: u64, offset: usize, value: T) {
        let idx = ((tail as usize).wrapping_add(offset)) & self.mask();
        unsafe {
            (*self.buffer.get())[idx].write(value);
        }
    }

    pub(crate) fn commit_internal(&self, n: usize) {
        let tail = self.tail.load(Ordering::Relaxed);
        let new_tail = tail.wrapping_add(n as u64);
        let head = self.head.load(Ordering::Relaxed);

        debug_assert_bounded_count!(new_tail.wrapping_sub(head) as usize, self.capacity());
        debug_assert_monotonic!("tail", tail, new_tail);
        debug_assert_no_wrap!("tail", tail, new_tail);

        let mask = self.mask();
        for i in 0..n {
            let idx = ((tail as usize).wrapping_add(i)) & mask;
            self.cell_states[idx].store(CellState::Valid);
        }

        self.tail.store(new_tail, Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_sent(n as u64);
            self.metrics.add_batches_sent(1);
        }
    }

    // ---------------------------------------------------------------------
    // CONSUMER API (caller must hold this buffer's lock; see `try_lock`)
    // ---------------------------------------------------------------------

    /// Pops a single item. The caller must hold this buffer's consumer
    /// lock (see [`Self::try_lock`]), so no other reader can race this
    /// slot; the per-cell state exists for the `exception-safe` repair
    /// path and for `unsafe_reset`'s `Dummy` marker, not for arbitration.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn try_pop_one(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let mut tail = unsafe { *self.cached_tail.get() };
        if head == tail {
            tail = self.tail.load(Ordering::Acquire);
            unsafe {
                *self.cached_tail.get() = tail;
            }
            if head == tail {
                return None;
            }
        }

        let idx = (head as usize) & self.mask();
        let cell = &self.cell_states[idx];
        debug_assert!(cell.load() == CellState::Valid, "popping an unwritten slot");
        debug_assert_initialized_read!(head, head, tail);

        #[cfg(feature = "exception-safe")]
        let guard = crate::cell::PopGuard::new(cell);

        let item = unsafe {
            let buffer = &*self.buffer.get();
            buffer[idx].assume_init_read()
        };

        let new_head = head.wrapping_add(1);
        debug_assert_head_not_past_tail!(new_head, tail);
        debug_assert_monotonic!("head", head, new_head);
        self.head.store(new_head, Ordering::Release);

        #[cfg(feature = "exception-safe")]
        guard.defuse();
        #[cfg(not(feature = "exception-safe"))]
        cell.store(CellState::Empty);

        if self.config.enable_metrics {
            self.metrics.add_messages_received(1);
            self.metrics.add_batches_received(1);
        }
        Some(item)
    }

    /// Repairs slots left `Failed` after [`PopGuard`](crate::cell::PopGuard)
    /// caught a panic unwinding out of [`Self::try_pop_one`] between the
    /// item's extraction and `head`'s advance (the item itself was already
    /// dropped by the unwind — Rust moves never throw, so this is a
    /// narrower window than the original's "throw during move-out", but it
    /// is the only point where a panic could leave the buffer in a
    /// half-updated state). `head` stalls on a `Failed` cell rather than
    /// re-reading it, so repair walks forward from `head` clearing
    /// contiguous `Failed` cells and advancing `head` past them.
    ///
    /// Caller must hold this buffer's consumer lock.
    #[cfg(feature = "exception-safe")]
    pub(crate) fn repair_failed_cells(&self) -> usize {
        let mut head = self.head.load(Ordering::Relaxed);
        let mask = self.mask();
        let mut repaired = 0;
        loop {
            let idx = (head as usize) & mask;
            if self.cell_states[idx].load() != CellState::Failed {
                break;
            }
            self.cell_states[idx].store(CellState::Empty);
            head = head.wrapping_add(1);
            repaired += 1;
        }
        if repaired > 0 {
            self.head.store(head, Ordering::Release);
        }
        repaired
    }

    /// Get readable slice for the `Copy`/owned batch paths. Returns `None`
    /// if empty.
    #[allow(clippy::cast_possible_truncation)]
    fn readable(&self) -> Option<&[T]> {
        let head = self.head.load(Ordering::Relaxed);
        let mut cached_tail = unsafe { *self.cached_tail.get() };
        let mut avail = cached_tail.wrapping_sub(head) as usize;

        if avail == 0 {
            cached_tail = self.tail.load(Ordering::Acquire);
            unsafe {
                *self.cached_tail.get() = cached_tail;
            }
            avail = cached_tail.wrapping_sub(head) as usize;
            if avail == 0 {
                return None;
            }
        }

        let mask = self.mask();
        let idx = (head as usize) & mask;
        let contiguous = avail.min(self.capacity() - idx);

        unsafe {
            let buffer = &*self.buffer.get();
            Some(std::slice::from_raw_parts(buffer[idx..].as_ptr().cast::<T>(), contiguous))
        }
    }

    fn advance(&self, n: usize) {
        let head = self.head.load(Ordering::Relaxed);
        let new_head = head.wrapping_add(n as u64);
        let tail = self.tail.load(Ordering::Relaxed);

        debug_assert_head_not_past_tail!(new_head, tail);
        debug_assert_monotonic!("head", head, new_head);

        let mask = self.mask();
        for i in 0..n {
            let idx = ((head as usize).wrapping_add(i)) & mask;
            self.cell_states[idx].store(CellState::Empty);
        }

        self.head.store(new_head, Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_received(n as u64);
            self.metrics.add_batches_received(1);
        }
    }

    /// Process all available items with a single head update. Prefer this
    /// for `Copy` types or when only inspecting items.
    pub(crate) fn consume_batch<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(&T),
    {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;
        while pos != tail {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(&item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        self.advance(count);
        count
    }

    /// As [`Self::consume_batch`], transferring ownership to the handler.
    pub(crate) fn consume_batch_owned<F>(&self, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;
        while pos != tail {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        self.advance(count);
        count
    }

    /// Consume up to `max_items` with a single head update.
    pub(crate) fn consume_up_to<F>(&self, max_items: usize, mut handler: F) -> usize
    where
        F: FnMut(&T),
    {
        if max_items == 0 {
            return 0;
        }
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let to_consume = avail.min(max_items);
        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;
        while count < to_consume {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(&item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        self.advance(count);
        count
    }

    /// As [`Self::consume_up_to`], transferring ownership to the handler.
    pub(crate) fn consume_up_to_owned<F>(&self, max_items: usize, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        if max_items == 0 {
            return 0;
        }
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let to_consume = avail.min(max_items);
        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;
        while count < to_consume {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        self.advance(count);
        count
    }

    // ---------------------------------------------------------------------
    // CONVENIENCE WRAPPERS
    // ---------------------------------------------------------------------

    pub(crate) fn push(&self, item: T) -> bool {
        self.reserve(1).is_some_and(|mut r| {
            r.as_mut_slice()[0] = MaybeUninit::new(item);
            r.commit();
            true
        })
    }

    pub(crate) fn send(&self, items: &[T]) -> usize
    where
        T: Copy,
    {
        self.reserve(items.len()).map_or(0, |mut reservation| {
            let slice = reservation.as_mut_slice();
            let n = slice.len();
            for i in 0..n {
                slice[i].write(items[i]);
            }
            reservation.commit();
            n
        })
    }

    pub(crate) fn recv(&self, out: &mut [T]) -> usize
    where
        T: Copy,
    {
        self.readable().map_or(0, |slice| {
            let n = slice.len().min(out.len());
            out[..n].copy_from_slice(&slice[..n]);
            self.advance(n);
            n
        })
    }

    pub(crate) fn metrics(&self) -> MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }

    // ---------------------------------------------------------------------
    // CLEAR & RESET (single-threaded-only; see `Queue::unsafe_clear`/`unsafe_reset`)
    // ---------------------------------------------------------------------

    /// Drops any still-committed items, resets `head`/`tail` to coincide,
    /// and walks the successor chain doing the same.
    ///
    /// # Safety
    /// No producer or consumer may be concurrently operating on this
    /// buffer or any of its successors.
    pub(crate) unsafe fn unsafe_clear(&self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.wrapping_sub(head) as usize;
        let mask = self.mask();

        for i in 0..count {
            let idx = ((head as usize).wrapping_add(i)) & mask;
            unsafe {
                let buffer = &mut *self.buffer.get();
                ptr::drop_in_place(buffer[idx].as_mut_ptr());
            }
            self.cell_states[idx].store(CellState::Empty);
        }

        self.head.store(tail, Ordering::Relaxed);
        unsafe {
            *self.cached_tail.get() = tail;
            *self.cached_head.get() = tail;
        }

        if let Some(successor) = self.successor() {
            unsafe { successor.unsafe_clear() };
        }
    }

    /// Marks every cell (along the successor chain) `Dummy`, decommissioning
    /// the buffer permanently.
    ///
    /// # Safety
    /// Same contract as [`Self::unsafe_clear`].
    pub(crate) unsafe fn unsafe_mark_dummy(&self) {
        for cell in self.cell_states.iter() {
            cell.store(CellState::Dummy);
        }
        if let Some(successor) = self.successor() {
            unsafe { successor.unsafe_mark_dummy() };
        }
    }
}

impl<T> Drop for ProducerBuffer<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.wrapping_sub(head) as usize;

        if count > 0 {
            let mask = self.mask();
            let buffer = self.buffer.get_mut();
            for i in 0..count {
                let idx = ((head as usize).wrapping_add(i)) & mask;
                unsafe {
                    ptr::drop_in_place(buffer[idx].as_mut_ptr());
                }
            }
        }
    }
}

#[repr(align(128))]
struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::new(4, 1, 1, false) // 16 slots
    }

    #[test]
    fn reserve_commit_then_pop_one() {
        let buf = ProducerBuffer::<u64>::with_capacity(cfg().ring_capacity(), cfg());
        assert!(buf.push(100));
        assert!(buf.push(200));
        assert_eq!(buf.try_pop_one(), Some(100));
        assert_eq!(buf.try_pop_one(), Some(200));
        assert_eq!(buf.try_pop_one(), None);
    }

    #[test]
    fn batch_consumption_drops_items() {
        let buf = ProducerBuffer::<u64>::with_capacity(cfg().ring_capacity(), cfg());
        for i in 0..10 {
            assert!(buf.push(i * 10));
        }
        let mut sum = 0u64;
        let consumed = buf.consume_batch(|x| sum += x);
        assert_eq!(consumed, 10);
        assert_eq!(sum, 450);
        assert!(buf.is_empty());
    }

    #[test]
    fn buffer_lock_excludes_second_consumer() {
        let buf = ProducerBuffer::<u64>::with_capacity(cfg().ring_capacity(), cfg());
        assert!(buf.try_lock());
        assert!(!buf.try_lock());
        buf.unlock();
        assert!(buf.try_lock());
    }

    #[test]
    fn grow_links_a_larger_successor() {
        let config = cfg();
        let buf = ProducerBuffer::<u64>::with_capacity(config.ring_capacity(), config);
        assert!(buf.successor().is_none());
        let successor = buf.grow();
        assert!(successor.capacity() > buf.capacity());
        assert!(buf.successor().is_some());
    }
}
