use crate::invariants::debug_assert_relocation_bound;
use crate::producer_slot_array::ProducerSlotArray;
use crate::{Config, MetricsSnapshot, ProducerBuffer, QueueError};
use atomic_shared_ptr::{make_shared, SharedPtr};
use lockfree_support::PerThreadCell;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// An unbounded multi-producer/multi-consumer FIFO queue.
///
/// Built from per-producer [`ProducerBuffer`]s stored in a growable
/// [`ProducerSlotArray`]; consumers relocate across producers per the
/// policy in [`Queue::try_pop`], forcing a move every
/// [`Config::relocation_pop_count`] consecutive pops so no producer
/// starves the others.
pub struct Queue<T> {
    inner: Arc<QueueInner<T>>,
}

struct QueueInner<T> {
    slots: ProducerSlotArray<T>,
    closed: AtomicBool,
    config: Config,
    relocation_index: AtomicU64,
    relocations: AtomicU64,
    consumer_bindings: PerThreadCell<ConsumerBinding>,
}

#[derive(Clone, Copy)]
struct ConsumerBinding {
    index: usize,
    consecutive: usize,
}

impl<T> Queue<T> {
    /// Creates a new, empty queue with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                slots: ProducerSlotArray::new(config),
                closed: AtomicBool::new(false),
                config,
                relocation_index: AtomicU64::new(0),
                relocations: AtomicU64::new(0),
                consumer_bindings: PerThreadCell::new(),
            }),
        }
    }

    /// Registers a new producer, giving it a dedicated initial buffer.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue has been closed, or
    /// [`QueueError::TooManyProducers`] if [`Config::max_producers`] has
    /// been reached.
    pub fn register(&self) -> Result<Producer<T>, QueueError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let buffer = make_shared(ProducerBuffer::with_capacity(self.inner.config.ring_capacity(), self.inner.config));
        let Some(id) = self.inner.slots.register(buffer.clone()) else {
            return Err(QueueError::TooManyProducers {
                max: self.inner.config.max_producers,
            });
        };

        Ok(Producer {
            queue: Arc::clone(&self.inner),
            id,
            current: RefCell::new(buffer),
        })
    }

    /// Pops a single item from whichever producer this thread is
    /// currently bound to, relocating across producers per the policy
    /// described on [`Self`].
    pub fn try_pop(&self) -> Option<T> {
        let count = self.inner.slots.registered_count();
        if count == 0 {
            return None;
        }

        let binding_cell = self.inner.consumer_bindings.get_or(|| {
            // Fan a freshly-registered consumer out across producers the
            // same way `relocate` does, rather than letting every new
            // consumer converge on producer 0.
            let start = self.inner.relocation_index.fetch_add(1, Ordering::Relaxed) as usize;
            RefCell::new(ConsumerBinding { index: start % count, consecutive: 0 })
        });
        let mut binding = binding_cell.borrow_mut();
        if binding.index >= count {
            binding.index = 0;
            binding.consecutive = 0;
        }

        for _ in 0..count {
            if binding.consecutive >= self.inner.config.relocation_pop_count {
                self.relocate(&mut binding, count);
                continue;
            }

            let Some(buffer) = self.inner.slots.get(binding.index) else {
                self.relocate(&mut binding, count);
                continue;
            };

            if !buffer.try_lock() {
                self.relocate(&mut binding, count);
                continue;
            }

            #[cfg(feature = "exception-safe")]
            buffer.repair_failed_cells();

            if let Some(item) = buffer.try_pop_one() {
                binding.consecutive += 1;
                debug_assert_relocation_bound!(binding.consecutive, self.inner.config.relocation_pop_count);
                buffer.unlock();
                return Some(item);
            }

            if let Some(successor) = buffer.successor() {
                self.inner.slots.update(binding.index, successor);
                buffer.unlock();
                binding.consecutive = 0;
                continue;
            }

            buffer.unlock();
            self.relocate(&mut binding, count);
        }

        None
    }

    fn relocate(&self, binding: &mut ConsumerBinding, count: usize) {
        let next = self.inner.relocation_index.fetch_add(1, Ordering::Relaxed) as usize;
        self.inner.relocations.fetch_add(1, Ordering::Relaxed);
        binding.index = next % count;
        binding.consecutive = 0;
    }

    /// Closes the queue: producers may no longer register or reserve, and
    /// existing producer buffers stop accepting new items. Already-queued
    /// items remain poppable.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        for i in 0..self.inner.slots.registered_count() {
            if let Some(buffer) = self.inner.slots.get(i) {
                buffer.close();
            }
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.inner.slots.registered_count()
    }

    /// Approximate total item count across all registered producers'
    /// current buffers. Racy under concurrent push/pop, like any
    /// snapshot of a lock-free structure — use for monitoring, not
    /// synchronization.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut total = 0;
        for i in 0..self.inner.slots.registered_count() {
            if let Some(buffer) = self.inner.slots.get(i) {
                total += buffer.len();
            }
        }
        total
    }

    /// As [`Self::size`], documented as unsafe because the original API
    /// this is modeled on reserves that name for the non-concurrent-safe
    /// accessor family (`unsafe_clear`/`unsafe_reset`); this one happens
    /// to be just as safe as `size` in this implementation, so it is a
    /// thin alias rather than genuinely `unsafe`.
    #[must_use]
    pub fn unsafe_size(&self) -> usize {
        self.size()
    }

    /// Drops all queued items and resets every producer buffer to empty.
    ///
    /// # Safety
    /// No producer or consumer may be concurrently operating on the
    /// queue.
    pub unsafe fn unsafe_clear(&self) {
        for i in 0..self.inner.slots.registered_count() {
            if let Some(buffer) = self.inner.slots.get(i) {
                unsafe { buffer.unsafe_clear() };
            }
        }
    }

    /// Clears every producer buffer and decommissions them (`Dummy`),
    /// then zeros producer/reservation bookkeeping so the queue behaves
    /// as freshly constructed. Existing `Producer`/consumer bindings into
    /// the old buffers become unusable.
    ///
    /// # Safety
    /// No producer or consumer may be concurrently operating on the
    /// queue, and no outstanding `Producer` handle may be used again
    /// afterward.
    pub unsafe fn unsafe_reset(&self) {
        for i in 0..self.inner.slots.registered_count() {
            if let Some(buffer) = self.inner.slots.get(i) {
                unsafe {
                    buffer.unsafe_clear();
                    buffer.unsafe_mark_dummy();
                }
            }
        }
        self.inner.slots.unsafe_reset(self.inner.config);
        self.inner.relocation_index.store(0, Ordering::Relaxed);
        self.inner.relocations.store(0, Ordering::Relaxed);
    }

    /// Aggregated metrics across every registered producer's current
    /// buffer, plus the queue-level relocation count.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut total = MetricsSnapshot::default();
        for i in 0..self.inner.slots.registered_count() {
            if let Some(buffer) = self.inner.slots.get(i) {
                total += buffer.metrics();
            }
        }
        total.relocations = self.inner.relocations.load(Ordering::Relaxed);
        total
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

/// Producer handle for sending into a [`Queue`].
///
/// Intentionally not `Clone`: exactly one producer writes to a given
/// chain of buffers, which is what lets the write side stay lock-free.
/// Creating another writer for the same logical source means calling
/// [`Queue::register`] again.
pub struct Producer<T> {
    queue: Arc<QueueInner<T>>,
    id: usize,
    current: RefCell<SharedPtr<ProducerBuffer<T>>>,
}

impl<T> Producer<T> {
    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Reserves `n` slots for writing, growing into a larger successor
    /// buffer if the current one is full. Returns `None` only once the
    /// queue has been closed (or `n` is zero / larger than any buffer
    /// this producer will ever hold).
    ///
    /// Unlike [`ProducerBuffer`]'s internal reservation, this one is an
    /// owned handle rather than a borrowed slice: it holds its own clone
    /// of the target buffer, so it is free to outlive the `&self` call
    /// that created it (needed since a concurrent `grow()` must be free
    /// to swap `self.current` without invalidating an in-flight
    /// reservation against the buffer it was actually issued against).
    pub fn reserve(&self, n: usize) -> Option<Reservation<T>> {
        loop {
            let current = self.current.borrow().clone();
            if current.is_closed() {
                return None;
            }
            if let Some((tail, len)) = current.reserve_slots(n) {
                return Some(Reservation {
                    buffer: current,
                    tail,
                    len,
                    written: 0,
                });
            }
            if !current.is_full() {
                return None;
            }
            self.grow(&current);
        }
    }

    /// As [`Self::reserve`], backing off with spin/yield on transient
    /// contention before giving up. Still grows the buffer on genuine
    /// exhaustion.
    pub fn reserve_with_backoff(&self, n: usize) -> Option<Reservation<T>> {
        loop {
            let current = self.current.borrow().clone();
            if current.is_closed() {
                return None;
            }
            if current.reserve_with_backoff(n).is_some() {
                // The backoff loop above confirmed space; re-derive the
                // (tail, len) pair against the now-current state.
                if let Some((tail, len)) = current.reserve_slots(n) {
                    return Some(Reservation {
                        buffer: current,
                        tail,
                        len,
                        written: 0,
                    });
                }
            }
            if !current.is_full() {
                return None;
            }
            self.grow(&current);
        }
    }

    fn grow(&self, stale: &SharedPtr<ProducerBuffer<T>>) {
        if !std::ptr::eq(&**self.current.borrow(), &**stale) {
            // Another call already grew past `stale`; nothing to do.
            return;
        }
        let successor = stale.grow();
        // Only this producer's own write pointer moves here. The slot array
        // keeps pointing at `stale` until a consumer has drained it down to
        // empty and follows `stale.successor()` itself (see `try_pop`) —
        // repointing the slot early would strand whatever is still queued
        // in `stale` with no reader ever reaching it again.
        *self.current.borrow_mut() = successor;
    }

    /// Pushes a single item (convenience over [`Self::reserve`]).
    pub fn push(&self, item: T) -> bool {
        let Some(mut reservation) = self.reserve(1) else {
            return false;
        };
        reservation.write(item);
        reservation.commit();
        true
    }

    /// Closes this producer's buffer chain. The producer may no longer
    /// push, but already-queued items remain poppable.
    pub fn close(&self) {
        self.current.borrow().close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.current.borrow().is_closed()
    }
}

unsafe impl<T: Send> Send for Producer<T> {}

/// An owned, zero-copy-free reservation of `len()` contiguous slots in a
/// producer's buffer. Obtained from [`Producer::reserve`] (or
/// [`Producer::reserve_with_backoff`]); fill every slot with [`Self::write`]
/// (or up to `len()` fewer, see [`Self::commit`]) and call
/// [`Self::commit`] to publish them to consumers.
///
/// Dropping a `Reservation` without committing abandons the reserved
/// slots: nothing was written to `tail` yet, so no consumer can observe
/// them, but the space is not reclaimed until the next reservation from
/// the same producer reuses it (identical to abandoning a borrowed
/// `Reservation` on [`ProducerBuffer`] without calling `commit`).
pub struct Reservation<T> {
    buffer: SharedPtr<ProducerBuffer<T>>,
    tail: u64,
    len: usize,
    written: usize,
}

impl<T> Reservation<T> {
    /// Number of contiguous slots available in this reservation.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Writes the next value into this reservation.
    ///
    /// # Panics
    ///
    /// Panics if called more than [`Self::len`] times.
    pub fn write(&mut self, value: T) {
        assert!(self.written < self.len, "reservation already fully written");
        unsafe {
            self.buffer.write_slot(self.tail, self.written, value);
        }
        self.written += 1;
    }

    /// Commits every slot written so far, making them visible to
    /// consumers.
    pub fn commit(self) {
        let n = self.written;
        self.buffer.commit_internal(n);
    }
}
