//! Public surface: `ConcurrentPriorityQueue<K, V, N, A, C>` (spec.md §6.3).

use crate::alloc_strategy::{AllocStrategy, External, Pool, Scratch};
use crate::comparator::{Comparator, Less};
use crate::engine::SkipList;
use crate::error::CpqError;
use crate::height::{random_height, tower_height};
use crate::node::Node;
use rand::rngs::ThreadRng;
use std::cell::RefCell;
use std::ptr::NonNull;

thread_local! {
    static HEIGHT_RNG: RefCell<ThreadRng> = RefCell::new(rand::thread_rng());
}

/// A lock-free min-priority queue backed by a version-tagged concurrent
/// skip-list.
///
/// `N` is the expected number of live elements, used only to size the
/// skip-list's tower height (`H = ceil(log2(N) / 2)`, spec.md §4.3.1); it
/// is not a hard capacity. `A` selects how nodes are allocated and
/// reclaimed (see [`crate::alloc_strategy`]); `C` selects key order,
/// ascending by `Ord` by default.
pub struct ConcurrentPriorityQueue<K, V, const N: usize = 512, A: AllocStrategy<K, V> = Pool, C: Comparator<K> = Less<K>> {
    list: SkipList<K, V, C>,
    alloc: A,
}

impl<K, V, const N: usize, A: AllocStrategy<K, V>, C: Comparator<K>> ConcurrentPriorityQueue<K, V, N, A, C> {
    #[must_use]
    pub fn new() -> Self
    where
        A: Default,
        C: Default,
    {
        Self {
            list: SkipList::new(tower_height(N), C::default()),
            alloc: A::default(),
        }
    }

    /// Whether the queue currently holds no elements. Concurrent-safe: a
    /// `true` result is only a snapshot, since another thread may push
    /// immediately after.
    #[must_use]
    pub fn empty(&self) -> bool {
        self.list.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Removes every element currently in the queue. Concurrent-safe:
    /// implemented as a loop of ordinary `try_pop`s, so it interleaves
    /// correctly with other threads' `push`/`try_pop` calls, unlike
    /// [`Self::unsafe_reset`].
    pub fn clear(&self) {
        while let Some(node) = self.list.try_remove_min() {
            let guard = crossbeam_epoch::pin();
            unsafe {
                drop(node.as_ref().take_value());
                self.alloc.recycle(node, &guard);
            }
        }
    }

    /// Instantly empties the queue without popping or reclaiming any node.
    ///
    /// # Safety
    /// No concurrent `push`/`try_pop`/`empty`/`clear` call may be in
    /// flight, on this thread or any other (spec.md §9: CPQ's `unsafe_reset`
    /// is single-threaded-only, the same resolution chosen for the other
    /// two components). Every node the queue held is leaked unless the
    /// caller separately reclaims it — callers combine this with
    /// [`crate::alloc_strategy::Scratch::unsafe_reset`] (or an External
    /// strategy's own bookkeeping) rather than using it on [`Pool`], where
    /// it would leak.
    pub unsafe fn unsafe_reset(&self) {
        self.list.unsafe_reset();
    }
}

impl<K, V, const N: usize, A: AllocStrategy<K, V>, C: Comparator<K>> Drop for ConcurrentPriorityQueue<K, V, N, A, C> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V, const N: usize, C: Comparator<K>> ConcurrentPriorityQueue<K, V, N, Pool, C> {
    pub fn push(&self, key: K, value: V) {
        let height = HEIGHT_RNG.with(|rng| random_height(self.list.height(), &mut *rng.borrow_mut()));
        let node = self
            .alloc
            .allocate(height, key, value)
            .expect("Pool allocation is infallible (aborts via the global allocator instead)");
        self.list.insert(node);
    }

    #[must_use]
    pub fn try_pop(&self) -> Option<(K, V)> {
        let node = self.list.try_remove_min()?;
        Some(self.take_and_recycle(node))
    }

    fn take_and_recycle(&self, node: NonNull<Node<K, V>>) -> (K, V) {
        let guard = crossbeam_epoch::pin();
        let (key, value) = unsafe {
            let node_ref = node.as_ref();
            (node_ref.take_key(), node_ref.take_value())
        };
        unsafe { self.alloc.recycle(node, &guard) };
        (key, value)
    }
}

impl<K, V, const N: usize, C: Comparator<K>> ConcurrentPriorityQueue<K, V, N, Scratch, C> {
    pub fn with_scratch_capacity(capacity: usize) -> Self
    where
        C: Default,
    {
        Self {
            list: SkipList::new(tower_height(N), C::default()),
            alloc: Scratch::with_capacity(capacity),
        }
    }

    pub fn push(&self, key: K, value: V) -> Result<(), CpqError> {
        let height = HEIGHT_RNG.with(|rng| random_height(self.list.height(), &mut *rng.borrow_mut()));
        let node = self.alloc.allocate(height, key, value)?;
        self.list.insert(node);
        Ok(())
    }

    #[must_use]
    pub fn try_pop(&self) -> Option<(K, V)> {
        let node = self.list.try_remove_min()?;
        Some(self.take_and_recycle(node))
    }

    fn take_and_recycle(&self, node: NonNull<Node<K, V>>) -> (K, V) {
        let guard = crossbeam_epoch::pin();
        let (key, value) = unsafe {
            let node_ref = node.as_ref();
            (node_ref.take_key(), node_ref.take_value())
        };
        unsafe { self.alloc.recycle(node, &guard) };
        (key, value)
    }

    /// Frees the entire scratch block, reclaiming every byte ever
    /// allocated through it.
    ///
    /// # Safety
    /// Every node currently reachable from this queue was allocated from
    /// this same scratch block, so the caller must first ensure (e.g. via
    /// [`Self::clear`] or external synchronization) that the list is empty
    /// and no concurrent operation is in flight, or live nodes' storage is
    /// freed out from under them.
    pub unsafe fn unsafe_reset_scratch_pool(&self) {
        self.alloc.unsafe_reset();
    }
}

impl<K, V, const N: usize, C: Comparator<K>> ConcurrentPriorityQueue<K, V, N, External, C> {
    #[must_use]
    pub fn with_external_strategy() -> Self
    where
        C: Default,
    {
        Self {
            list: SkipList::new(tower_height(N), C::default()),
            alloc: External,
        }
    }

    /// Pushes a node the caller has already constructed and owns. The
    /// queue never allocates or frees nodes under this strategy; the
    /// caller is responsible for giving `node` a height no greater than
    /// `self.list.height()` (spec.md §4.4, External strategy).
    ///
    /// # Safety
    /// `node` must point to a live, uniquely-owned [`Node`] that nothing
    /// else will mutate or free while it may still be reachable from this
    /// queue.
    pub unsafe fn push_node(&self, node: NonNull<Node<K, V>>) {
        self.list.insert(node);
    }

    /// Pops the minimum node, handing ownership back to the caller. Unlike
    /// [`Pool`]/[`Scratch`], the value is not extracted here — the caller
    /// gets the whole node back to dispose of however it owns memory.
    #[must_use]
    pub unsafe fn pop_node(&self) -> Option<NonNull<Node<K, V>>> {
        self.list.try_remove_min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_push_pop_is_min_first() {
        let q: ConcurrentPriorityQueue<u32, &str, 16> = ConcurrentPriorityQueue::new();
        q.push(5, "five");
        q.push(1, "one");
        q.push(3, "three");
        assert_eq!(q.try_pop(), Some((1, "one")));
        assert_eq!(q.try_pop(), Some((3, "three")));
        assert_eq!(q.try_pop(), Some((5, "five")));
        assert_eq!(q.try_pop(), None);
        assert!(q.empty());
    }

    #[test]
    fn scratch_push_reports_exhaustion() {
        let q: ConcurrentPriorityQueue<u32, u32, 16, Scratch> = ConcurrentPriorityQueue::with_scratch_capacity(64);
        let mut pushed = 0;
        loop {
            match q.push(pushed, pushed) {
                Ok(()) => pushed += 1,
                Err(CpqError::ScratchExhausted { .. }) => break,
            }
            if pushed > 10_000 {
                panic!("scratch never reported exhaustion");
            }
        }
        unsafe { q.unsafe_reset_scratch_pool() };
        unsafe { q.unsafe_reset() };
        assert!(q.push(0, 0).is_ok());
    }

    #[test]
    fn clear_empties_and_recycles() {
        let q: ConcurrentPriorityQueue<u32, u32, 16> = ConcurrentPriorityQueue::new();
        for i in 0..10 {
            q.push(i, i);
        }
        q.clear();
        assert!(q.empty());
        assert_eq!(q.try_pop(), None);
    }
}
