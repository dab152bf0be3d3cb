//! The version-tagged skip-list itself: find, insert, and flag-then-delink
//! removal of the minimum (spec.md §4.3.3/§4.3.4/§4.3.7).

use crate::comparator::Comparator;
use crate::invariants::{debug_assert_height_within_list, debug_assert_len_non_negative};
use crate::link::{next_link_version, Link};
use crate::node::Node;
use lockfree_support::Backoff;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Largest tower height this engine supports. `tower_height` never produces
/// anything close to this for any `usize`-representable expected size; it
/// exists only to size the on-stack find-path arrays.
const MAX_TOWER: usize = 32;

/// A lock-free, multi-producer/multi-consumer sorted skip-list keyed by
/// `K`, exposing only what a priority queue needs: insert and
/// take-the-minimum. `head` is the sentinel; an empty list is every one of
/// `head`'s tower slots looping back to `head` itself.
pub(crate) struct SkipList<K, V, C> {
    head: Box<Node<K, V>>,
    height: u8,
    comparator: C,
    len: AtomicUsize,
}

/// Per-layer predecessor/successor pointers produced by a list walk,
/// i.e. the original's `nextSet`/`prevSet` (spec.md §4.3.3 step 1).
struct FindResult<K, V> {
    prev: [*const Node<K, V>; MAX_TOWER],
    next: [*const Node<K, V>; MAX_TOWER],
}

impl<K, V, C: Comparator<K>> SkipList<K, V, C> {
    pub(crate) fn new(height: u8, comparator: C) -> Self {
        assert!(height as usize <= MAX_TOWER, "tower height exceeds engine's static bound");
        Self {
            head: Node::head(height),
            height,
            comparator,
            len: AtomicUsize::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn height(&self) -> u8 {
        self.height
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn head_ptr(&self) -> *const Node<K, V> {
        &*self.head
    }

    #[inline]
    fn at_head(&self, ptr: *const Node<K, V>) -> bool {
        std::ptr::eq(ptr, self.head_ptr())
    }

    /// Walks every layer from the top down, stopping at the last node whose
    /// key is still less than `key` (or the head, at that layer's start).
    /// `prev[i]`/`next[i]` bracket where `key` belongs at layer `i`.
    fn find(&self, key: &K) -> FindResult<K, V> {
        let mut prev = [self.head_ptr(); MAX_TOWER];
        let mut next = [self.head_ptr(); MAX_TOWER];

        let mut cursor = self.head_ptr();
        for layer in (0..self.height).rev() {
            loop {
                let cursor_ref = unsafe { &*cursor };
                let candidate = cursor_ref.link(layer).load(Ordering::Acquire).ptr::<K, V>();
                if self.at_head(candidate) {
                    next[layer as usize] = candidate;
                    break;
                }
                let candidate_ref = unsafe { &*candidate };
                if self.comparator.is_less(candidate_ref.key(), key) {
                    cursor = candidate;
                } else {
                    next[layer as usize] = candidate;
                    break;
                }
            }
            prev[layer as usize] = cursor;
        }

        FindResult { prev, next }
    }

    /// Splices `node` into the list in sorted order. `node`'s own tower
    /// slots must already be zero-versioned/null; this stages them to the
    /// discovered successors before publishing layer 0 (spec.md §4.3.3).
    ///
    /// Layer 0 is mandatory: the insert retries its find-and-CAS until that
    /// layer links successfully. Upper layers are best-effort — a failed
    /// upper-layer CAS just leaves that node reachable by one fewer shortcut,
    /// never by incorrect or missing layer-0 data.
    pub(crate) fn insert(&self, node: NonNull<Node<K, V>>) {
        let node_ref = unsafe { node.as_ref() };
        let key = node_ref.key();
        let node_height = node_ref.height();
        let node_ptr: *const Node<K, V> = node.as_ptr();
        debug_assert_height_within_list!(node_height, self.height);

        let mut backoff = Backoff::new();
        loop {
            let found = self.find(key);

            for layer in 0..node_height {
                node_ref.stage_link(layer, found.next[layer as usize]);
            }

            let base_prev = unsafe { &*found.prev[0] };
            let base_current = base_prev.link(0).load(Ordering::Acquire);
            if !base_current.is(found.next[0]) {
                backoff.snooze();
                continue;
            }
            let base_desired = Link::new(node_ptr, next_link_version(base_current));
            if base_prev
                .link(0)
                .compare_exchange(base_current, base_desired, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                backoff.snooze();
                continue;
            }

            self.len.fetch_add(1, Ordering::AcqRel);
            self.counteract_version_lag();

            for layer in 1..node_height {
                let prev_node = unsafe { &*found.prev[layer as usize] };
                let current = prev_node.link(layer).load(Ordering::Acquire);
                if !current.is(found.next[layer as usize]) {
                    // Another insert or the version-lag drag moved this
                    // layer on; leave this node reachable via lower layers
                    // only rather than re-deriving a fresh path for it.
                    continue;
                }
                let desired = Link::new(node_ptr, next_link_version(current));
                let _ = prev_node.link(layer).compare_exchange(current, desired, Ordering::AcqRel, Ordering::Acquire);
            }

            return;
        }
    }

    /// Flags and removes the minimum node, returning it for the caller to
    /// take its value from and recycle (spec.md §4.3.4). Returns `None` if
    /// the list is empty.
    ///
    /// Flagging is a version-only CAS on the front node's own layer-0 link
    /// (pointer unchanged): the thread that wins it owns this node's
    /// removal, exactly as a competing thread observing the bumped version
    /// recognizes it lost the race and moves on to a new front.
    pub(crate) fn try_remove_min(&self) -> Option<NonNull<Node<K, V>>> {
        let mut backoff = Backoff::new();
        loop {
            let head_link0 = self.head.link(0).load(Ordering::Acquire);
            let front = head_link0.ptr::<K, V>();
            if self.at_head(front) {
                return None;
            }
            let front_ref = unsafe { &*front };
            let front_link0 = front_ref.link(0).load(Ordering::Acquire);

            let flagged = Link::new(front_link0.ptr::<K, V>(), next_link_version(front_link0));
            if front_ref
                .link(0)
                .compare_exchange(front_link0, flagged, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Lost the race to flag this front; retry against whatever
                // is front now (the winner will finish delinking it).
                backoff.snooze();
                continue;
            }

            self.delink_upper_layers(front, front_ref.height());
            self.delink_base(front, head_link0, flagged);
            self.counteract_version_lag();

            let len_after = self.len.fetch_sub(1, Ordering::AcqRel) - 1;
            debug_assert_len_non_negative!(len_after);
            return NonNull::new(front as *mut Node<K, V>);
        }
    }

    /// Best-effort removal of `front` from every layer above 0. A failed
    /// CAS here means another insert or delete already moved that layer
    /// past `front`; the base-layer delink is what matters for correctness.
    fn delink_upper_layers(&self, front: *const Node<K, V>, front_height: u8) {
        for layer in (1..front_height).rev() {
            let mut backoff = Backoff::new();
            loop {
                let head_link = self.head.link(layer).load(Ordering::Acquire);
                if !head_link.is(front) {
                    break;
                }
                let front_next = unsafe { &*front }.link(layer).load(Ordering::Acquire);
                let desired = Link::new(front_next.ptr::<K, V>(), next_link_version(head_link));
                if self
                    .head
                    .link(layer)
                    .compare_exchange(head_link, desired, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    break;
                }
                backoff.snooze();
                if backoff.is_completed() {
                    break;
                }
            }
        }
    }

    /// Final, mandatory delink of `front` from layer 0, completing its
    /// removal from the list.
    fn delink_base(&self, front: *const Node<K, V>, observed_head_link0: Link, flagged_front_link0: Link) {
        let mut head_link0 = observed_head_link0;
        let mut backoff = Backoff::new();
        loop {
            if !head_link0.is(front) {
                return;
            }
            let desired = Link::new(flagged_front_link0.ptr::<K, V>(), next_link_version(head_link0));
            match self.head.link(0).compare_exchange(head_link0, desired, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(actual) => {
                    head_link0 = actual;
                    backoff.snooze();
                }
            }
        }
    }

    /// Drags any head upper-layer link whose version has fallen out of
    /// range of the base layer's version back in range, by re-publishing
    /// it with the same target but a version one behind base (spec.md
    /// §4.3.7). Upper layers change far less often than layer 0, so left
    /// unchecked their version eventually falls more than half the version
    /// space behind and a legitimate CAS on them would be rejected as
    /// stale. Called opportunistically from the hot paths rather than on a
    /// separate timer.
    fn counteract_version_lag(&self) {
        let base = self.head.link(0).load(Ordering::Acquire);
        for layer in 1..self.height {
            let upper = self.head.link(layer).load(Ordering::Acquire);
            if crate::link::version_in_range(upper, base) {
                continue;
            }
            // version 0 means "never stored" and is always in range, so
            // dragging down to 0 when base is 0 or 1 is a valid (indeed the
            // safest possible) choice, not a special case to avoid.
            let lagged_version = if base.version() <= 1 { 0 } else { base.version() - 1 };
            let desired = Link::new(upper.ptr::<K, V>(), lagged_version);
            // Best-effort: if this loses a race to a concurrent mutator of
            // the same layer, that mutator's own CAS already refreshed the
            // version, which is just as good.
            let _ = self.head.link(layer).compare_exchange(upper, desired, Ordering::AcqRel, Ordering::Acquire);
        }
    }

    /// Single-threaded-only reset: loops every head tower slot back to the
    /// head itself, dropping every node from the list without reclaiming
    /// them (the caller's [`crate::alloc_strategy::AllocStrategy`] owns
    /// that, see [`crate::ConcurrentPriorityQueue::unsafe_reset`]).
    ///
    /// # Safety
    /// No concurrent `insert`/`try_remove_min`/`find` call may be in
    /// flight.
    pub(crate) unsafe fn unsafe_reset(&self) {
        let self_ptr = self.head_ptr();
        for layer in 0..self.height {
            self.head.link(layer).store(Link::new(self_ptr, 0), Ordering::Relaxed);
        }
        self.len.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc_strategy::{AllocStrategy, Pool};
    use crate::comparator::Less;
    use crate::height::tower_height;

    fn new_list() -> SkipList<u32, &'static str, Less<u32>> {
        SkipList::new(tower_height(64), Less::default())
    }

    #[test]
    fn insert_then_remove_min_in_sorted_order() {
        let list = new_list();
        let pool = Pool;
        let values: [(u32, &str); 6] = [(2, "two"), (6, "six"), (3, "three"), (4, "four"), (1, "one"), (5, "five")];
        for (k, v) in values {
            let node = AllocStrategy::<u32, &str>::allocate(&pool, list.height(), k, v).unwrap();
            list.insert(node);
        }
        assert_eq!(list.len(), 6);

        let mut popped = Vec::new();
        while let Some(node) = list.try_remove_min() {
            let key = *unsafe { node.as_ref() }.key();
            popped.push(key);
            let guard = crossbeam_epoch::pin();
            unsafe { AllocStrategy::<u32, &str>::recycle(&pool, node, &guard) };
        }
        assert_eq!(popped, vec![1, 2, 3, 4, 5, 6]);
        assert!(list.is_empty());
    }

    #[test]
    fn empty_list_pops_none() {
        let list = new_list();
        assert!(list.try_remove_min().is_none());
    }

    #[test]
    fn unsafe_reset_empties_without_recycling() {
        let list = new_list();
        let pool = Pool;
        let node = AllocStrategy::<u32, &str>::allocate(&pool, list.height(), 1, "one").unwrap();
        list.insert(node);
        assert_eq!(list.len(), 1);
        unsafe { list.unsafe_reset() };
        assert!(list.is_empty());
        assert!(list.try_remove_min().is_none());
    }
}
