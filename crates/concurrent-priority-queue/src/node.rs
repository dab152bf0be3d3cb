//! Skip-list node: key/value plus a tower of version-tagged link slots
//! (spec.md §3.3).

use crate::link::{AtomicLink, Link};
use std::cell::UnsafeCell;
use std::sync::atomic::Ordering;

/// A skip-list node. The head sentinel is a `Node` with `key = None`; an
/// empty list is every head tower slot looping back to the head itself
/// (spec.md §4.3.1).
///
/// `key` is read many times over the node's life (every `find` that walks
/// past it) but taken out of its `Option` exactly once, by whichever
/// thread wins the flag-then-delink race that removes this node
/// (spec.md §4.3.4), same as `value`; both live behind `UnsafeCell` so
/// that single winner can take them through a shared `&Node`.
#[repr(align(8))]
pub struct Node<K, V> {
    key: UnsafeCell<Option<K>>,
    value: UnsafeCell<Option<V>>,
    height: u8,
    links: Box<[AtomicLink]>,
}

// SAFETY: `key`/`value`'s `UnsafeCell`s are only ever mutated by the single
// thread that wins this node's delete race (see `take_key`/`take_value`),
// and only after that node is unreachable from new readers; `Send`/`Sync`
// require `K: Send`/`V: Send` for the same reason `Box<K>`/`Box<V>` would.
unsafe impl<K: Send, V: Send> Send for Node<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Node<K, V> {}

impl<K, V> Node<K, V> {
    /// Builds the head sentinel: `height` tower slots, every one looping
    /// back to `self_ptr` (the node's own eventual address).
    pub(crate) fn head(height: u8) -> Box<Self> {
        let mut node = Box::new(Self {
            key: UnsafeCell::new(None),
            value: UnsafeCell::new(None),
            height,
            links: (0..height).map(|_| AtomicLink::new(Link::new(std::ptr::null(), 0))).collect(),
        });
        let self_ptr: *const Self = &*node;
        for link in node.links.iter() {
            link.store(Link::new(self_ptr, 0), Ordering::Relaxed);
        }
        node
    }

    /// Builds a regular node at the given `height`. Tower slots start out
    /// pointing nowhere (`null`, version 0); a queue's `insert` stages each
    /// one to point at `next[layer]` (spec.md §4.3.3 step 3) before
    /// publishing the node into the list. `height` must not exceed the
    /// target queue's own skip-list height — use
    /// [`crate::alloc_strategy`]'s strategies to get one sized correctly,
    /// unless constructing a node directly for
    /// [`crate::ConcurrentPriorityQueue::push_node`] (the `External`
    /// strategy).
    #[must_use]
    pub fn new(height: u8, key: K, value: V) -> Self {
        Self {
            key: UnsafeCell::new(Some(key)),
            value: UnsafeCell::new(Some(value)),
            height,
            links: (0..height).map(|_| AtomicLink::new(Link::new(std::ptr::null(), 0))).collect(),
        }
    }

    /// Stages tower slot `layer` to point at `next`, zero-versioned. Only
    /// valid before the node is linked into the list (no concurrent reader
    /// can observe it yet).
    #[inline]
    pub(crate) fn stage_link(&self, layer: u8, next: *const Self) {
        self.links[layer as usize].store(Link::new(next, 0), Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u8 {
        self.height
    }

    /// Key of a non-head node. Every call site first rules out the head via
    /// an identity check against the list's `head_ptr`, so `None` (head)
    /// never reaches here.
    /// # Safety
    /// Callers must not hold this reference across a concurrent
    /// [`Self::take_key`] on the same node — guaranteed in practice because
    /// every read happens during a `find` walk that only ever touches
    /// still-linked (not yet delinked) nodes.
    #[inline]
    #[must_use]
    pub(crate) fn key(&self) -> &K {
        unsafe { &*self.key.get() }.as_ref().expect("key() called on the head sentinel")
    }

    /// Takes the key out, leaving the node's slot empty. Must only be
    /// called by the single thread that completed this node's delete, and
    /// only once.
    ///
    /// # Safety
    /// No other thread may read or write `key` concurrently with this
    /// call — guaranteed once the node has been fully delinked.
    pub(crate) unsafe fn take_key(&self) -> K {
        (*self.key.get()).take().expect("front node's key already taken")
    }

    #[inline]
    #[must_use]
    pub(crate) fn link(&self, layer: u8) -> &AtomicLink {
        &self.links[layer as usize]
    }

    /// Takes the value out, leaving the node's slot empty. Must only be
    /// called by the single thread that completed this node's delete.
    ///
    /// # Safety
    /// No other thread may read or write `value` concurrently with this
    /// call — guaranteed once the node has been fully delinked.
    pub(crate) unsafe fn take_value(&self) -> V {
        (*self.value.get()).take().expect("front node's value already taken")
    }
}
