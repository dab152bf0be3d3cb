//! Node allocation and reclamation strategies (spec.md §4.4).

use crate::error::CpqError;
use crate::node::Node;
use crossbeam_epoch::Guard;
use std::ptr::NonNull;
use std::sync::Mutex;

/// How a [`crate::ConcurrentPriorityQueue`] allocates and reclaims its
/// skip-list nodes.
pub trait AllocStrategy<K, V>: Default + Send + Sync {
    /// Allocates a node, returning an error only if this strategy has a
    /// hard capacity and it is exhausted (see [`Scratch`]).
    fn allocate(&self, height: u8, key: K, value: V) -> Result<NonNull<Node<K, V>>, CpqError>;

    /// Reclaims a node this strategy previously allocated, once it is
    /// fully unlinked from the list. `guard` is pinned for the duration of
    /// the public operation that unlinked it, so deferred destruction
    /// cannot run until every thread that might still be reading the node
    /// has released its own guard (spec.md §4.4: "not reused while any
    /// operation that observed it is still in flight").
    ///
    /// # Safety
    /// `node` must have come from this same strategy's [`Self::allocate`]
    /// and must already be unreachable from the list.
    unsafe fn recycle(&self, node: NonNull<Node<K, V>>, guard: &Guard);
}

/// Reclaim via epoch-based deferred destruction: a guard is pinned for the
/// duration of each public operation, and an unlinked node's destructor
/// runs only once every thread that could still be observing it has moved
/// past that epoch.
#[derive(Default)]
pub struct Pool;

impl<K: Send + 'static, V: Send + 'static> AllocStrategy<K, V> for Pool {
    fn allocate(&self, height: u8, key: K, value: V) -> Result<NonNull<Node<K, V>>, CpqError> {
        let boxed = Box::new(Node::new(height, key, value));
        Ok(NonNull::from(Box::leak(boxed)))
    }

    unsafe fn recycle(&self, node: NonNull<Node<K, V>>, guard: &Guard) {
        guard.defer_unchecked(move || drop(Box::from_raw(node.as_ptr())));
    }
}

/// Reclaim via a bump allocator over a fixed-size block: allocation is a
/// pointer bump (fast), recycling is a no-op, and the block is freed all at
/// once by [`crate::ConcurrentPriorityQueue::unsafe_reset_scratch_pool`] at
/// a quiescent point the caller chooses.
pub struct Scratch {
    inner: Mutex<ScratchInner>,
}

struct ScratchInner {
    bump: bumpalo::Bump,
    capacity: usize,
}

/// Default scratch block size: large enough for a few thousand typical
/// nodes without forcing every queue to carry a `::with_capacity` call.
const DEFAULT_SCRATCH_CAPACITY: usize = 1 << 20;

impl Default for Scratch {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SCRATCH_CAPACITY)
    }
}

impl Scratch {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(ScratchInner {
                bump: bumpalo::Bump::new(),
                capacity,
            }),
        }
    }

    /// Resets the bump block, reclaiming every byte allocated so far.
    ///
    /// # Safety
    /// No node this strategy ever allocated may still be reachable from, or
    /// concurrently accessed through, the queue — this frees their backing
    /// storage unconditionally.
    pub unsafe fn unsafe_reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.bump.reset();
    }
}

impl<K: 'static, V: 'static> AllocStrategy<K, V> for Scratch {
    fn allocate(&self, height: u8, key: K, value: V) -> Result<NonNull<Node<K, V>>, CpqError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let used = inner.bump.allocated_bytes();
        if used >= inner.capacity {
            return Err(CpqError::ScratchExhausted {
                used,
                capacity: inner.capacity,
            });
        }
        let node_ref: &mut Node<K, V> = inner.bump.alloc(Node::new(height, key, value));
        Ok(NonNull::from(node_ref))
    }

    unsafe fn recycle(&self, _node: NonNull<Node<K, V>>, _guard: &Guard) {
        // Bump allocations are freed in bulk by `unsafe_reset`, never per-node.
    }
}

// SAFETY: `Scratch` only exposes its `Bump` through the internal `Mutex`,
// which serializes every access to it.
unsafe impl Sync for Scratch {}

/// Caller-owned nodes: the queue never allocates or frees them. `push`
/// takes an already-constructed node pointer; `try_pop` hands one back for
/// the caller to dispose of.
#[derive(Default)]
pub struct External;

impl<K: Send + 'static, V: Send + 'static> AllocStrategy<K, V> for External {
    fn allocate(&self, _height: u8, _key: K, _value: V) -> Result<NonNull<Node<K, V>>, CpqError> {
        unreachable!("External strategy nodes are constructed by the caller, see ConcurrentPriorityQueue::push_node")
    }

    unsafe fn recycle(&self, _node: NonNull<Node<K, V>>, _guard: &Guard) {
        // The caller owns the node; the queue never frees it.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_allocate_then_recycle() {
        let pool = Pool;
        let node = <Pool as AllocStrategy<u32, u32>>::allocate(&pool, 1, 1, 2).unwrap();
        let guard = crossbeam_epoch::pin();
        unsafe { AllocStrategy::<u32, u32>::recycle(&pool, node, &guard) };
    }

    #[test]
    fn scratch_rejects_past_capacity() {
        let scratch = Scratch::with_capacity(64);
        let mut last_ok = true;
        for _ in 0..1000 {
            let result = <Scratch as AllocStrategy<u64, u64>>::allocate(&scratch, 1, 1, 2);
            last_ok = result.is_ok();
            if result.is_err() {
                break;
            }
        }
        assert!(!last_ok);
    }

    #[test]
    fn scratch_reset_reclaims_capacity() {
        let scratch = Scratch::with_capacity(256);
        while <Scratch as AllocStrategy<u64, u64>>::allocate(&scratch, 1, 1, 2).is_ok() {}
        unsafe { scratch.unsafe_reset() };
        assert!(<Scratch as AllocStrategy<u64, u64>>::allocate(&scratch, 1, 1, 2).is_ok());
    }
}
