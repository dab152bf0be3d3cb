//! Per-instance thread-local state (Design Notes, spec.md §9).
//!
//! The original C++ keys a per-instance integer into a thread-local vector
//! because C++ has no native per-object thread-local storage. Rust does: a
//! `thread_local::ThreadLocal<T>` field on the owning object gives every
//! thread its own `T` *for that specific object*, lazily initialized on
//! first access and dropped when either the thread exits or the owning
//! object is dropped — exactly the three guarantees Design Notes ask for,
//! with no hand-rolled indexing and no risk of cross-instance aliasing.
//!
//! Consumers of this wrapper reach for `PerThread<RefCell<Binding>>` when
//! the bound state needs interior mutability (the common case: a producer's
//! current buffer, a consumer's current binding and pop-count).

use std::cell::RefCell;
use thread_local::ThreadLocal;

/// One `T` per (thread, owning instance) pair.
pub struct PerThread<T: Send> {
    inner: ThreadLocal<T>,
}

impl<T: Send> PerThread<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: ThreadLocal::new(),
        }
    }

    /// Returns this thread's slot, initializing it on first access.
    #[inline]
    pub fn get_or<F>(&self, init: F) -> &T
    where
        F: FnOnce() -> T,
    {
        self.inner.get_or(init)
    }

    /// Iterates over every thread's slot that has been initialized so far.
    /// Used for aggregate operations (`unsafe_clear`, `unsafe_reset`,
    /// size hints) that must be run single-threaded by the caller's
    /// contract.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.inner.iter_mut()
    }
}

impl<T: Send> Default for PerThread<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience alias for the common case of a mutable per-thread binding.
pub type PerThreadCell<T> = PerThread<RefCell<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn each_thread_gets_its_own_slot() {
        let per_thread: Arc<PerThreadCell<usize>> = Arc::new(PerThread::new());
        let inits = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let per_thread = Arc::clone(&per_thread);
                let inits = Arc::clone(&inits);
                thread::spawn(move || {
                    let cell = per_thread.get_or(|| {
                        inits.fetch_add(1, Ordering::Relaxed);
                        RefCell::new(0usize)
                    });
                    *cell.borrow_mut() = i;
                    *cell.borrow()
                })
            })
            .collect();

        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let mut sorted = results;
        sorted.sort_unstable();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());
        assert_eq!(inits.load(Ordering::Relaxed), 8);
    }
}
