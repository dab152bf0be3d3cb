use crate::{Config, ProducerBuffer};
use atomic_shared_ptr::{make_shared, AtomicSharedPtr, SharedPtr};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A growable table of producer slots, each an [`AtomicSharedPtr`] to that
/// producer's current (newest) [`ProducerBuffer`].
///
/// The table itself lives behind an `AtomicSharedPtr`, so it can be
/// replaced wholesale by a copy-and-CAS grow without blocking concurrent
/// readers: a reader that loaded the old table before a grow keeps working
/// against it (every slot it cares about was copied forward), and any
/// future load sees the grown one.
pub(crate) struct ProducerSlotArray<T> {
    current: AtomicSharedPtr<Vec<AtomicSharedPtr<ProducerBuffer<T>>>>,
    registered: AtomicUsize,
    config: Config,
}

impl<T> ProducerSlotArray<T> {
    pub(crate) fn new(config: Config) -> Self {
        let initial = (0..config.initial_producer_capacity)
            .map(|_| AtomicSharedPtr::null())
            .collect::<Vec<_>>();
        Self {
            current: AtomicSharedPtr::new(Some(make_shared(initial))),
            registered: AtomicUsize::new(0),
            config,
        }
    }

    #[must_use]
    pub(crate) fn registered_count(&self) -> usize {
        self.registered.load(Ordering::Acquire)
    }

    /// Registers `buffer` as a new producer's initial buffer, returning its
    /// stable slot index. Grows the table in place, via copy-and-CAS, if it
    /// is full. Returns `None` once `Config::max_producers` is reached.
    pub(crate) fn register(&self, buffer: SharedPtr<ProducerBuffer<T>>) -> Option<usize> {
        loop {
            let idx = self.registered.load(Ordering::Acquire);
            if idx >= self.config.max_producers {
                return None;
            }

            let snapshot = self.current.load().expect("slot array is never empty");
            if idx >= snapshot.len() {
                self.try_grow(&snapshot);
                continue;
            }

            if self
                .registered
                .compare_exchange(idx, idx + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }

            snapshot[idx].store(Some(buffer));
            return Some(idx);
        }
    }

    /// Replaces the producer's current slot pointer, e.g. after it grew its
    /// own buffer and switched to a successor.
    pub(crate) fn update(&self, index: usize, buffer: SharedPtr<ProducerBuffer<T>>) {
        let snapshot = self.current.load().expect("slot array is never empty");
        snapshot[index].store(Some(buffer));
    }

    /// Returns producer `index`'s current buffer, if registered.
    #[must_use]
    pub(crate) fn get(&self, index: usize) -> Option<SharedPtr<ProducerBuffer<T>>> {
        let snapshot = self.current.load()?;
        snapshot.get(index)?.load()
    }

    /// Drops every slot pointer and resets the table to a fresh, empty one
    /// sized at `config.initial_producer_capacity`.
    ///
    /// # Safety
    /// No concurrent `register`/`get`/`update` call may be in flight.
    pub(crate) unsafe fn unsafe_reset(&self, config: Config) {
        let fresh = (0..config.initial_producer_capacity)
            .map(|_| AtomicSharedPtr::null())
            .collect::<Vec<_>>();
        self.current.store(Some(make_shared(fresh)));
        self.registered.store(0, Ordering::Release);
    }

    /// Copies every registered slot into a larger table and CASes it in.
    /// If another thread wins the race, the loser's copy is simply dropped;
    /// the caller retries against whatever table is now current.
    fn try_grow(&self, old: &SharedPtr<Vec<AtomicSharedPtr<ProducerBuffer<T>>>>) {
        let new_capacity = self.config.next_array_capacity(old.len());
        let mut grown = Vec::with_capacity(new_capacity);
        for slot in old.iter() {
            let replacement = AtomicSharedPtr::null();
            if let Some(existing) = slot.load() {
                replacement.store(Some(existing));
            }
            grown.push(replacement);
        }
        for _ in old.len()..new_capacity {
            grown.push(AtomicSharedPtr::null());
        }

        let expected = self.current.get_raw_ptr();
        let _ = self.current.compare_exchange_strong(&expected, Some(make_shared(grown)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(initial: usize, max: usize) -> Config {
        Config::new(4, initial, max, false)
    }

    #[test]
    fn register_assigns_increasing_indices() {
        let array = ProducerSlotArray::<u64>::new(cfg(4, 16));
        let b0 = make_shared(ProducerBuffer::with_capacity(16, cfg(4, 16)));
        let b1 = make_shared(ProducerBuffer::with_capacity(16, cfg(4, 16)));
        assert_eq!(array.register(b0), Some(0));
        assert_eq!(array.register(b1), Some(1));
        assert_eq!(array.registered_count(), 2);
    }

    #[test]
    fn register_grows_past_initial_capacity() {
        let config = cfg(1, 8);
        let array = ProducerSlotArray::<u64>::new(config);
        for i in 0..5 {
            let buf = make_shared(ProducerBuffer::with_capacity(16, config));
            assert_eq!(array.register(buf), Some(i));
        }
        assert!(array.get(4).is_some());
    }

    #[test]
    fn register_refuses_past_max_producers() {
        let config = cfg(2, 2);
        let array = ProducerSlotArray::<u64>::new(config);
        assert!(array.register(make_shared(ProducerBuffer::with_capacity(16, config))).is_some());
        assert!(array.register(make_shared(ProducerBuffer::with_capacity(16, config))).is_some());
        assert_eq!(array.register(make_shared(ProducerBuffer::with_capacity(16, config))), None);
    }
}
