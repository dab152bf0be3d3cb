//! The atomic slot itself: load/store/exchange/CAS over a tagged pointer
//! word, built on the batched local-reference lane described in
//! `packed.rs`.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicU64, Ordering};

use lockfree_support::{next_version, Backoff};

use crate::control_block::{drop_value_control_block, Header};
use crate::packed::{Packed, DEFAULT_LOCAL_REFS, LOCAL_REF_FILL_BOUNDARY};
use crate::raw_ptr::RawPtr;
use crate::shared_ptr::SharedPtr;

/// An atomic, lock-free slot holding an optional `SharedPtr<T>`.
///
/// Each word carries a small local-reference lane (see `packed.rs`)
/// pre-funded with strong-count units: `load` just fetch-subs the lane
/// instead of touching the control block's real strong count on every
/// call, and refills the lane with one batched `fetch_add` once it runs
/// low. A concurrent `store`/`exchange` settles whatever the lane still
/// owed the old control block before handing ownership to the caller.
pub struct AtomicSharedPtr<T> {
    word: AtomicU64,
    _marker: PhantomData<SharedPtr<T>>,
}

unsafe impl<T: Send + Sync> Send for AtomicSharedPtr<T> {}
unsafe impl<T: Send + Sync> Sync for AtomicSharedPtr<T> {}

impl<T> AtomicSharedPtr<T> {
    /// Creates a new atomic slot holding `value` (or empty, if `None`).
    #[must_use]
    pub fn new(value: Option<SharedPtr<T>>) -> Self {
        let word = match value {
            Some(ptr) => {
                let header = ptr.into_header();
                // `ptr` handed over exactly one strong unit; fill the lane
                // to `DEFAULT_LOCAL_REFS` so the first `DEFAULT_LOCAL_REFS`
                // loads never have to touch `strong` themselves.
                unsafe { (*header.as_ptr()).strong.fetch_add(usize::from(DEFAULT_LOCAL_REFS - 1), Ordering::Relaxed) };
                Packed::new(header.as_ptr() as usize, next_version(0), DEFAULT_LOCAL_REFS)
            }
            None => Packed::NULL,
        };
        AtomicSharedPtr {
            word: AtomicU64::new(word.to_bits()),
            _marker: PhantomData,
        }
    }

    /// Creates a new, empty atomic slot.
    #[must_use]
    pub fn null() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        Packed::from_bits(self.word.load(Ordering::Acquire)).is_null()
    }

    /// The slot's current version counter, for tests and diagnostics.
    #[must_use]
    pub fn get_version(&self) -> u16 {
        Packed::from_bits(self.word.load(Ordering::Acquire)).version()
    }

    /// Overwrites the version counter without touching the pointer.
    ///
    /// # Safety
    /// The caller must guarantee no other thread is concurrently operating
    /// on this slot (loading, storing, or CASing) — this is a maintenance
    /// operation for single-threaded reset paths, not a concurrent op.
    pub unsafe fn unsafe_set_version(&self, version: u16) {
        let current = Packed::from_bits(self.word.load(Ordering::Relaxed));
        let replaced = Packed::new(current.addr(), version, current.local_refs());
        self.word.store(replaced.to_bits(), Ordering::Relaxed);
    }

    /// A non-owning, cheap-to-copy snapshot of the current address and
    /// version, without pinning the control block.
    #[must_use]
    pub fn get_raw_ptr(&self) -> RawPtr<T> {
        let current = Packed::from_bits(self.word.load(Ordering::Acquire));
        RawPtr::new(current.addr(), current.version())
    }

    /// Loads the current value, returning `None` if the slot is empty.
    ///
    /// The fast path never touches the control block's real strong count:
    /// it fetch-subs one unit from the word's own local-reference lane,
    /// a prepaid batch of strong-count units the lane is already carrying.
    /// Only when the lane runs dry, or drops below the refill boundary,
    /// does a thread pay for a real `fetch_add` — amortized over the next
    /// `DEFAULT_LOCAL_REFS` loads against this word.
    #[must_use]
    pub fn load(&self) -> Option<SharedPtr<T>> {
        let mut backoff = Backoff::new();
        loop {
            let current = Packed::from_bits(self.word.load(Ordering::Acquire));
            if current.is_null() {
                return None;
            }

            if current.local_refs() == 0 {
                self.refill_local_refs(current);
                backoff.snooze();
                continue;
            }

            let decremented = current.with_decremented_local_ref();
            if self
                .word
                .compare_exchange_weak(current.to_bits(), decremented.to_bits(), Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                backoff.spin();
                continue;
            }

            if decremented.local_refs() < LOCAL_REF_FILL_BOUNDARY {
                self.refill_local_refs(decremented);
            }
            return Some(unsafe { SharedPtr::from_header(header_at(current.addr())) });
        }
    }

    /// Tops `observed`'s local-ref lane back up to `DEFAULT_LOCAL_REFS`,
    /// paying for the batch with one real `fetch_add` on the control
    /// block. Best-effort: if the word has moved on since `observed` was
    /// read, the speculative batch is handed straight back.
    fn refill_local_refs(&self, observed: Packed) {
        let room = DEFAULT_LOCAL_REFS - observed.local_refs();
        if room == 0 {
            return;
        }
        let header = header_at(observed.addr());
        unsafe { (*header.as_ptr()).strong.fetch_add(usize::from(room), Ordering::Relaxed) };
        let refilled = Packed::new(observed.addr(), observed.version(), DEFAULT_LOCAL_REFS);
        if self
            .word
            .compare_exchange_weak(observed.to_bits(), refilled.to_bits(), Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            release_strong_units::<T>(header, room);
        }
    }

    /// Unconditionally replaces the slot's value, dropping the previous one.
    pub fn store(&self, value: Option<SharedPtr<T>>) {
        drop(self.exchange(value));
    }

    /// Unconditionally replaces the slot's value, returning the previous
    /// one (or `None` if it was empty).
    pub fn exchange(&self, value: Option<SharedPtr<T>>) -> Option<SharedPtr<T>> {
        let new_addr = fill_new_target_lane(value);
        let mut backoff = Backoff::new();
        loop {
            let current = Packed::from_bits(self.word.load(Ordering::Acquire));
            let next = current.with_new_target(new_addr);
            if self
                .word
                .compare_exchange_weak(current.to_bits(), next.to_bits(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return take_previous::<T>(current);
            }
            backoff.spin();
        }
    }

    /// Replaces the slot's value only if it still matches `expected`
    /// exactly (both address and version). On success, returns the
    /// previous value (`Ok`). On failure, returns a fresh snapshot of
    /// whatever the slot actually held (`Err`), mirroring
    /// `std::sync::atomic`'s `compare_exchange` shape.
    ///
    /// Like hardware CAS, this does not retry internally: a spurious
    /// mismatch against a concurrently-changing local-ref lane is resolved
    /// by re-reading and re-comparing, bounded by a single [`Backoff`]-driven
    /// loop rather than looping forever.
    pub fn compare_exchange_strong(
        &self,
        expected: &RawPtr<T>,
        new_value: Option<SharedPtr<T>>,
    ) -> Result<Option<SharedPtr<T>>, RawPtr<T>> {
        self.compare_exchange_inner(expected, new_value, true)
    }

    /// As [`Self::compare_exchange_strong`], but may fail spuriously even
    /// when `expected` still matches — appropriate inside a retry loop that
    /// is already backing off (matches `AtomicU64::compare_exchange_weak`).
    pub fn compare_exchange_weak(
        &self,
        expected: &RawPtr<T>,
        new_value: Option<SharedPtr<T>>,
    ) -> Result<Option<SharedPtr<T>>, RawPtr<T>> {
        self.compare_exchange_inner(expected, new_value, false)
    }

    fn compare_exchange_inner(
        &self,
        expected: &RawPtr<T>,
        new_value: Option<SharedPtr<T>>,
        strong: bool,
    ) -> Result<Option<SharedPtr<T>>, RawPtr<T>> {
        let new_addr = fill_new_target_lane(new_value);
        let mut backoff = Backoff::new();
        loop {
            let current = Packed::from_bits(self.word.load(Ordering::Acquire));
            if current.addr() != expected.addr || current.version() != expected.version {
                return Err(RawPtr::new(current.addr(), current.version()));
            }
            let next = current.with_new_target(new_addr);
            let result =
                self.word
                    .compare_exchange_weak(current.to_bits(), next.to_bits(), Ordering::AcqRel, Ordering::Acquire);
            match result {
                Ok(_) => return Ok(take_previous::<T>(current)),
                Err(actual) => {
                    if strong {
                        let actual = Packed::from_bits(actual);
                        if actual.addr() != expected.addr || actual.version() != expected.version {
                            return Err(RawPtr::new(actual.addr(), actual.version()));
                        }
                        backoff.spin();
                    } else {
                        return Err(RawPtr::new(
                            Packed::from_bits(actual).addr(),
                            Packed::from_bits(actual).version(),
                        ));
                    }
                }
            }
        }
    }

    /// Re-validates `snapshot` against the current word and, if it still
    /// matches, turns it into an owning [`SharedPtr<T>`] via the same
    /// local-ref-lane protocol as [`Self::load`].
    pub(crate) fn upgrade_raw(&self, snapshot: &RawPtr<T>) -> Option<SharedPtr<T>> {
        if snapshot.is_null() {
            return None;
        }
        let mut backoff = Backoff::new();
        loop {
            let current = Packed::from_bits(self.word.load(Ordering::Acquire));
            if current.addr() != snapshot.addr || current.version() != snapshot.version {
                return None;
            }

            if current.local_refs() == 0 {
                self.refill_local_refs(current);
                backoff.snooze();
                continue;
            }

            let decremented = current.with_decremented_local_ref();
            if self
                .word
                .compare_exchange_weak(current.to_bits(), decremented.to_bits(), Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                backoff.spin();
                continue;
            }

            if decremented.local_refs() < LOCAL_REF_FILL_BOUNDARY {
                self.refill_local_refs(decremented);
            }
            return Some(unsafe { SharedPtr::from_header(header_at(current.addr())) });
        }
    }
}

impl<T> Drop for AtomicSharedPtr<T> {
    fn drop(&mut self) {
        let current = Packed::from_bits(*self.word.get_mut());
        if !current.is_null() {
            // No other loader can race a drop; release exactly the strong
            // units this word's local-ref lane was still holding (the whole
            // lane, since nothing will ever redeem the rest of it now).
            release_strong_units::<T>(header_at(current.addr()), current.local_refs());
        }
    }
}

impl<T> Default for AtomicSharedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

fn header_at(addr: usize) -> NonNull<Header> {
    // SAFETY: addr came from a Packed word written by this module, which
    // only ever stores addresses of live Header-prefixed allocations.
    unsafe { NonNull::new_unchecked(addr as *mut Header) }
}

/// Consumes `value`'s single strong unit into the new target address and
/// tops the word's future local-ref lane up to [`DEFAULT_LOCAL_REFS`] with
/// one real `fetch_add`, so `with_new_target` can hand that full lane out
/// for free. Returns the new target address (0 for `None`).
fn fill_new_target_lane<T>(value: Option<SharedPtr<T>>) -> usize {
    let Some(ptr) = value else {
        return 0;
    };
    let header = ptr.into_header();
    unsafe { (*header.as_ptr()).strong.fetch_add(usize::from(DEFAULT_LOCAL_REFS - 1), Ordering::Relaxed) };
    header.as_ptr() as usize
}

/// Turns a displaced word into the caller's owning handle: mints one fresh
/// strong unit for the returned `SharedPtr`, then releases every local-ref
/// unit the word itself was still carrying.
fn take_previous<T>(displaced: Packed) -> Option<SharedPtr<T>> {
    if displaced.is_null() {
        return None;
    }
    let header = header_at(displaced.addr());
    unsafe { (*header.as_ptr()).strong.fetch_add(1, Ordering::Relaxed) };
    release_strong_units::<T>(header, displaced.local_refs());
    Some(unsafe { SharedPtr::from_header(header) })
}

/// Releases `units` strong-count units from `header`, dropping and freeing
/// the control block if that was the last of them. A no-op for `units == 0`.
fn release_strong_units<T>(header: NonNull<Header>, units: u8) {
    if units == 0 {
        return;
    }
    let prev = unsafe { (*header.as_ptr()).strong.fetch_sub(usize::from(units), Ordering::Release) };
    if prev == usize::from(units) {
        fence(Ordering::Acquire);
        // SAFETY: strong count just hit zero under us.
        unsafe { drop_value_control_block::<T>(header) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make_shared;

    #[test]
    fn new_and_load_roundtrip() {
        let atomic = AtomicSharedPtr::new(Some(make_shared(7u64)));
        let loaded = atomic.load().unwrap();
        assert_eq!(*loaded, 7);
    }

    #[test]
    fn null_slot_loads_none() {
        let atomic: AtomicSharedPtr<u64> = AtomicSharedPtr::null();
        assert!(atomic.load().is_none());
        assert!(atomic.is_null());
    }

    #[test]
    fn store_replaces_and_drops_old_value() {
        let atomic = AtomicSharedPtr::new(Some(make_shared(1u64)));
        let v1 = atomic.get_version();
        atomic.store(Some(make_shared(2u64)));
        assert_eq!(*atomic.load().unwrap(), 2);
        assert_ne!(atomic.get_version(), v1);
    }

    #[test]
    fn exchange_returns_previous_value() {
        let atomic = AtomicSharedPtr::new(Some(make_shared(1u64)));
        let old = atomic.exchange(Some(make_shared(2u64))).unwrap();
        assert_eq!(*old, 1);
        assert_eq!(*atomic.load().unwrap(), 2);
    }

    #[test]
    fn compare_exchange_strong_succeeds_on_match_fails_on_mismatch() {
        let atomic = AtomicSharedPtr::new(Some(make_shared(1u64)));
        let snapshot = atomic.get_raw_ptr();
        let result = atomic.compare_exchange_strong(&snapshot, Some(make_shared(2u64)));
        assert!(result.is_ok());
        assert_eq!(*atomic.load().unwrap(), 2);

        let stale = snapshot;
        let err = atomic
            .compare_exchange_strong(&stale, Some(make_shared(3u64)))
            .unwrap_err();
        assert_ne!(err.version(), stale.version());
        assert_eq!(*atomic.load().unwrap(), 2);
    }

    #[test]
    fn raw_ptr_upgrade_fails_after_store() {
        let atomic = AtomicSharedPtr::new(Some(make_shared(1u64)));
        let raw = atomic.get_raw_ptr();
        atomic.store(Some(make_shared(2u64)));
        assert!(raw.upgrade(&atomic).is_none());
    }

    #[test]
    fn raw_ptr_upgrade_succeeds_while_unchanged() {
        let atomic = AtomicSharedPtr::new(Some(make_shared(9u64)));
        let raw = atomic.get_raw_ptr();
        let upgraded = raw.upgrade(&atomic).unwrap();
        assert_eq!(*upgraded, 9);
    }

    #[test]
    fn concurrent_loads_do_not_corrupt_strong_count() {
        use std::sync::Arc;
        use std::thread;

        let atomic = Arc::new(AtomicSharedPtr::new(Some(make_shared(42u64))));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let atomic = Arc::clone(&atomic);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let p = atomic.load().unwrap();
                        assert_eq!(*p, 42);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let last = atomic.load().unwrap();
        assert_eq!(*last, 42);
        // The real strong count now includes whatever the local-ref lane
        // still has prepaid, not just `atomic` + `last` — just check it
        // never underflowed below what's actually outstanding.
        assert!(last.strong_count() >= 2);
    }
}
