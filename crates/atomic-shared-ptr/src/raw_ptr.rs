//! Non-owning snapshots of an [`crate::AtomicSharedPtr<T>`]'s current value.

use std::marker::PhantomData;

use crate::atomic::AtomicSharedPtr;
use crate::shared_ptr::SharedPtr;

/// A non-owning snapshot of an `AtomicSharedPtr<T>`: an address and the
/// version it carried at the time of the snapshot, with no strong count
/// attached. Cheap to copy, cheap to compare, safe to hold past the
/// originating pin — but it can only be dereferenced by [`Self::upgrade`]ing
/// it back through its owning `AtomicSharedPtr`, which re-validates the
/// snapshot is still current before handing out a real [`SharedPtr<T>`].
///
/// This is the handle `compare_exchange_*`'s `expected` parameter takes, and
/// what `AtomicSharedPtr::get_raw_ptr` returns for version bookkeeping
/// without the cost of a full pin.
#[derive(Clone, Copy)]
pub struct RawPtr<T> {
    pub(crate) addr: usize,
    pub(crate) version: u16,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T> RawPtr<T> {
    pub(crate) fn new(addr: usize, version: u16) -> Self {
        RawPtr {
            addr,
            version,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    #[must_use]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Attempts to turn this snapshot into an owning [`SharedPtr<T>`].
    ///
    /// Returns `None` if `owner`'s value has moved on since the snapshot was
    /// taken (a concurrent store, or the value being freed) — the caller
    /// should re-`load` and retry rather than treat this as "never existed".
    #[must_use]
    pub fn upgrade(&self, owner: &AtomicSharedPtr<T>) -> Option<SharedPtr<T>> {
        owner.upgrade_raw(self)
    }
}

impl<T> PartialEq for RawPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr && self.version == other.version
    }
}
impl<T> Eq for RawPtr<T> {}

impl<T> std::fmt::Debug for RawPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawPtr")
            .field("addr", &format_args!("{:#x}", self.addr))
            .field("version", &self.version)
            .finish()
    }
}
