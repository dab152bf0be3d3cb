//! A lock-free atomic shared pointer: an `AtomicSharedPtr<T>` slot that
//! supports `load`/`store`/`exchange`/`compare_exchange_*` without ever
//! blocking, by pairing a versioned tagged pointer with a small in-word
//! local-reference lane that lets `load` pin a value just long enough to
//! promote it to a real strong count.
//!
//! The control block is co-located with its payload in a single allocation
//! (the same trick `std::sync::Arc` uses), with a claim-construction path
//! for values that already live in caller-owned storage.

mod atomic;
mod control_block;
mod error;
mod packed;
mod raw_ptr;
mod shared_ptr;

pub use atomic::AtomicSharedPtr;
pub use control_block::{allocate_shared_size, sp_claim_size, sp_claim_size_custom_delete};
pub use error::ClaimError;
pub use raw_ptr::RawPtr;
pub use shared_ptr::{SharedPtr, SharedSlicePtr};

use std::ptr::NonNull;

use control_block::{Claimed, Inline, InlineArray};

/// Allocates a new control block co-located with `value` and returns an
/// owning handle to it.
#[must_use]
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    SharedPtr::from_inline(Inline::alloc(value))
}

/// Alias for [`make_shared`], matching the claim-family naming
/// (`allocate_shared` / `allocate_shared_size`) used when a caller wants to
/// pre-size the allocation via [`allocate_shared_size`] before constructing.
#[must_use]
pub fn allocate_shared<T>(value: T) -> SharedPtr<T> {
    make_shared(value)
}

/// Allocates a new control block co-located with `len` elements, each
/// produced by `init(index)`, and returns an owning handle to the array.
#[must_use]
pub fn make_shared_slice<T>(len: usize, init: impl FnMut(usize) -> T) -> SharedSlicePtr<T> {
    SharedSlicePtr::from_base(InlineArray::alloc_with(len, init))
}

/// Alias for [`make_shared_slice`].
#[must_use]
pub fn allocate_shared_slice<T>(len: usize, init: impl FnMut(usize) -> T) -> SharedSlicePtr<T> {
    make_shared_slice(len, init)
}

/// Wraps an already-allocated `T` (and a deleter responsible for releasing
/// it) in a fresh control block, producing a [`SharedPtr<T>`] that did not
/// come from [`make_shared`].
///
/// This is the "claim" path: `ptr` was allocated by the caller (possibly via
/// a custom allocator whose block was sized with [`sp_claim_size`] or
/// [`sp_claim_size_custom_delete`]), and `drop_fn` is called on it exactly
/// once, when the last `SharedPtr` handle is dropped.
///
/// # Errors
///
/// Returns [`ClaimError::NullPointer`] if `ptr` is null.
///
/// # Safety
///
/// `ptr` must be valid for reads and writes of a `T`, uniquely owned by the
/// caller at the time of the call, and `drop_fn` must correctly release
/// whatever allocation `ptr` came from.
pub unsafe fn claim_shared<T>(ptr: *mut T, drop_fn: unsafe fn(*mut T)) -> Result<SharedPtr<T>, ClaimError> {
    let Some(_) = NonNull::new(ptr) else {
        return Err(ClaimError::NullPointer);
    };
    Ok(SharedPtr::from_claimed(Claimed::alloc(ptr, drop_fn)))
}
