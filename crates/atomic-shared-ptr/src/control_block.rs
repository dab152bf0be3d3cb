//! The allocation an `AtomicSharedPtr<T>` / `SharedPtr<T>` actually points at.
//!
//! Two storage shapes exist, mirroring the original's "claim" vs "make"
//! construction paths (spec.md §9's co-located allocation note, and the
//! claim-size helpers in §6):
//!
//! - `Inline`: header and value are one allocation (the common case,
//!   analogous to `Arc::new` / `std::sync::Arc`'s internal `ArcInner`).
//! - `Claimed`: the value already lives in caller-owned storage (e.g. came
//!   from a custom allocator); the control block only owns a pointer and a
//!   deleter and never touches the value's bytes directly except through it.
//!
//! Both shapes share a `Header` so `AtomicSharedPtr` can manage the strong
//! count without caring which one it is holding.

use std::alloc::{self, Layout};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use lockfree_support::{alloc_header_array, check_alignment_fits_u8, dealloc_header_array, header_array_layout};

/// Discriminates which allocation shape a thin `NonNull<Header>` actually
/// points at, since the tagged pointer word has no spare bits left to carry
/// this itself (all 45 usable address bits are spent on addressing).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub(crate) enum ControlBlockKind {
    Inline = 0,
    InlineArray = 1,
    Claimed = 2,
}

/// Shared by every control block shape; lives at a fixed offset so
/// `ControlBlock::header` can be reached without knowing the storage kind.
#[repr(C)]
pub(crate) struct Header {
    pub(crate) strong: AtomicUsize,
    pub(crate) kind: ControlBlockKind,
}

impl Header {
    fn new(kind: ControlBlockKind) -> Self {
        Self {
            strong: AtomicUsize::new(1),
            kind,
        }
    }
}

/// A single co-located `{ header, value }` allocation.
#[repr(C, align(8))]
pub(crate) struct Inline<T> {
    pub(crate) header: Header,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Inline<T> {
    pub(crate) fn alloc(value: T) -> NonNull<Inline<T>> {
        let _ = check_alignment_fits_u8::<T>();
        let layout = Layout::new::<Inline<T>>();
        // SAFETY: layout is non-zero-sized (Header always contributes bytes).
        let raw = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout)).cast::<Inline<T>>();
        // SAFETY: freshly allocated, properly aligned for Inline<T>.
        unsafe {
            ptr.as_ptr().write(Inline {
                header: Header::new(ControlBlockKind::Inline),
                value: UnsafeCell::new(MaybeUninit::new(value)),
            });
        }
        ptr
    }

    /// # Safety
    /// `ptr` must point at a live `Inline<T>` allocated by [`Inline::alloc`].
    pub(crate) unsafe fn value(ptr: NonNull<Inline<T>>) -> *mut T {
        (*ptr.as_ptr()).value.get().cast::<T>()
    }

    /// Drops the value and frees the allocation.
    ///
    /// # Safety
    /// `ptr` must be the last live handle to this control block (strong
    /// count observed to be zero).
    pub(crate) unsafe fn drop_and_dealloc(ptr: NonNull<Inline<T>>) {
        std::ptr::drop_in_place(Self::value(ptr));
        let layout = Layout::new::<Inline<T>>();
        alloc::dealloc(ptr.as_ptr().cast::<u8>(), layout);
    }
}

/// A single co-located `{ header, [T; len] }` allocation backing
/// `SharedPtr<[T]>`. The trailing array's length is stored alongside the
/// header since it cannot be recovered from a thin pointer alone.
#[repr(C, align(8))]
pub(crate) struct InlineArray<T> {
    pub(crate) header: Header,
    len: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T> InlineArray<T> {
    pub(crate) fn alloc_with(len: usize, mut init: impl FnMut(usize) -> T) -> NonNull<u8> {
        let _ = check_alignment_fits_u8::<T>();
        // SAFETY: allocation is initialized field-by-field below before any
        // reader can observe it (strong count starts at 1, not yet shared).
        let (base, offset) = unsafe { alloc_header_array::<InlineArray<T>, T>(len) };
        unsafe {
            base.as_ptr().cast::<InlineArray<T>>().write(InlineArray {
                header: Header::new(ControlBlockKind::InlineArray),
                len,
                _marker: std::marker::PhantomData,
            });
            let data = base.as_ptr().add(offset).cast::<T>();
            for i in 0..len {
                data.add(i).write(init(i));
            }
        }
        base
    }

    /// # Safety
    /// `base` must point at a live allocation created by [`Self::alloc_with`].
    pub(crate) unsafe fn header(base: NonNull<u8>) -> *mut Header {
        base.as_ptr().cast::<Header>()
    }

    /// # Safety
    /// `base` must point at a live allocation created by [`Self::alloc_with`].
    pub(crate) unsafe fn len(base: NonNull<u8>) -> usize {
        (*base.as_ptr().cast::<InlineArray<T>>()).len
    }

    /// # Safety
    /// `base` must point at a live allocation created by [`Self::alloc_with`].
    pub(crate) unsafe fn data(base: NonNull<u8>) -> *mut T {
        let (_, offset) = header_array_layout::<InlineArray<T>, T>(Self::len(base));
        base.as_ptr().add(offset).cast::<T>()
    }

    /// # Safety
    /// `base` must be the last live handle to this control block.
    pub(crate) unsafe fn drop_and_dealloc(base: NonNull<u8>) {
        let len = Self::len(base);
        let data = Self::data(base);
        for i in 0..len {
            std::ptr::drop_in_place(data.add(i));
        }
        dealloc_header_array::<InlineArray<T>, T>(base, len);
    }
}

/// A control block wrapping caller-owned storage plus a deleter, for values
/// that did not originate from [`super::make_shared`] (e.g. claimed from a
/// custom allocator). See [`super::claim_shared`].
#[repr(C, align(8))]
pub(crate) struct Claimed<T> {
    pub(crate) header: Header,
    ptr: *mut T,
    drop_fn: unsafe fn(*mut T),
}

impl<T> Claimed<T> {
    pub(crate) fn alloc(ptr: *mut T, drop_fn: unsafe fn(*mut T)) -> NonNull<Claimed<T>> {
        let layout = Layout::new::<Claimed<T>>();
        let raw = unsafe { alloc::alloc(layout) };
        let cb = NonNull::new(raw).unwrap_or_else(|| alloc::handle_alloc_error(layout)).cast::<Claimed<T>>();
        unsafe {
            cb.as_ptr().write(Claimed {
                header: Header::new(ControlBlockKind::Claimed),
                ptr,
                drop_fn,
            });
        }
        cb
    }

    /// # Safety
    /// `cb` must point at a live `Claimed<T>`.
    pub(crate) unsafe fn value(cb: NonNull<Claimed<T>>) -> *mut T {
        (*cb.as_ptr()).ptr
    }

    /// # Safety
    /// `cb` must be the last live handle to this control block.
    pub(crate) unsafe fn drop_and_dealloc(cb: NonNull<Claimed<T>>) {
        let inner = std::ptr::read(cb.as_ptr());
        (inner.drop_fn)(inner.ptr);
        let layout = Layout::new::<Claimed<T>>();
        alloc::dealloc(cb.as_ptr().cast::<u8>(), layout);
    }
}

/// Reads the value out of a thin `NonNull<Header>` known to belong to a
/// `SharedPtr<T>` (i.e. created by `Inline::<T>::alloc` or
/// `Claimed::<T>::alloc`).
///
/// # Safety
/// `header` must point at a live `Header` whose kind is `Inline` or
/// `Claimed`, both instantiated with this same `T`.
pub(crate) unsafe fn value_ptr<T>(header: NonNull<Header>) -> *mut T {
    match (*header.as_ptr()).kind {
        ControlBlockKind::Inline => Inline::<T>::value(header.cast()),
        ControlBlockKind::Claimed => Claimed::<T>::value(header.cast()),
        ControlBlockKind::InlineArray => {
            unreachable!("a value control block is never tagged InlineArray")
        }
    }
}

/// Drops the value and deallocates a `SharedPtr<T>`'s control block.
///
/// # Safety
/// Same preconditions as [`value_ptr`], plus: this must be the last live
/// handle (strong count observed zero).
pub(crate) unsafe fn drop_value_control_block<T>(header: NonNull<Header>) {
    match (*header.as_ptr()).kind {
        ControlBlockKind::Inline => Inline::<T>::drop_and_dealloc(header.cast()),
        ControlBlockKind::Claimed => Claimed::<T>::drop_and_dealloc(header.cast()),
        ControlBlockKind::InlineArray => {
            unreachable!("a value control block is never tagged InlineArray")
        }
    }
}

/// Drops the elements and deallocates a `SharedSlicePtr<T>`'s control block.
///
/// # Safety
/// `header` must point at a live `Header` tagged `InlineArray`, instantiated
/// with this same `T`, and this must be the last live handle.
pub(crate) unsafe fn drop_array_control_block<T>(header: NonNull<Header>) {
    debug_assert_eq!((*header.as_ptr()).kind, ControlBlockKind::InlineArray);
    InlineArray::<T>::drop_and_dealloc(header.cast());
}

/// The byte size of the allocation [`super::make_shared`] would perform for
/// `T`, for callers pre-sizing a custom allocator or pool.
#[must_use]
pub fn allocate_shared_size<T>() -> usize {
    Layout::new::<Inline<T>>().size()
}

/// The byte size of the control block [`super::claim_shared`] allocates for
/// `T` with a plain deleter (no extra captured state).
#[must_use]
pub fn sp_claim_size<T>() -> usize {
    Layout::new::<Claimed<T>>().size()
}

/// The byte size of the control block for a claim whose deleter needs to
/// carry `extra` additional bytes of captured state (e.g. an allocator
/// handle), rounded up to `Claimed<T>`'s alignment.
#[must_use]
pub fn sp_claim_size_custom_delete<T>(extra: usize) -> usize {
    let base = Layout::new::<Claimed<T>>();
    let with_extra = Layout::from_size_align(base.size() + extra, base.align())
        .expect("sp_claim_size_custom_delete: size overflow");
    with_extra.pad_to_align().size()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_roundtrips_value() {
        let cb = Inline::alloc(42u64);
        unsafe {
            assert_eq!(*Inline::value(cb), 42);
            Inline::drop_and_dealloc(cb);
        }
    }

    #[test]
    fn inline_array_roundtrips_values() {
        let base = InlineArray::<u32>::alloc_with(5, |i| i as u32 * 10);
        unsafe {
            assert_eq!(InlineArray::<u32>::len(base), 5);
            let data = InlineArray::<u32>::data(base);
            for i in 0..5 {
                assert_eq!(*data.add(i), i as u32 * 10);
            }
            InlineArray::<u32>::drop_and_dealloc(base);
        }
    }

    #[test]
    fn claimed_runs_custom_deleter() {
        static mut DROPPED: bool = false;
        unsafe fn drop_box(ptr: *mut u64) {
            drop(Box::from_raw(ptr));
            DROPPED = true;
        }
        let boxed = Box::into_raw(Box::new(7u64));
        let cb = Claimed::alloc(boxed, drop_box);
        unsafe {
            assert_eq!(*Claimed::value(cb), 7);
            Claimed::drop_and_dealloc(cb);
            assert!(DROPPED);
        }
    }
}
