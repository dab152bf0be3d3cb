//! Raw allocation helpers for co-locating a header with a trailing array.
//!
//! Design Notes (spec.md §9) describe the original's "inline-new placement
//! into raw allocations" (`operator new(storage) T(args)` co-locating a
//! control block and its payload) and ask for this to become, in the target
//! language, "a single allocation sized by a `const fn`... split into two
//! fat pointers via a helper that returns both halves safely" with the raw
//! math never leaking to call sites. This module is that helper; it knows
//! only about `Layout` and byte offsets, never about any particular header
//! or element type's semantics.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// The layout of `{ header: H, data: [T; count] }` plus the byte offset of
/// the trailing array within it.
///
/// # Panics
///
/// Panics if the combined layout would overflow `isize::MAX`.
#[must_use]
pub fn header_array_layout<H, T>(count: usize) -> (Layout, usize) {
    let header_layout = Layout::new::<H>();
    let data_layout = Layout::array::<T>(count).expect("header_array_layout: array size overflow");
    header_layout
        .extend(data_layout)
        .expect("header_array_layout: combined layout overflow")
}

/// Allocates room for `{ header: H, data: [T; count] }` and returns the base
/// pointer plus the byte offset of the data array.
///
/// # Safety
///
/// The caller must initialize both the header and every element of the data
/// array before treating the allocation as valid, and must eventually
/// release it with a layout computed from the same `H`, `T`, and `count`
/// (e.g. via [`dealloc_header_array`]).
#[must_use]
pub unsafe fn alloc_header_array<H, T>(count: usize) -> (NonNull<u8>, usize) {
    let (layout, offset) = header_array_layout::<H, T>(count);
    let raw = alloc::alloc(layout);
    match NonNull::new(raw) {
        Some(ptr) => (ptr, offset),
        None => alloc::handle_alloc_error(layout),
    }
}

/// Releases an allocation previously obtained from [`alloc_header_array`]
/// with the same `H`, `T`, and `count`.
///
/// # Safety
///
/// `ptr` must have come from `alloc_header_array::<H, T>(count)` (or an
/// allocation with an identical layout), and must not be used afterward.
pub unsafe fn dealloc_header_array<H, T>(ptr: NonNull<u8>, count: usize) {
    let (layout, _) = header_array_layout::<H, T>(count);
    alloc::dealloc(ptr.as_ptr(), layout);
}

/// Compile-time-checked alignment contract: the ASP packs a version and a
/// local-reference count into the low bits below a control-block pointer,
/// so any type stored behind it must not demand more alignment than a
/// `u8` can index as a shift amount in the packed word.
///
/// # Panics
///
/// Panics (at const-eval time, i.e. a compile error at the call site) if
/// `align_of::<T>() > u8::MAX as usize`.
#[must_use]
pub const fn check_alignment_fits_u8<T>() -> usize {
    let align = std::mem::align_of::<T>();
    assert!(
        align <= u8::MAX as usize,
        "type alignment exceeds the packed pointer's representable range"
    );
    align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct Header {
        a: u64,
        b: u32,
    }

    #[test]
    fn layout_places_array_after_header_with_padding() {
        let (layout, offset) = header_array_layout::<Header, u64>(4);
        assert!(offset >= std::mem::size_of::<Header>());
        assert_eq!(offset % std::mem::align_of::<u64>(), 0);
        assert!(layout.size() >= offset + 4 * std::mem::size_of::<u64>());
    }

    #[test]
    fn alloc_dealloc_roundtrip() {
        unsafe {
            let (ptr, offset) = alloc_header_array::<Header, u32>(8);
            let header = ptr.as_ptr().cast::<Header>();
            (*header).a = 1;
            (*header).b = 2;
            let data = ptr.as_ptr().add(offset).cast::<u32>();
            for i in 0..8u32 {
                data.add(i as usize).write(i);
            }
            for i in 0..8u32 {
                assert_eq!(*data.add(i as usize), i);
            }
            dealloc_header_array::<Header, u32>(ptr, 8);
        }
    }

    #[test]
    fn check_alignment_accepts_normal_types() {
        assert_eq!(check_alignment_fits_u8::<u64>(), 8);
        assert_eq!(check_alignment_fits_u8::<Header>(), 8);
    }
}
