use crate::ProducerBuffer;
use std::mem::MaybeUninit;

/// Zero-copy reservation for writing directly into a producer's buffer.
///
/// The producer obtains a reservation, writes data into the provided slice,
/// then commits to make the data visible to consumers.
///
/// **Important:** A `Reservation` may contain fewer items than requested from
/// `reserve(n)` if the reservation wraps around the buffer boundary. Always
/// check `as_mut_slice().len()` to determine how many items were actually
/// reserved.
pub struct Reservation<'a, T> {
    slice: &'a mut [MaybeUninit<T>],
    buffer_ptr: *const ProducerBuffer<T>,
    len: usize,
}

impl<'a, T> Reservation<'a, T> {
    pub(crate) fn new(slice: &'a mut [MaybeUninit<T>], buffer_ptr: *const ProducerBuffer<T>) -> Self {
        let len = slice.len();
        Self { slice, buffer_ptr, len }
    }

    /// Returns a mutable slice for writing data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [MaybeUninit<T>] {
        self.slice
    }

    /// Returns the number of reserved slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the reservation is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Commits the reservation, making data visible to consumers.
    pub fn commit(self) {
        let len = self.len;
        self.commit_n(len);
    }

    /// Commits `n` items (where `n <= len()`). You can commit fewer items
    /// than reserved by passing a smaller count.
    ///
    /// # Panics
    ///
    /// Panics if `n` is greater than the number of reserved slots.
    pub fn commit_n(self, n: usize) {
        assert!(n <= self.len, "cannot commit more than reserved");
        // SAFETY: buffer_ptr was supplied by the buffer that created this
        // reservation, and the reservation holding exclusive access to
        // `slice` means the buffer cannot have been dropped in the meantime
        // (its owner retains it until all reservations against it drop).
        unsafe {
            let buffer = &*self.buffer_ptr;
            buffer.commit_internal(n);
        }
    }
}
