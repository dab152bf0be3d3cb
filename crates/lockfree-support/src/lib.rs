//! Shared backoff, versioning, allocation, and thread-local helpers used by
//! the atomic shared pointer, the concurrent FIFO, and the concurrent
//! priority queue.
//!
//! Keeping this cross-cutting logic in one crate means the version
//! wraparound predicate, the co-located allocation math, and the adaptive
//! backoff strategy each have exactly one implementation shared by every
//! lock-free structure that needs them, rather than three slightly
//! different copies.

mod backoff;
mod layout;
mod thread_local;
mod version;

pub use backoff::Backoff;
pub use layout::{alloc_header_array, check_alignment_fits_u8, dealloc_header_array, header_array_layout};
pub use thread_local::{PerThread, PerThreadCell};
pub use version::{in_range, next_version, IN_RANGE_DELTA, MAX_VERSION};
