use thiserror::Error;

/// Allocation-strategy failures (spec.md §7's "allocation failure" kind).
/// `Pool` never returns this — it allocates through the global allocator,
/// which aborts rather than returning an error on exhaustion — but
/// `Scratch`'s fixed-size bump block genuinely can run dry between resets.
#[derive(Debug, Error)]
pub enum CpqError {
    #[error("scratch allocator exhausted ({used}/{capacity} bytes used); call unsafe_reset_scratch_pool")]
    ScratchExhausted { used: usize, capacity: usize },
}
