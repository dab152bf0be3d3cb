use thiserror::Error;

/// Errors surfaced by the claim-construction path (`claim_shared`), which
/// wraps caller-supplied storage instead of allocating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// The pointer handed to `claim_shared` was null.
    #[error("cannot claim a null pointer")]
    NullPointer,
}
