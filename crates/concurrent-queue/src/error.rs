use thiserror::Error;

/// Error type for [`crate::Queue`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Too many producers registered (exceeds `max_producers` config).
    #[error("too many producers registered (max: {max})")]
    TooManyProducers {
        /// The configured maximum number of producers.
        max: usize,
    },
    /// Queue is closed.
    #[error("queue is closed")]
    Closed,
}
