//! A lock-free min-priority queue built on a version-tagged concurrent
//! skip-list.
//!
//! Keys are ordered ascending by default ([`comparator::Less`]); [`try_pop`]
//! always returns the current minimum. [`alloc_strategy`] selects how
//! skip-list nodes are allocated and reclaimed: [`alloc_strategy::Pool`]
//! (the default, epoch-reclaimed heap nodes), [`alloc_strategy::Scratch`]
//! (a bump-allocated fixed block, reset in bulk between quiescent periods),
//! or [`alloc_strategy::External`] (caller-owned nodes).
//!
//! [`try_pop`]: ConcurrentPriorityQueue::try_pop
//!
//! # Example
//!
//! ```
//! use concurrent_priority_queue::ConcurrentPriorityQueue;
//!
//! let queue: ConcurrentPriorityQueue<u32, &str> = ConcurrentPriorityQueue::new();
//! queue.push(5, "five");
//! queue.push(1, "one");
//! queue.push(3, "three");
//!
//! assert_eq!(queue.try_pop(), Some((1, "one")));
//! assert_eq!(queue.try_pop(), Some((3, "three")));
//! ```

mod alloc_strategy;
mod comparator;
mod engine;
mod error;
mod height;
mod invariants;
mod link;
mod node;
mod queue;

pub use alloc_strategy::{AllocStrategy, External, Pool, Scratch};
pub use comparator::{Comparator, Less};
pub use error::CpqError;
pub use node::Node;
pub use queue::ConcurrentPriorityQueue;
