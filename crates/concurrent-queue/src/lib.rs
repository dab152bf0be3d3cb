//! An unbounded, lock-free multi-producer/multi-consumer FIFO queue.
//!
//! Each producer writes into its own dedicated [`ProducerBuffer`] chain
//! (a forest of power-of-two ring buffers linked by successor pointers),
//! eliminating producer-producer contention. Consumers share that pool of
//! buffers under a relocation policy (see [`Queue::try_pop`]) that keeps
//! one slow producer from starving the rest.
//!
//! # Example
//!
//! ```
//! use concurrent_queue::{Config, Queue};
//!
//! let queue = Queue::<u64>::new(Config::default());
//! let producer = queue.register().unwrap();
//!
//! producer.push(42);
//!
//! if let Some(mut reservation) = producer.reserve(1) {
//!     reservation.write(43);
//!     reservation.commit();
//! }
//!
//! while let Some(item) = queue.try_pop() {
//!     println!("received: {item}");
//! }
//! ```

mod cell;
mod config;
mod error;
mod invariants;
mod metrics;
mod producer_buffer;
mod producer_slot_array;
mod queue;
mod reservation;

pub use config::{Config, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use error::QueueError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use producer_buffer::ProducerBuffer;
pub use queue::{Producer, Queue, Reservation};
