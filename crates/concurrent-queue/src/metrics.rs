use std::sync::atomic::{AtomicU64, Ordering};

/// Optional, lock-free metrics for monitoring queue performance.
///
/// Fields are atomics rather than plain integers because, unlike the
/// original single-consumer design, more than one consumer thread may be
/// updating the receive-side counters on the same buffer concurrently.
#[derive(Debug, Default)]
pub struct Metrics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    batches_sent: AtomicU64,
    batches_received: AtomicU64,
    reserve_spins: AtomicU64,
    relocations: AtomicU64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_messages_sent(&self, n: u64) {
        self.messages_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_batches_sent(&self, n: u64) {
        self.batches_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_messages_received(&self, n: u64) {
        self.messages_received.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_batches_received(&self, n: u64) {
        self.batches_received.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_reserve_spin(&self) {
        self.reserve_spins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_relocation(&self) {
        self.relocations.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_received: self.batches_received.load(Ordering::Relaxed),
            reserve_spins: self.reserve_spins.load(Ordering::Relaxed),
            relocations: self.relocations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time, non-atomic copy of a [`Metrics`] instance, suitable for
/// aggregation across producer buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub batches_sent: u64,
    pub batches_received: u64,
    pub reserve_spins: u64,
    pub relocations: u64,
}

impl std::ops::AddAssign for MetricsSnapshot {
    fn add_assign(&mut self, rhs: Self) {
        self.messages_sent += rhs.messages_sent;
        self.messages_received += rhs.messages_received;
        self.batches_sent += rhs.batches_sent;
        self.batches_received += rhs.batches_received;
        self.reserve_spins += rhs.reserve_spins;
        self.relocations += rhs.relocations;
    }
}
