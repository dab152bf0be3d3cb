/// Configuration for a [`crate::Queue`].
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Initial per-producer buffer size, as a power of 2 (default: 16 = 64K slots).
    pub ring_bits: u8,
    /// Producer slots the array starts with before it needs to grow.
    pub initial_producer_capacity: usize,
    /// Hard ceiling on how many producers may ever be registered.
    pub max_producers: usize,
    /// Growth factor applied to the producer slot array only. A producer's
    /// own buffer always doubles when it fills (see
    /// [`Self::next_buffer_capacity`]) — the two growth schedules are
    /// intentionally decoupled.
    pub growth_factor: f32,
    /// Largest a single producer buffer is allowed to grow to, in slots.
    pub buffer_capacity_max: usize,
    /// How many consecutive pops a consumer takes from one producer buffer
    /// before being forced to relocate to the next, so no producer is
    /// starved when more than one is active.
    pub relocation_pop_count: usize,
    /// Enable metrics collection (slight overhead).
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    ///
    /// # Panics
    ///
    /// Panics if `ring_bits` is outside `[1, 20]`, if `max_producers` is 0,
    /// if `initial_producer_capacity` exceeds `max_producers`, or if
    /// `growth_factor` is not greater than 1.0.
    #[must_use]
    pub const fn new(
        ring_bits: u8,
        initial_producer_capacity: usize,
        max_producers: usize,
        enable_metrics: bool,
    ) -> Self {
        assert!(ring_bits > 0 && ring_bits <= 20, "ring_bits must be between 1 and 20 (max 1M slots)");
        assert!(max_producers > 0, "max_producers must be nonzero");
        assert!(
            initial_producer_capacity > 0 && initial_producer_capacity <= max_producers,
            "initial_producer_capacity must be in (0, max_producers]"
        );

        Self {
            ring_bits,
            initial_producer_capacity,
            max_producers,
            growth_factor: 1.4,
            buffer_capacity_max: 1 << 20,
            relocation_pop_count: 24,
            enable_metrics,
        }
    }

    /// Returns the per-producer buffer's initial capacity.
    #[inline]
    #[must_use]
    pub const fn ring_capacity(&self) -> usize {
        1 << self.ring_bits
    }

    /// Returns the mask for index wrapping at the initial buffer capacity.
    #[inline]
    #[must_use]
    pub const fn ring_mask(&self) -> usize {
        self.ring_capacity() - 1
    }

    /// Computes the next producer slot array capacity given a current one,
    /// growing by [`Self::growth_factor`] but never past `max_producers`.
    #[must_use]
    pub fn next_array_capacity(&self, current: usize) -> usize {
        let grown = ((current as f32) * self.growth_factor).ceil() as usize;
        grown.max(current + 1).min(self.max_producers)
    }

    /// Computes the next producer buffer capacity given a current one,
    /// always doubling but never past `buffer_capacity_max`. Unlike the
    /// producer slot array, a per-producer buffer's growth schedule is
    /// fixed at 2x rather than [`Self::growth_factor`].
    #[must_use]
    pub fn next_buffer_capacity(&self, current: usize) -> usize {
        let grown = current.saturating_mul(2);
        grown.max(current + 1).min(self.buffer_capacity_max)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(16, 16, 128, false)
    }
}

/// Low latency configuration: small buffers, small fixed producer count.
pub const LOW_LATENCY_CONFIG: Config = Config::new(12, 8, 16, false);

/// High throughput configuration: large buffers, room for many producers.
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(18, 32, 256, false);
