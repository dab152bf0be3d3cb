//! Debug assertion macros for producer buffer and slot array invariants.
//!
//! Active only in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

/// INV-SEQ-01: Bounded Count — `0 ≤ (tail - head) ≤ capacity`.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "INV-SEQ-01 violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// INV-SEQ-01 (consumer side): head must not advance past tail.
macro_rules! debug_assert_head_not_past_tail {
    ($new_head:expr, $tail:expr) => {
        debug_assert!(
            $new_head <= $tail,
            "INV-SEQ-01 violated: advancing head {} beyond tail {}",
            $new_head,
            $tail
        )
    };
}

/// INV-SEQ-02: Monotonic Progress — a sequence number only increases.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-SEQ-02 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// INV-SEQ-03: detects a sequence number jumping backwards unexpectedly
/// (not ordinary wraparound, which takes decades at realistic rates).
macro_rules! debug_assert_no_wrap {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new > $old || $old.wrapping_sub($new) > (1u64 << 32),
            "INV-SEQ-03 potential wrap detected: {} went from {} to {} (delta: {})",
            $name,
            $old,
            $new,
            $new.wrapping_sub($old)
        )
    };
}

/// INV-INIT-01: a slot read via `assume_init_read` must fall within the
/// currently-committed `[head, tail)` range.
macro_rules! debug_assert_initialized_read {
    ($pos:expr, $head:expr, $tail:expr) => {
        debug_assert!(
            $pos >= $head && $pos < $tail,
            "INV-INIT-01 violated: reading slot at seq {} outside initialized range [{}, {})",
            $pos,
            $head,
            $tail
        )
    };
}

/// INV-GROW-01: the producer slot array and per-buffer growth must always
/// strictly increase capacity, never shrink or stall.
macro_rules! debug_assert_capacity_grew {
    ($old:expr, $new:expr) => {
        debug_assert!(
            $new > $old,
            "INV-GROW-01 violated: capacity did not grow ({} -> {})",
            $old,
            $new
        )
    };
}

/// INV-RELOC-01: a consumer must not take more than `relocation_pop_count`
/// consecutive pops from one buffer before its forced-relocation counter
/// resets it elsewhere.
macro_rules! debug_assert_relocation_bound {
    ($consecutive:expr, $limit:expr) => {
        debug_assert!(
            $consecutive <= $limit,
            "INV-RELOC-01 violated: {} consecutive pops exceeds limit {}",
            $consecutive,
            $limit
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_capacity_grew;
pub(crate) use debug_assert_head_not_past_tail;
pub(crate) use debug_assert_initialized_read;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_no_wrap;
pub(crate) use debug_assert_relocation_bound;
