//! Loom-based concurrency tests for `atomic-shared-ptr`.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! Loom exhaustively explores thread interleavings, so the model here is a
//! deliberately shrunk version of the real packed-word protocol (a 3-bit
//! local-ref lane instead of 8, two threads instead of many) to keep the
//! state space tractable.

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicU64, Ordering};
use loom::sync::Arc;
use loom::thread;

const LOCAL_REF_BITS: u64 = 3;
const LOCAL_REF_MASK: u64 = (1 << LOCAL_REF_BITS) - 1;
const DEFAULT_LOCAL_REFS: u64 = LOCAL_REF_MASK;

/// Models one `AtomicSharedPtr<T>` word: an address in the high bits and a
/// local-ref lane in the low bits. `strong` stands in for the control
/// block's real strong count.
struct LoomSlot {
    word: AtomicU64,
    strong: AtomicU64,
}

impl LoomSlot {
    fn new() -> Self {
        // Address 1 (any nonzero tag stands in for "occupied"), lane full.
        LoomSlot {
            word: AtomicU64::new((1 << LOCAL_REF_BITS) | DEFAULT_LOCAL_REFS),
            strong: AtomicU64::new(DEFAULT_LOCAL_REFS),
        }
    }

    fn local_refs(word: u64) -> u64 {
        word & LOCAL_REF_MASK
    }

    /// Redeem one unit from the lane, refilling from `strong` if it is dry.
    fn load(&self) -> bool {
        loop {
            let current = self.word.load(Ordering::Acquire);
            if Self::local_refs(current) == 0 {
                self.strong.fetch_add(DEFAULT_LOCAL_REFS, Ordering::Relaxed);
                let refilled = (current & !LOCAL_REF_MASK) | DEFAULT_LOCAL_REFS;
                if self.word.compare_exchange(current, refilled, Ordering::AcqRel, Ordering::Acquire).is_err() {
                    // Lost the refill race: give the speculative batch back.
                    self.strong.fetch_sub(DEFAULT_LOCAL_REFS, Ordering::Relaxed);
                }
                continue;
            }
            let decremented = current - 1;
            if self.word.compare_exchange_weak(current, decremented, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                return true;
            }
        }
    }
}

/// Two threads redeeming lane units concurrently must never drive the real
/// strong count to (or below) zero while a load still holds a unit.
#[test]
fn loom_load_never_underflows_strong() {
    loom::model(|| {
        let slot = Arc::new(LoomSlot::new());
        let s1 = Arc::clone(&slot);
        let s2 = Arc::clone(&slot);

        let t1 = thread::spawn(move || s1.load());
        let t2 = thread::spawn(move || s2.load());

        assert!(t1.join().unwrap());
        assert!(t2.join().unwrap());

        // Both redeemed a unit; strong may have grown from refills but
        // never below what's still owed to the outstanding lane.
        let word = slot.word.load(Ordering::Acquire);
        let strong = slot.strong.load(Ordering::Acquire);
        assert!(strong >= LoomSlot::local_refs(word));
    });
}

/// Concurrent loads racing a refill: exactly one refiller's CAS wins, and
/// the loser's speculative batch must be given back rather than leaked
/// into `strong` permanently.
#[test]
fn loom_concurrent_refill_race_is_exactly_compensated() {
    loom::model(|| {
        let slot = Arc::new(LoomSlot {
            word: AtomicU64::new((1 << LOCAL_REF_BITS) | 0),
            strong: AtomicU64::new(0),
        });
        let s1 = Arc::clone(&slot);
        let s2 = Arc::clone(&slot);

        let t1 = thread::spawn(move || s1.load());
        let t2 = thread::spawn(move || s2.load());

        t1.join().unwrap();
        t2.join().unwrap();

        let word = slot.word.load(Ordering::Acquire);
        let strong = slot.strong.load(Ordering::Acquire);
        // Exactly one refill can ever win the CAS (the loser's speculative
        // batch is fully given back), and both loads redeemed one unit.
        assert_eq!(strong, DEFAULT_LOCAL_REFS);
        assert_eq!(LoomSlot::local_refs(word), DEFAULT_LOCAL_REFS - 2);
    });
}
