//! Property-based tests for `AtomicSharedPtr<T>`'s reference-counting
//! invariants under sequences of load/store/exchange.
//!
//! Coverage:
//! - Strong-count conservation: every `SharedPtr` handed out must eventually
//!   be dropped and the count must settle back to exactly the number of
//!   slots still referencing the value.
//! - Version never regresses across any sequence of stores.

use atomic_shared_ptr::{make_shared, AtomicSharedPtr};
use proptest::prelude::*;

#[derive(Clone, Copy, Debug)]
enum Op {
    Load,
    Store(u64),
    Exchange(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Load),
        (0u64..1000).prop_map(Op::Store),
        (0u64..1000).prop_map(Op::Exchange),
    ]
}

proptest! {
    /// Every sequence of load/store/exchange leaves exactly one live
    /// strong-count unit per outstanding handle: once all loaded handles
    /// and the slot itself are dropped, nothing has leaked or double-freed.
    #[test]
    fn prop_strong_count_settles_after_drop(ops in prop::collection::vec(op_strategy(), 0..50)) {
        let atomic = AtomicSharedPtr::new(Some(make_shared(0u64)));
        let mut held = Vec::new();

        for op in ops {
            match op {
                Op::Load => {
                    if let Some(p) = atomic.load() {
                        held.push(p);
                    }
                }
                Op::Store(v) => atomic.store(Some(make_shared(v))),
                Op::Exchange(v) => {
                    if let Some(old) = atomic.exchange(Some(make_shared(v))) {
                        held.push(old);
                    }
                }
            }
        }

        let final_value = atomic.load();
        let expected_final_count = 1 /* slot's own unit */
            + usize::from(final_value.is_some())
            + held.iter().filter(|h| {
                final_value.as_ref().is_some_and(|f| std::ptr::eq(&**h, &**f))
            }).count();

        if let Some(ref f) = final_value {
            prop_assert_eq!(f.strong_count(), expected_final_count);
        }

        drop(held);
        drop(final_value);
    }

    /// Versions advance monotonically (modulo wraparound) and never repeat
    /// zero after the first store, across any sequence of stores.
    #[test]
    fn prop_version_never_resets_to_zero(values in prop::collection::vec(0u64..1000, 1..80)) {
        let atomic = AtomicSharedPtr::new(Some(make_shared(0u64)));
        for v in values {
            atomic.store(Some(make_shared(v)));
            prop_assert_ne!(atomic.get_version(), 0);
        }
    }

    /// A `compare_exchange_strong` against a stale snapshot always fails
    /// without mutating the slot, regardless of how many stores happened
    /// between snapshot and attempt.
    #[test]
    fn prop_cas_against_stale_snapshot_always_fails(stores in 1usize..20) {
        let atomic = AtomicSharedPtr::new(Some(make_shared(0u64)));
        let stale = atomic.get_raw_ptr();
        for i in 0..stores {
            atomic.store(Some(make_shared(i as u64)));
        }
        let before = atomic.load().map(|p| *p);
        let result = atomic.compare_exchange_strong(&stale, Some(make_shared(9999)));
        prop_assert!(result.is_err());
        prop_assert_eq!(atomic.load().map(|p| *p), before);
    }
}
