use concurrent_queue::{Config, Queue};
use proptest::prelude::*;

proptest! {
    /// Every value a single producer pushes comes back out exactly once,
    /// regardless of push batch sizes.
    #[test]
    fn prop_single_producer_no_loss_no_duplication(values in prop::collection::vec(0u64..10_000, 0..500)) {
        let queue = Queue::<u64>::new(Config::new(4, 1, 2, false));
        let producer = queue.register().unwrap();
        for &v in &values {
            prop_assert!(producer.push(v));
        }

        let mut seen = Vec::new();
        while let Some(item) = queue.try_pop() {
            seen.push(item);
        }
        prop_assert_eq!(seen, values);
    }

    /// `size()` always matches the number of items `try_pop` can still
    /// drain, for any push/pop interleaving on a single thread.
    #[test]
    fn prop_size_matches_drainable_count(
        ops in prop::collection::vec(prop::bool::ANY, 0..300),
    ) {
        let queue = Queue::<u64>::new(Config::new(4, 1, 2, false));
        let producer = queue.register().unwrap();
        let mut pushed = 0u64;
        let mut popped = 0u64;

        for push in ops {
            if push {
                if producer.push(pushed) {
                    pushed += 1;
                }
            } else if queue.try_pop().is_some() {
                popped += 1;
            }
        }

        prop_assert_eq!(queue.size(), (pushed - popped) as usize);

        let mut drained = 0;
        while queue.try_pop().is_some() {
            drained += 1;
        }
        prop_assert_eq!(drained as u64, pushed - popped);
    }

    /// `unsafe_clear` always leaves the queue empty, whatever was queued
    /// beforehand.
    #[test]
    fn prop_unsafe_clear_always_empties(values in prop::collection::vec(0u64..1000, 0..200)) {
        let queue = Queue::<u64>::new(Config::new(4, 1, 2, false));
        let producer = queue.register().unwrap();
        for &v in &values {
            producer.push(v);
        }
        unsafe { queue.unsafe_clear() };
        prop_assert_eq!(queue.size(), 0);
        prop_assert!(queue.try_pop().is_none());
    }
}
