use concurrent_priority_queue::ConcurrentPriorityQueue;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_pop_order_is_always_nondecreasing(keys in prop::collection::vec(0i32..10_000, 0..500)) {
        let queue: ConcurrentPriorityQueue<i32, ()> = ConcurrentPriorityQueue::new();
        for &k in &keys {
            queue.push(k, ());
        }

        let mut popped = Vec::with_capacity(keys.len());
        while let Some((k, ())) = queue.try_pop() {
            popped.push(k);
        }

        let mut expected = keys;
        expected.sort_unstable();
        prop_assert_eq!(popped, expected);
    }

    #[test]
    fn prop_len_tracks_push_minus_pop(ops in prop::collection::vec(any::<bool>(), 0..500)) {
        let queue: ConcurrentPriorityQueue<u32, ()> = ConcurrentPriorityQueue::new();
        let mut model = 0u32;
        let mut next_key = 0u32;

        for push in ops {
            if push || model == 0 {
                queue.push(next_key, ());
                next_key += 1;
                model += 1;
            } else {
                let popped = queue.try_pop();
                prop_assert!(popped.is_some());
                model -= 1;
            }
            prop_assert_eq!(queue.len() as u32, model);
            prop_assert_eq!(queue.empty(), model == 0);
        }
    }

    #[test]
    fn prop_clear_always_empties(keys in prop::collection::vec(0i32..1_000, 0..200)) {
        let queue: ConcurrentPriorityQueue<i32, ()> = ConcurrentPriorityQueue::new();
        for &k in &keys {
            queue.push(k, ());
        }
        queue.clear();
        prop_assert!(queue.empty());
        prop_assert_eq!(queue.try_pop(), None);
    }
}
