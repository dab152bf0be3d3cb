use concurrent_priority_queue::{ConcurrentPriorityQueue, Scratch};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn single_threaded_insert_order_pops_ascending() {
    let queue: ConcurrentPriorityQueue<u32, &str> = ConcurrentPriorityQueue::new();
    for (k, v) in [(2, "two"), (6, "six"), (3, "three"), (4, "four"), (1, "one"), (5, "five")] {
        queue.push(k, v);
    }

    let mut popped = Vec::new();
    while let Some((k, _)) = queue.try_pop() {
        popped.push(k);
    }
    assert_eq!(popped, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn concurrent_pushers_and_pullers_drain_in_nondecreasing_order() {
    const THREADS: usize = 8;
    const PER_THREAD: u32 = 2_000;

    let queue: Arc<ConcurrentPriorityQueue<u32, u32, 4096>> = Arc::new(ConcurrentPriorityQueue::new());

    let pushers: Vec<_> = (0..THREADS)
        .map(|t| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let key = (t as u32) * PER_THREAD + i;
                    queue.push(key, key);
                }
            })
        })
        .collect();
    for p in pushers {
        p.join().unwrap();
    }

    let popped = Arc::new(std::sync::Mutex::new(Vec::with_capacity((THREADS as u32 * PER_THREAD) as usize)));
    let remaining = Arc::new(AtomicUsize::new((THREADS as u32 * PER_THREAD) as usize));

    let pullers: Vec<_> = (0..THREADS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let popped = Arc::clone(&popped);
            let remaining = Arc::clone(&remaining);
            thread::spawn(move || {
                let mut local = Vec::new();
                loop {
                    match queue.try_pop() {
                        Some((k, _)) => {
                            local.push(k);
                            remaining.fetch_sub(1, Ordering::AcqRel);
                        }
                        None => {
                            if remaining.load(Ordering::Acquire) == 0 {
                                break;
                            }
                            thread::yield_now();
                        }
                    }
                }
                popped.lock().unwrap().extend(local);
            })
        })
        .collect();
    for p in pullers {
        p.join().unwrap();
    }

    let mut result = popped.lock().unwrap().clone();
    assert_eq!(result.len(), (THREADS as u32 * PER_THREAD) as usize);
    let mut expected: Vec<u32> = result.clone();
    expected.sort_unstable();
    result.sort_unstable();
    assert_eq!(result, expected);
}

#[test]
fn scratch_strategy_push_pop_reset_cycle_stays_bounded() {
    let queue: ConcurrentPriorityQueue<u32, u32, 16, Scratch> = ConcurrentPriorityQueue::with_scratch_capacity(4096);

    for cycle in 0..20u32 {
        for i in 0..10 {
            queue.push(cycle * 10 + i, i).expect("scratch has headroom within one cycle");
        }
        let mut popped = Vec::new();
        while let Some((k, _)) = queue.try_pop() {
            popped.push(k);
        }
        assert_eq!(popped.len(), 10);
        unsafe { queue.unsafe_reset_scratch_pool() };
        unsafe { queue.unsafe_reset() };
    }
}
