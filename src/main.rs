/*!
 * Finelock Stress Driver
 *
 * Runs each container under a multi-threaded workload and verifies that
 * nothing was lost or duplicated:
 * - List: per-thread insert/find, then each thread removes its own items
 * - Queue: one producer, many blocking consumers, stop sentinels
 * - Map: parallel disjoint sets, then snapshot and point-lookup checksums
 */

use anyhow::{ensure, Result};
use finelock::{init_tracing, FineGrainedList, MapConfig, ShardedMap, TwoLockQueue};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Instant;
use tracing::info;

const ITEMS_PER_THREAD: i64 = 1_000;
const STOP: i64 = -1;

fn thread_count() -> usize {
    finelock::config::cpu_count().max(2)
}

fn run_list(threads: usize) -> Result<()> {
    let list = FineGrainedList::new();
    let barrier = Barrier::new(threads);
    let misses = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|s| {
        for t in 0..threads as i64 {
            let list = &list;
            let barrier = &barrier;
            let misses = &misses;
            s.spawn(move || {
                let base = t * ITEMS_PER_THREAD;
                barrier.wait();
                for i in 0..ITEMS_PER_THREAD {
                    list.push_front(base + i);
                    // Anything this thread already inserted must be findable
                    let existing = base + i / 2;
                    if list.find_first_if(|item| *item == existing).is_none() {
                        misses.fetch_add(1, Ordering::Relaxed);
                    }
                }
                list.remove_if(|item| item / ITEMS_PER_THREAD == t);
            });
        }
    });

    let misses = misses.load(Ordering::Relaxed);
    ensure!(misses == 0, "{misses} inserted items could not be found");
    ensure!(list.is_empty(), "list not empty after every thread removed its items");
    info!(threads, elapsed = ?start.elapsed(), "fine-grained list workload passed");
    Ok(())
}

fn run_queue(threads: usize) -> Result<()> {
    let queue = TwoLockQueue::new();
    let consumers = threads - 1;
    let items = consumers as i64 * ITEMS_PER_THREAD;
    let popped_sum = AtomicI64::new(0);
    let start = Instant::now();

    thread::scope(|s| {
        for _ in 0..consumers {
            let queue = &queue;
            let popped_sum = &popped_sum;
            s.spawn(move || loop {
                let item = *queue.wait_and_pop();
                if item == STOP {
                    break;
                }
                popped_sum.fetch_add(item, Ordering::Relaxed);
            });
        }

        for i in 0..items {
            queue.push(i);
        }
        for _ in 0..consumers {
            queue.push(STOP);
        }
    });

    let expected = items * (items - 1) / 2;
    let actual = popped_sum.load(Ordering::Relaxed);
    ensure!(actual == expected, "queue checksum mismatch: {actual} != {expected}");
    ensure!(queue.is_empty(), "queue not drained");
    info!(consumers, items, elapsed = ?start.elapsed(), "two-lock queue workload passed");
    Ok(())
}

fn run_map(threads: usize) -> Result<()> {
    let map = ShardedMap::with_config(MapConfig::high_contention());
    let barrier = Barrier::new(threads);
    let expected_sum = AtomicI64::new(0);
    let items = threads as i64 * ITEMS_PER_THREAD;
    let start = Instant::now();

    thread::scope(|s| {
        for t in 0..threads as i64 {
            let map = &map;
            let barrier = &barrier;
            let expected_sum = &expected_sum;
            s.spawn(move || {
                barrier.wait();
                for i in 0..ITEMS_PER_THREAD {
                    let key = t * ITEMS_PER_THREAD + i;
                    let value = (key * 31) % 1_009;
                    expected_sum.fetch_add(value, Ordering::Relaxed);
                    map.set(key, value);
                }
            });
        }
    });

    let expected = expected_sum.load(Ordering::Relaxed);
    let snapshot_sum: i64 = map.snapshot().values().sum();
    ensure!(snapshot_sum == expected, "snapshot checksum mismatch: {snapshot_sum} != {expected}");

    let lookup_sum: i64 = (0..items).filter_map(|key| map.try_get(&key)).sum();
    ensure!(lookup_sum == expected, "lookup checksum mismatch: {lookup_sum} != {expected}");

    let mut sum = 0;
    for key in 0..items {
        if key % 2 == 0 {
            map.erase(&key);
        }
        map.set(key, key);
        sum += map.try_get(&key).unwrap_or_default();
    }
    ensure!(sum == items * (items - 1) / 2, "overwrite checksum mismatch");

    info!(
        threads,
        buckets = map.capacity(),
        elapsed = ?start.elapsed(),
        "sharded map workload passed"
    );
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();

    let threads = thread_count();
    info!(threads, "Finelock stress run starting...");

    run_list(threads)?;
    run_queue(threads)?;
    run_map(threads)?;

    info!("All container workloads passed");
    Ok(())
}
