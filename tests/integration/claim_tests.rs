//! Concurrent claim tests
//!
//! Several workers with distinct identities claim from one database file at
//! the same time; every task must end up with at most one owner.

use crate::{queue_for, temp_store};
use crawl_fleet::storage::TaskStore;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

/// Runs `workers` threads that each claim up to `batch` tasks once and
/// returns the ids each of them received
fn claim_concurrently(tasks: usize, workers: usize, batch: i64) -> (Vec<Vec<i64>>, usize) {
    let (_dir, store) = temp_store();
    let submitter = queue_for(&store, "submitter");
    for i in 0..tasks {
        submitter
            .submit(&format!("http://site{}.test/", i), false)
            .expect("Submit failed");
    }

    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|w| {
            let queue = queue_for(&store, &format!("worker-{}", w));
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                queue
                    .claim(batch)
                    .expect("Claim must not be rejected")
                    .into_iter()
                    .map(|task| task.id.get())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let claims = handles
        .into_iter()
        .map(|h| h.join().expect("Worker thread panicked"))
        .collect();
    let unclaimed = store.count_tasks().expect("Count failed").unclaimed as usize;
    (claims, unclaimed)
}

#[test]
fn test_claims_do_not_overlap() {
    let (claims, unclaimed) = claim_concurrently(20, 4, 3);

    let mut seen = HashSet::new();
    for ids in &claims {
        assert!(ids.len() <= 3);
        for id in ids {
            assert!(seen.insert(*id), "task {} claimed twice", id);
        }
    }
    assert_eq!(seen.len(), 12);
    assert_eq!(unclaimed, 8);
}

#[test]
fn test_claims_cover_backlog_when_capacity_allows() {
    let (claims, unclaimed) = claim_concurrently(10, 5, 4);

    let all: HashSet<i64> = claims.iter().flatten().copied().collect();
    assert_eq!(all.len(), 10);
    assert_eq!(claims.iter().map(Vec::len).sum::<usize>(), 10);
    assert_eq!(unclaimed, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_concurrent_claims_partition_backlog(
        tasks in 0usize..24,
        workers in 1usize..5,
        batch in 0i64..6,
    ) {
        let (claims, unclaimed) = claim_concurrently(tasks, workers, batch);

        let mut seen = HashSet::new();
        for ids in &claims {
            prop_assert!(ids.len() as i64 <= batch);
            for id in ids {
                prop_assert!(seen.insert(*id));
            }
        }

        let capacity = workers * batch as usize;
        prop_assert_eq!(seen.len(), tasks.min(capacity));
        prop_assert_eq!(seen.len() + unclaimed, tasks);
    }
}
