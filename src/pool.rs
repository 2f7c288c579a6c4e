//! Partitioned worker pool for simulations
//!
//! Simulations compare many independent benchmark configurations. The pool
//! splits the keyed tasks into contiguous partitions, one per worker, and
//! every worker processes its partition sequentially.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ CALLER                                                       │
//! │   tasks: [(key, task)...] → chunks of ceil(n / workers)      │
//! └──────────────────────────────────────────────────────────────┘
//!            │ scoped threads (crossbeam::thread::scope)
//!            ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ WORKER i                                                     │
//! │   for (key, task) in chunk { tx.send((key, f(key, task))) }  │
//! └──────────────────────────────────────────────────────────────┘
//!            │ crossbeam::channel (message passing)
//!            ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ CALLER                                                       │
//! │   BTreeMap<key, result>   (keys are disjoint per worker)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers share nothing mutable. The closure only needs `Sync` so it can
//! be called from every worker by reference.

use crate::error::{PhoenixError, Result};
use crossbeam::channel;
use std::collections::BTreeMap;

/// Summary of one pool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub tasks: usize,
    pub workers_used: usize,
    pub partition_size: usize,
}

/// Run `f` over every task on `workers` threads and merge the results
///
/// # Errors
/// `Configuration` when `workers` is zero or a key appears twice; a
/// worker panic is reported as `Configuration` too, after every other
/// worker has finished.
///
/// # Example
/// ```
/// use phoenix::pool::run_partitioned;
///
/// let tasks = vec![("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)];
/// let (results, stats) = run_partitioned(tasks, 2, |_key, n| n * 10).unwrap();
/// assert_eq!(results["b"], 20);
/// assert_eq!(stats.workers_used, 2);
/// ```
pub fn run_partitioned<K, T, R, F>(
    tasks: Vec<(K, T)>,
    workers: usize,
    f: F,
) -> Result<(BTreeMap<K, R>, PoolStats)>
where
    K: Ord + Clone + Send,
    T: Send,
    R: Send,
    F: Fn(&K, T) -> R + Sync,
{
    if workers == 0 {
        return Err(PhoenixError::config("worker count must be positive"));
    }

    let task_count = tasks.len();
    {
        let mut seen = std::collections::BTreeSet::new();
        if !tasks.iter().all(|(key, _)| seen.insert(key)) {
            return Err(PhoenixError::config("task keys must be unique"));
        }
    }

    let partition_size = task_count.div_ceil(workers).max(1);
    let mut partitions: Vec<Vec<(K, T)>> = Vec::new();
    let mut iter = tasks.into_iter().peekable();
    while iter.peek().is_some() {
        partitions.push(iter.by_ref().take(partition_size).collect());
    }
    let workers_used = partitions.len();

    let (tx, rx) = channel::unbounded::<(K, R)>();
    let f = &f;

    let scope_result = crossbeam::thread::scope(|scope| {
        for (index, partition) in partitions.into_iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                tracing::debug!(worker = index, tasks = partition.len(), "worker started");
                for (key, task) in partition {
                    let result = f(&key, task);
                    if tx.send((key, result)).is_err() {
                        tracing::warn!(worker = index, "result channel closed");
                        return;
                    }
                }
            });
        }
    });
    drop(tx);

    if scope_result.is_err() {
        return Err(PhoenixError::config("a worker thread panicked"));
    }

    let results: BTreeMap<K, R> = rx.into_iter().collect();

    Ok((
        results,
        PoolStats {
            tasks: task_count,
            workers_used,
            partition_size,
        },
    ))
}
