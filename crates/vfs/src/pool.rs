use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use rayon::prelude::*;
use std::num::NonZeroUsize;

/// A bounded pool of worker threads for hashing and extraction.
///
/// Nested calls from inside a worker run on the same pool rather than
/// spawning more threads, so recursive archive expansion stays bounded.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: NonZeroUsize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.get())
            .thread_name(|index| format!("hoard-worker-{index}"))
            .build()
            .or_raise(|| ErrorKind::Pool)?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Apply `work` to every item in parallel, results in input order.
    pub fn parallel_map<T, R, F>(&self, items: &[T], work: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(work).collect())
    }

    /// Apply `work` to every item in parallel, stopping at the first error.
    pub fn try_for_each<T, F>(&self, items: &[T], work: F) -> Result<()>
    where
        T: Sync,
        F: Fn(&T) -> Result<()> + Sync + Send,
    {
        self.pool.install(|| items.par_iter().try_for_each(work))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::new(NonZeroUsize::new(workers).unwrap()).unwrap()
    }

    #[test]
    fn test_parallel_map_keeps_order() {
        let items: Vec<u64> = (0..1000).collect();
        let doubled = pool(4).parallel_map(&items, |n| n * 2);
        assert_eq!(doubled, items.iter().map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(pool(3).workers(), 3);
    }

    #[test]
    fn test_try_for_each_reports_failure() {
        let seen = AtomicUsize::new(0);
        let items: Vec<u32> = (0..10).collect();
        let err = pool(2)
            .try_for_each(&items, |n| {
                seen.fetch_add(1, Ordering::Relaxed);
                match *n == 7 {
                    true => exn::bail!(ErrorKind::NotFound(n.to_string())),
                    false => Ok(()),
                }
            })
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(n) if n == "7"));
        assert!(seen.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn test_nested_use_does_not_deadlock() {
        let pool = pool(1);
        let outer: Vec<u32> = (0..4).collect();
        let sums = pool.parallel_map(&outer, |n| {
            let inner: Vec<u32> = (0..*n).collect();
            pool.parallel_map(&inner, |m| m + 1).into_iter().sum::<u32>()
        });
        assert_eq!(sums, vec![0, 1, 3, 6]);
    }
}
