use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::queue::JobQueue;

/// Fixed-size pool of concurrent workers draining a pre-populated queue.
///
/// Each worker loops "take one job or exit" until the queue is empty or the
/// shared cancellation flag is set. `run` returns only after every worker has
/// exited. A failing job is logged and never aborts the pool; cancellation is
/// cooperative and lets in-flight jobs finish.
pub struct WorkerPool {
    size: usize,
    cancel: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self::with_cancel_flag(size, Arc::new(AtomicBool::new(false)))
    }

    /// Pool sharing an externally owned cancellation flag, so an orchestrator
    /// can stop several sequential pools with one interrupt.
    pub fn with_cancel_flag(size: usize, cancel: Arc<AtomicBool>) -> Self {
        Self {
            size: size.max(1),
            cancel,
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Drain `queue`, invoking `handler` once per job with bounded
    /// parallelism. No ordering is guaranteed between jobs.
    pub async fn run<T, H, Fut>(&self, queue: JobQueue<T>, label: &str, handler: H)
    where
        T: Send + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let total = queue.len();
        if total == 0 {
            debug!("No {} jobs queued, skipping", label);
            return;
        }

        let shared = queue.into_shared();
        let handler = Arc::new(handler);
        let bar = ProgressBar::new(total as u64);
        bar.set_message(label.to_string());

        let mut workers = JoinSet::new();
        for worker_id in 0..self.size {
            let queue = shared.clone();
            let handler = Arc::clone(&handler);
            let cancel = Arc::clone(&self.cancel);
            let bar = bar.clone();
            let label = label.to_string();

            workers.spawn(async move {
                loop {
                    if cancel.load(Ordering::Relaxed) {
                        debug!("{} worker {} observed cancellation, exiting", label, worker_id);
                        break;
                    }
                    let Some(job) = queue.try_take().await else {
                        debug!("{} worker {} found queue empty, exiting", label, worker_id);
                        break;
                    };
                    if let Err(e) = handler(job).await {
                        error!("{} job failed: {:#}", label, e);
                    }
                    bar.inc(1);
                }
            });
        }

        // Join barrier: the pool is done only when every worker has exited.
        while workers.join_next().await.is_some() {}
        bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[tokio::test]
    async fn every_job_handled_exactly_once_for_any_pool_size() {
        for size in 1..=6 {
            let queue: JobQueue<usize> = (0..50).collect();
            let seen = Arc::new(Mutex::new(Vec::new()));

            let pool = WorkerPool::new(size);
            let sink = Arc::clone(&seen);
            pool.run(queue, "test", move |job| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(job);
                    Ok(())
                }
            })
            .await;

            let taken = seen.lock().unwrap();
            assert_eq!(taken.len(), 50, "pool size {size}");
            let unique: HashSet<_> = taken.iter().collect();
            assert_eq!(unique.len(), 50, "pool size {size}");
        }
    }

    #[tokio::test]
    async fn failing_jobs_do_not_halt_the_pool() {
        let queue: JobQueue<usize> = (0..10).collect();
        let handled = Arc::new(Mutex::new(0usize));

        let pool = WorkerPool::new(3);
        let count = Arc::clone(&handled);
        pool.run(queue, "test", move |job| {
            let count = Arc::clone(&count);
            async move {
                *count.lock().unwrap() += 1;
                if job % 2 == 0 {
                    anyhow::bail!("simulated encoder failure");
                }
                Ok(())
            }
        })
        .await;

        assert_eq!(*handled.lock().unwrap(), 10);
    }

    #[tokio::test]
    async fn cancellation_prevents_new_jobs() {
        let queue: JobQueue<usize> = (0..100).collect();
        let pool = WorkerPool::new(1);
        let cancel = pool.cancel_flag();
        let handled = Arc::new(Mutex::new(0usize));

        let count = Arc::clone(&handled);
        pool.run(queue, "test", move |_job| {
            let count = Arc::clone(&count);
            let cancel = Arc::clone(&cancel);
            async move {
                let mut n = count.lock().unwrap();
                *n += 1;
                if *n == 5 {
                    cancel.store(true, Ordering::Relaxed);
                }
                Ok(())
            }
        })
        .await;

        // The in-flight job finishes, nothing new is started afterwards.
        assert_eq!(*handled.lock().unwrap(), 5);
    }
}
