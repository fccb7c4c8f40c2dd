use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Ordered job queue populated fully before draining begins.
///
/// `enqueue` requires exclusive access and the worker pool consumes the
/// queue by value, so the queue is closed for writes once draining starts.
#[derive(Debug, Default)]
pub struct JobQueue<T> {
    items: VecDeque<T>,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append a job in discovery order.
    pub fn enqueue(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Seal the queue into a cloneable handle workers drain concurrently.
    pub fn into_shared(self) -> SharedQueue<T> {
        SharedQueue {
            inner: Arc::new(Mutex::new(self.items)),
        }
    }
}

impl<T> FromIterator<T> for JobQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Drain-only handle shared between workers. Concurrent `try_take` calls
/// never hand out the same item twice and never lose one.
#[derive(Debug)]
pub struct SharedQueue<T> {
    inner: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedQueue<T> {
    /// Remove and return the next job, or `None` once the queue is exhausted.
    pub async fn try_take(&self) -> Option<T> {
        self.inner.lock().await.pop_front()
    }
}
