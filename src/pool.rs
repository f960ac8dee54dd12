//! Shared Bounded Worker Pool
//!
//! One semaphore-backed pool, sized once from configuration, is injected
//! into every fan-out component (verification, graph extraction,
//! retrieval). All of the fanned-out work is I/O-bound, so the pool
//! bounds total concurrent external calls system-wide rather than
//! per-component.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

pub type SharedPool = Arc<WorkerPool>;

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> SharedPool {
        let size = size.max(1);
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    /// Configured concurrency, used by callers to size their local
    /// stream buffers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run a future under one pool permit.
    pub async fn run<F, T>(&self, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquisition only ever waits
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed");
        fut.await
    }
}
