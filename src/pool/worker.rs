//! Fixed-size worker pool.
//!
//! Workers share one [`BlockQueue`] of boxed closures. Shutdown closes the
//! queue (tasks not yet taken are dropped) and joins every worker, so a task
//! that already started always runs to completion before `shutdown` returns.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

use crate::pool::queue::{BlockQueue, PushError};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
#[error("worker pool is shut down")]
pub struct PoolClosed;

#[derive(Debug, Error)]
pub enum TrySubmitError {
    #[error("task queue is full")]
    Full,
    #[error("worker pool is shut down")]
    Closed,
}

pub struct WorkerPool {
    queue: Arc<BlockQueue<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` workers over a queue holding at most `queue_capacity`
    /// pending tasks.
    pub fn new(threads: usize, queue_capacity: usize) -> io::Result<Self> {
        assert!(threads > 0, "worker pool needs at least one thread");

        let queue: Arc<BlockQueue<Task>> = Arc::new(BlockQueue::new(queue_capacity));
        let mut workers = Vec::with_capacity(threads);

        for i in 0..threads {
            let queue = queue.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || worker_loop(&queue))?;
            workers.push(handle);
        }

        tracing::debug!(threads, queue_capacity, "Worker pool started");
        Ok(Self { queue, workers })
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Tasks waiting to be picked up.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queues `task`, blocking while the queue is at capacity.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(task)).map_err(|_| PoolClosed)
    }

    pub fn try_submit<F>(&self, task: F) -> Result<(), TrySubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.try_push(Box::new(task)).map_err(|e| match e {
            PushError::Full(_) => TrySubmitError::Full,
            PushError::Closed(_) => TrySubmitError::Closed,
        })
    }

    /// Stops accepting work, drops queued tasks and joins all workers.
    pub fn shutdown(&mut self) {
        self.queue.close();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::error!(worker = %name, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(queue: &BlockQueue<Task>) {
    while let Some(task) = queue.pop() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("Worker task panicked");
        }
    }
}
