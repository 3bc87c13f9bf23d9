//! Long-lived worker pool.
//!
//! A fixed number of worker tasks pull jobs from one bounded queue. The pool
//! is created once and reused by every dispatch call; each submitted job
//! hands its result back through a [`PoolTask`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

type PoolJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Queued jobs per worker before `submit` starts waiting.
const QUEUE_DEPTH_PER_WORKER: usize = 64;

/// Errors returned by the worker pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The pool no longer accepts jobs.
    #[error("worker pool is shut down")]
    Closed,

    /// The job ended without producing a result (it panicked or was dropped).
    #[error("pool job ended without a result")]
    Lost,
}

/// Handle to the result of a submitted job.
#[derive(Debug)]
pub struct PoolTask<T> {
    result: oneshot::Receiver<T>,
}

impl<T> PoolTask<T> {
    /// Wait for the job to finish.
    pub async fn join(self) -> Result<T, PoolError> {
        self.result.await.map_err(|_| PoolError::Lost)
    }
}

/// A bounded pool of tokio worker tasks fed by an mpsc queue.
#[derive(Debug)]
pub struct WorkerPool {
    sender: mpsc::Sender<PoolJob>,
    workers: Vec<JoinHandle<()>>,
    submitted: AtomicUsize,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one). Must be called inside a tokio runtime.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<PoolJob>(size * QUEUE_DEPTH_PER_WORKER);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|worker| tokio::spawn(worker_loop(worker, Arc::clone(&receiver))))
            .collect();

        tracing::debug!(workers = size, "worker pool started");

        Self {
            sender,
            workers,
            submitted: AtomicUsize::new(0),
        }
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Total number of jobs accepted since the pool was created.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Queue a job. Waits while the queue is full.
    pub async fn submit<F, T>(&self, fut: F) -> Result<PoolTask<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: PoolJob = Box::pin(async move {
            // The caller may have stopped waiting.
            let _ = tx.send(fut.await);
        });

        self.sender.send(job).await.map_err(|_| PoolError::Closed)?;
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(PoolTask { result: rx })
    }

    /// Stop accepting jobs, drain the queue and wait for every worker to exit.
    pub async fn shutdown(self) {
        let Self {
            sender, workers, ..
        } = self;
        drop(sender);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "worker exited abnormally");
            }
        }
    }
}

async fn worker_loop(worker: usize, receiver: Arc<Mutex<mpsc::Receiver<PoolJob>>>) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        // Run on its own task so a panicking job does not take the worker down.
        if let Err(e) = tokio::spawn(job).await {
            tracing::error!(worker, error = %e, "pool job panicked");
        }
    }
    tracing::trace!(worker, "worker stopped");
}
