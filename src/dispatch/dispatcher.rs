//! Adaptive batch dispatcher.
//!
//! Small batches run one item at a time, each as its own pool job. Larger
//! batches are split into contiguous chunks, one per worker, where the worker
//! count depends on the current system load. `dispatch_with_retry` runs every
//! item as its own job with a retry policy.
//!
//! Every call waits at most `wait_timeout`. Items still unfinished when the
//! wait expires are abandoned: the call's cancellation token is cancelled,
//! their ids are logged, and any result they produce afterwards is discarded.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::load::{LoadProbe, SystemLoad, available_cores};
use super::pool::{PoolTask, WorkerPool};
use crate::core::retry::RetryPolicy;
use crate::core::types::ItemId;
use crate::core::unit::{WorkError, WorkOutput, WorkUnit};

/// Batches smaller than this run item by item.
pub const DEFAULT_SMALL_THRESHOLD: usize = 10;

/// Load at or above which only one worker is used.
pub const DEFAULT_LOAD_CEILING: f64 = 1.0;

/// Default bound on how long a dispatch call waits for its items.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem<T> {
    /// Identifier used in logs and abandonment reports.
    pub id: ItemId,
    /// Data handed to the processor.
    pub payload: T,
}

impl<T> WorkItem<T> {
    /// Create a work item.
    pub fn new(id: impl Into<ItemId>, payload: T) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Wrap payloads as items with positional ids (`item-0`, `item-1`, ...).
    pub fn batch(payloads: impl IntoIterator<Item = T>) -> Vec<Self> {
        payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| Self::new(i, payload))
            .collect()
    }
}

/// The work performed on each dispatched item.
#[async_trait]
pub trait ItemProcessor<T: Send + Sync, O: Send>: Send + Sync {
    /// Process one item.
    async fn process(&self, item: &WorkItem<T>) -> Result<O, WorkError>;
}

/// Reference processor: upper-cases string payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uppercase;

#[async_trait]
impl ItemProcessor<String, String> for Uppercase {
    async fn process(&self, item: &WorkItem<String>) -> Result<String, WorkError> {
        Ok(item.payload.to_uppercase())
    }
}

/// Runs work units carried as item payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitProcessor;

#[async_trait]
impl ItemProcessor<Arc<dyn WorkUnit>, WorkOutput> for UnitProcessor {
    async fn process(&self, item: &WorkItem<Arc<dyn WorkUnit>>) -> Result<WorkOutput, WorkError> {
        item.payload.run().await
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Batches with fewer items run item by item.
    pub small_threshold: usize,
    /// Two workers are used only while load is below this value.
    pub load_ceiling: f64,
    /// Retry policy for `retry` and `dispatch_with_retry`.
    pub retry: RetryPolicy,
    /// Bound on how long one dispatch call waits.
    pub wait_timeout: Duration,
    /// Number of pool workers.
    pub pool_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            small_threshold: DEFAULT_SMALL_THRESHOLD,
            load_ceiling: DEFAULT_LOAD_CEILING,
            retry: RetryPolicy::default(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            pool_size: available_cores(),
        }
    }
}

impl DispatcherConfig {
    /// Builder: set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: set the wait bound.
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Builder: set the pool size. Capped at the available cores.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.clamp(1, available_cores());
        self
    }
}

/// Detailed report of one dispatch call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome<O> {
    /// Successful outputs. Failed and abandoned items are absent.
    pub outputs: Vec<O>,
    /// Workers the batch was spread over.
    pub workers: usize,
    /// Number of items given to each worker.
    pub chunk_sizes: Vec<usize>,
    /// Items that had not finished when the wait expired.
    pub abandoned: Vec<ItemId>,
}

impl<O> DispatchOutcome<O> {
    fn empty() -> Self {
        Self {
            outputs: Vec::new(),
            workers: 0,
            chunk_sizes: Vec::new(),
            abandoned: Vec::new(),
        }
    }
}

/// Split `items` into `workers` contiguous chunks of `len / workers` items;
/// the last chunk also takes the remainder.
///
/// The worker count is clamped to `1..=len` so no chunk is empty.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, items.len());
    let chunk_size = items.len() / workers;

    let mut chunks = Vec::with_capacity(workers);
    let mut rest = items.into_iter();
    for _ in 0..workers - 1 {
        chunks.push(rest.by_ref().take(chunk_size).collect());
    }
    chunks.push(rest.collect());
    chunks
}

/// Run the processor on one item, logging the outcome.
async fn process_item<T, O>(processor: &dyn ItemProcessor<T, O>, item: &WorkItem<T>) -> Option<O>
where
    T: Send + Sync,
    O: Send,
{
    let started = Instant::now();
    match processor.process(item).await {
        Ok(output) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            info!(item_id = %item.id, elapsed_ms, "item processed");
            Some(output)
        }
        Err(e) => {
            warn!(item_id = %item.id, error = %e, "item failed");
            None
        }
    }
}

/// Run the processor on one item up to `policy.max_attempts` times, pausing
/// `policy.delay` between attempts.
async fn retry_item<T, O>(
    processor: &dyn ItemProcessor<T, O>,
    item: &WorkItem<T>,
    policy: &RetryPolicy,
) -> Option<O>
where
    T: Send + Sync,
    O: Send,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match processor.process(item).await {
            Ok(output) => {
                debug!(item_id = %item.id, attempts, "item succeeded");
                return Some(output);
            }
            Err(e) if policy.should_retry(attempts, &e) => {
                debug!(item_id = %item.id, attempt = attempts, error = %e, "item failed, retrying");
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                warn!(item_id = %item.id, attempts, error = %e, "item failed after all attempts");
                return None;
            }
        }
    }
}

/// Results shared between the pool jobs of one call.
///
/// Every push happens under the lock after checking the token, so once the
/// dispatcher cancels while holding the lock no late result can slip in.
struct Collector<O> {
    outputs: Mutex<Vec<O>>,
    token: CancellationToken,
}

impl<O> Collector<O> {
    fn new(capacity: usize) -> Self {
        Self {
            outputs: Mutex::new(Vec::with_capacity(capacity)),
            token: CancellationToken::new(),
        }
    }

    /// Record one finished item. Returns false once the call was abandoned.
    async fn record(&self, output: Option<O>, progress: &AtomicUsize) -> bool {
        let mut outputs = self.outputs.lock().await;
        if self.token.is_cancelled() {
            return false;
        }
        outputs.extend(output);
        progress.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Stop accepting results and hand back what was collected.
    async fn close(&self) -> Vec<O> {
        let mut outputs = self.outputs.lock().await;
        self.token.cancel();
        std::mem::take(&mut *outputs)
    }
}

/// A chunk in flight: its pool task, how many items it finished, its ids.
struct ChunkRun {
    task: Option<PoolTask<()>>,
    progress: Arc<AtomicUsize>,
    ids: Vec<ItemId>,
}

impl ChunkRun {
    fn unfinished(&self) -> &[ItemId] {
        let done = self.progress.load(Ordering::SeqCst).min(self.ids.len());
        &self.ids[done..]
    }
}

/// Adaptive dispatcher owning a long-lived worker pool.
pub struct Dispatcher {
    config: DispatcherConfig,
    probe: Arc<dyn LoadProbe>,
    pool: WorkerPool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher and start its pool. Must be called inside a tokio runtime.
    pub fn new(config: DispatcherConfig, probe: Arc<dyn LoadProbe>) -> Self {
        let pool = WorkerPool::new(config.pool_size);
        Self {
            config,
            probe,
            pool,
        }
    }

    /// Dispatcher with default tuning probing the host's load.
    pub fn with_system_load() -> Self {
        Self::new(DispatcherConfig::default(), Arc::new(SystemLoad::new()))
    }

    /// Get the configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Get the worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Stop the pool once queued work has drained.
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }

    /// Workers to use for a batch of `item_count` items: two while the load
    /// is below the ceiling and the batch exceeds the small threshold, else one.
    pub fn adjust_worker_count(&self, item_count: usize) -> usize {
        let load = self.probe.current_load();
        let workers = if load < self.config.load_ceiling
            && item_count > self.config.small_threshold
        {
            2
        } else {
            1
        };
        debug!(item_count, load, workers, "worker count chosen");
        workers
    }

    /// Process a batch and return the successful outputs.
    ///
    /// Output order follows input order for small batches only.
    pub async fn dispatch<T, O>(
        &self,
        processor: Arc<dyn ItemProcessor<T, O>>,
        items: Vec<WorkItem<T>>,
    ) -> Vec<O>
    where
        T: Send + Sync + 'static,
        O: Send + 'static,
    {
        self.dispatch_detailed(processor, items).await.outputs
    }

    /// Like [`dispatch`](Self::dispatch), also reporting how the batch was split.
    pub async fn dispatch_detailed<T, O>(
        &self,
        processor: Arc<dyn ItemProcessor<T, O>>,
        items: Vec<WorkItem<T>>,
    ) -> DispatchOutcome<O>
    where
        T: Send + Sync + 'static,
        O: Send + 'static,
    {
        if items.is_empty() {
            return DispatchOutcome::empty();
        }

        let deadline = tokio::time::Instant::now() + self.config.wait_timeout;
        let collector = Arc::new(Collector::new(items.len()));

        let (workers, runs) = if items.len() < self.config.small_threshold {
            let runs = self
                .run_isolated(&processor, items, &collector, deadline)
                .await;
            (runs.len(), runs)
        } else {
            let workers = self.adjust_worker_count(items.len());
            let mut runs = Vec::with_capacity(workers);
            for (worker, chunk) in partition(items, workers).into_iter().enumerate() {
                runs.push(self.submit_chunk(worker, &processor, chunk, &collector).await);
            }
            await_runs(&mut runs, deadline).await;
            (runs.len(), runs)
        };

        let outputs = collector.close().await;
        let abandoned = report_abandoned(&runs);
        DispatchOutcome {
            outputs,
            workers,
            chunk_sizes: runs.iter().map(|run| run.ids.len()).collect(),
            abandoned,
        }
    }

    /// Run `item` with the configured retry policy on the calling task.
    pub async fn retry<T, O>(
        &self,
        processor: &dyn ItemProcessor<T, O>,
        item: &WorkItem<T>,
    ) -> Option<O>
    where
        T: Send + Sync,
        O: Send,
    {
        retry_item(processor, item, &self.config.retry).await
    }

    /// Run every item as its own pool job with retries. Results keep input
    /// order; items that exhaust their attempts are absent.
    pub async fn dispatch_with_retry<T, O>(
        &self,
        processor: Arc<dyn ItemProcessor<T, O>>,
        items: Vec<WorkItem<T>>,
    ) -> Vec<O>
    where
        T: Send + Sync + 'static,
        O: Send + 'static,
    {
        self.dispatch_with_retry_detailed(processor, items)
            .await
            .outputs
    }

    /// Like [`dispatch_with_retry`](Self::dispatch_with_retry), with a report.
    pub async fn dispatch_with_retry_detailed<T, O>(
        &self,
        processor: Arc<dyn ItemProcessor<T, O>>,
        items: Vec<WorkItem<T>>,
    ) -> DispatchOutcome<O>
    where
        T: Send + Sync + 'static,
        O: Send + 'static,
    {
        if items.is_empty() {
            return DispatchOutcome::empty();
        }

        let deadline = tokio::time::Instant::now() + self.config.wait_timeout;
        let workers = items.len().min(self.pool.size());
        // One slot per item keeps results in input order.
        let collector = Arc::new(Collector::<(usize, O)>::new(items.len()));

        let mut runs = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let progress = Arc::new(AtomicUsize::new(0));
            let ids = vec![item.id.clone()];
            let job = {
                let processor = Arc::clone(&processor);
                let collector = Arc::clone(&collector);
                let progress = Arc::clone(&progress);
                let policy = self.config.retry.clone();
                async move {
                    let output = tokio::select! {
                        _ = collector.token.cancelled() => return,
                        output = retry_item(processor.as_ref(), &item, &policy) => output,
                    };
                    collector
                        .record(output.map(|o| (index, o)), &progress)
                        .await;
                }
            };
            let task = self.submit_logged(job).await;
            runs.push(ChunkRun {
                task,
                progress,
                ids,
            });
        }
        await_runs(&mut runs, deadline).await;

        let mut indexed = collector.close().await;
        indexed.sort_by_key(|(index, _)| *index);
        let abandoned = report_abandoned(&runs);
        DispatchOutcome {
            outputs: indexed.into_iter().map(|(_, output)| output).collect(),
            workers,
            chunk_sizes: vec![1; runs.len()],
            abandoned,
        }
    }

    /// Small-batch path: one pool job per item, each awaited before the next.
    async fn run_isolated<T, O>(
        &self,
        processor: &Arc<dyn ItemProcessor<T, O>>,
        items: Vec<WorkItem<T>>,
        collector: &Arc<Collector<O>>,
        deadline: tokio::time::Instant,
    ) -> Vec<ChunkRun>
    where
        T: Send + Sync + 'static,
        O: Send + 'static,
    {
        let mut runs: Vec<ChunkRun> = Vec::with_capacity(items.len());
        let mut expired = false;
        for (index, item) in items.into_iter().enumerate() {
            if expired {
                runs.push(ChunkRun {
                    task: None,
                    progress: Arc::new(AtomicUsize::new(0)),
                    ids: vec![item.id],
                });
                continue;
            }
            let mut run = self
                .submit_chunk(index, processor, vec![item], collector)
                .await;
            expired = !await_run(&mut run, deadline).await;
            runs.push(run);
        }
        runs
    }

    /// Submit one chunk job that processes its items in order.
    async fn submit_chunk<T, O>(
        &self,
        worker: usize,
        processor: &Arc<dyn ItemProcessor<T, O>>,
        chunk: Vec<WorkItem<T>>,
        collector: &Arc<Collector<O>>,
    ) -> ChunkRun
    where
        T: Send + Sync + 'static,
        O: Send + 'static,
    {
        let progress = Arc::new(AtomicUsize::new(0));
        let ids = chunk.iter().map(|item| item.id.clone()).collect();
        let job = {
            let processor = Arc::clone(processor);
            let collector = Arc::clone(collector);
            let progress = Arc::clone(&progress);
            async move {
                debug!(worker, items = chunk.len(), "chunk started");
                for item in &chunk {
                    let output = tokio::select! {
                        _ = collector.token.cancelled() => return,
                        output = process_item(processor.as_ref(), item) => output,
                    };
                    if !collector.record(output, &progress).await {
                        return;
                    }
                }
                debug!(worker, "chunk finished");
            }
        };
        let task = self.submit_logged(job).await;
        ChunkRun {
            task,
            progress,
            ids,
        }
    }

    async fn submit_logged<F>(&self, job: F) -> Option<PoolTask<()>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match self.pool.submit(job).await {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(error = %e, "could not submit dispatch job");
                None
            }
        }
    }
}

/// Wait for one run until `deadline`. Returns false if the deadline passed.
async fn await_run(run: &mut ChunkRun, deadline: tokio::time::Instant) -> bool {
    let Some(task) = run.task.take() else {
        return true;
    };
    match tokio::time::timeout_at(deadline, task.join()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, items = ?run.unfinished(), "dispatch job lost");
            true
        }
        Err(_) => false,
    }
}

/// Wait for all runs, stopping at the first expiry of `deadline`.
async fn await_runs(runs: &mut [ChunkRun], deadline: tokio::time::Instant) {
    for run in runs.iter_mut() {
        if !await_run(run, deadline).await {
            break;
        }
    }
}

fn report_abandoned(runs: &[ChunkRun]) -> Vec<ItemId> {
    let abandoned: Vec<ItemId> = runs
        .iter()
        .flat_map(|run| run.unfinished().iter().cloned())
        .collect();
    if !abandoned.is_empty() {
        let ids: Vec<&str> = abandoned.iter().map(ItemId::as_str).collect();
        warn!(
            count = abandoned.len(),
            items = ?ids,
            "dispatch wait expired, abandoning unfinished items"
        );
    }
    abandoned
}
