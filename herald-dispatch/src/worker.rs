//! Bounded worker pools.
//!
//! Each worker owns a bounded mpsc channel and runs a single main loop:
//! receive a job, process it with panic isolation, tick a maintenance timer.
//! Jobs are FIFO within one worker; nothing is promised across workers. A
//! janitor task per pool runs the retry sweep and logs queue utilization so
//! sweeps are never duplicated across workers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use herald_common::{Channel, DomainError, Signal};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ChannelConfig;

/// The work a pool executes, plus its periodic duties.
#[async_trait]
pub trait WorkProcessor: Send + Sync + 'static {
    type Job: Send + 'static;

    /// Process one job. Failures are the processor's to record; the pool
    /// only isolates panics.
    async fn process(&self, worker_id: usize, job: Self::Job);

    /// Per-worker maintenance tick.
    async fn maintenance(&self, worker_id: usize) {
        let _ = worker_id;
    }

    /// Pool-wide retry sweep, run by the janitor.
    async fn retry_sweep(&self) {}
}

/// Timing and sizing knobs for a pool, derived from the channel config.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub processing_delay: Duration,
    pub maintenance_interval: Duration,
    pub retry_sweep_interval: Duration,
    pub enqueue_timeout: Duration,
}

impl WorkerPoolConfig {
    /// Derive pool settings from a channel configuration.
    #[must_use]
    pub fn from_channel(config: &ChannelConfig, channel: Channel) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.capacity(channel),
            processing_delay: config.processing_delay(),
            maintenance_interval: config.maintenance_interval(),
            retry_sweep_interval: config.retry_sweep_interval(),
            enqueue_timeout: config.enqueue_timeout(),
        }
    }
}

/// A fixed-size pool of workers plus one janitor task.
pub struct WorkerPool<P: WorkProcessor> {
    senders: Vec<mpsc::Sender<P::Job>>,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    next: AtomicUsize,
    stopping: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    enqueue_timeout: Duration,
}

impl<P: WorkProcessor> WorkerPool<P> {
    /// Spawn the workers and the janitor.
    ///
    /// Workers exit when `shutdown` broadcasts or their channel closes.
    #[must_use]
    pub fn start(
        config: &WorkerPoolConfig,
        processor: Arc<P>,
        shutdown: &broadcast::Sender<Signal>,
    ) -> Self {
        let stopping = Arc::new(AtomicBool::new(false));
        let processed = Arc::new(AtomicU64::new(0));

        let mut senders = Vec::with_capacity(config.workers);
        let mut handles = Vec::with_capacity(config.workers + 1);

        for worker_id in 0..config.workers {
            let (sender, receiver) = mpsc::channel(config.queue_capacity);
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                receiver,
                Arc::clone(&processor),
                config.clone(),
                shutdown.subscribe(),
                Arc::clone(&processed),
            )));
            senders.push(sender);
        }

        handles.push(tokio::spawn(janitor_loop(
            Arc::clone(&processor),
            config.clone(),
            shutdown.subscribe(),
            senders.clone(),
        )));

        info!(workers = config.workers, "Worker pool started");

        Self {
            senders,
            handles: parking_lot::Mutex::new(handles),
            next: AtomicUsize::new(0),
            stopping,
            processed,
            enqueue_timeout: config.enqueue_timeout,
        }
    }

    /// Enqueue a job, blocking up to the enqueue timeout for a slot.
    ///
    /// # Errors
    /// `Dependency` ("queue full") when no worker frees a slot in time, or
    /// when the pool is stopping.
    pub async fn enqueue(&self, job: P::Job) -> Result<(), DomainError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(DomainError::dependency("worker pool is stopping"));
        }

        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.senders[index]
            .send_timeout(job, self.enqueue_timeout)
            .await
            .map_err(|_| DomainError::dependency("queue full"))
    }

    /// Jobs completed across all workers.
    #[must_use]
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Jobs currently buffered across all worker queues.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.senders
            .iter()
            .map(|sender| sender.max_capacity() - sender.capacity())
            .sum()
    }

    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Wait for workers to finish after a shutdown broadcast, aborting any
    /// that outlive the grace window.
    pub async fn join(&self, grace: Duration) {
        self.stopping.store(true, Ordering::SeqCst);

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(grace, futures_util::future::join_all(handles))
            .await
            .is_err()
        {
            warn!("Shutdown grace exceeded, aborting remaining workers");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

impl<P: WorkProcessor> std::fmt::Debug for WorkerPool<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.senders.len())
            .field("queued", &self.queued_len())
            .field("processed", &self.processed_count())
            .finish()
    }
}

async fn worker_loop<P: WorkProcessor>(
    worker_id: usize,
    mut receiver: mpsc::Receiver<P::Job>,
    processor: Arc<P>,
    config: WorkerPoolConfig,
    mut shutdown: broadcast::Receiver<Signal>,
    processed: Arc<AtomicU64>,
) {
    let mut maintenance = tokio::time::interval(config.maintenance_interval);
    maintenance.tick().await;

    debug!(worker_id, "Worker started");

    loop {
        tokio::select! {
            sig = shutdown.recv() => {
                match sig {
                    Ok(Signal::Shutdown | Signal::Finalised) | Err(_) => {
                        debug!(worker_id, "Worker received shutdown");
                        break;
                    }
                }
            }
            maybe = receiver.recv() => {
                let Some(job) = maybe else { break };

                // Panic isolation: a panicking job takes down its task, not
                // the worker loop
                let task = tokio::spawn({
                    let processor = Arc::clone(&processor);
                    async move { processor.process(worker_id, job).await }
                });
                match task.await {
                    Ok(()) => {}
                    Err(join_error) if join_error.is_panic() => {
                        error!(worker_id, "Job panicked; worker continuing");
                    }
                    Err(_) => {}
                }

                processed.fetch_add(1, Ordering::SeqCst);

                if !config.processing_delay.is_zero() {
                    tokio::time::sleep(config.processing_delay).await;
                }
            }
            _ = maintenance.tick() => {
                processor.maintenance(worker_id).await;
            }
        }
    }

    debug!(worker_id, "Worker stopped");
}

async fn janitor_loop<P: WorkProcessor>(
    processor: Arc<P>,
    config: WorkerPoolConfig,
    mut shutdown: broadcast::Receiver<Signal>,
    senders: Vec<mpsc::Sender<P::Job>>,
) {
    // Initial sweep picks up work left failed by a previous run
    processor.retry_sweep().await;

    let mut sweep = tokio::time::interval(config.retry_sweep_interval);
    let mut utilization = tokio::time::interval(config.maintenance_interval);
    sweep.tick().await;
    utilization.tick().await;

    loop {
        tokio::select! {
            sig = shutdown.recv() => {
                match sig {
                    Ok(Signal::Shutdown | Signal::Finalised) | Err(_) => break,
                }
            }
            _ = sweep.tick() => {
                processor.retry_sweep().await;
            }
            _ = utilization.tick() => {
                let queued: usize = senders
                    .iter()
                    .map(|sender| sender.max_capacity() - sender.capacity())
                    .sum();
                let capacity: usize = senders.iter().map(mpsc::Sender::max_capacity).sum();
                debug!(queued, capacity, "Worker queue utilization");
            }
        }
    }

    debug!("Janitor stopped");
}
