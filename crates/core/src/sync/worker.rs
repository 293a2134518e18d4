//! Bounded worker pool running sync jobs.
//!
//! `start_sync` enqueues a job and returns; a fixed set of workers drain the
//! queue. Each job runs in its own spawned task so a panic ends only that
//! job, and the task it was driving is marked failed.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::orchestrator::SyncEngine;
use super::{SyncError, SyncRequest, SyncStatus, SyncTask};

/// Message for tasks whose job panicked.
pub const WORKER_PANIC_MESSAGE: &str = "sync worker panicked";

/// A queued sync: the pending task plus the request that created it.
pub(crate) struct SyncJob {
    pub task: SyncTask,
    pub request: SyncRequest,
}

/// Statistics for the pool.
#[derive(Debug, Default)]
struct PoolStats {
    active: AtomicUsize,
    queued: AtomicUsize,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

/// Snapshot of the pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub workers: usize,
    pub active_jobs: usize,
    pub queued_jobs: usize,
    pub total_processed: u64,
    /// Jobs that ended `failed`, including panics.
    pub total_failed: u64,
}

/// Fixed-size pool of sync workers fed by a bounded queue.
pub struct SyncWorkerPool {
    sender: Option<mpsc::Sender<SyncJob>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<PoolStats>,
    size: usize,
}

impl SyncWorkerPool {
    /// Spawn `workers` workers. Must be called inside a Tokio runtime.
    pub(crate) fn spawn(engine: Arc<SyncEngine>, workers: usize, queue_capacity: usize) -> Self {
        let size = workers.max(1);
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(PoolStats::default());

        let workers = (0..size)
            .map(|worker_id| {
                let engine = Arc::clone(&engine);
                let receiver = Arc::clone(&receiver);
                let stats = Arc::clone(&stats);
                tokio::spawn(async move {
                    worker_loop(worker_id, engine, receiver, stats).await;
                })
            })
            .collect();

        info!("Started sync worker pool with {} workers", size);

        Self {
            sender: Some(sender),
            workers,
            stats,
            size,
        }
    }

    /// Enqueue a job, waiting for queue space if it is full.
    pub(crate) async fn submit(&self, job: SyncJob) -> Result<(), SyncError> {
        let sender = self.sender.as_ref().ok_or(SyncError::QueueClosed)?;
        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        sender.send(job).await.map_err(|_| {
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
            SyncError::QueueClosed
        })
    }

    /// Current pool statistics.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            workers: self.size,
            active_jobs: self.stats.active.load(Ordering::Relaxed),
            queued_jobs: self.stats.queued.load(Ordering::Relaxed),
            total_processed: self.stats.total_processed.load(Ordering::Relaxed),
            total_failed: self.stats.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting jobs, let the workers drain the queue, and wait for
    /// them to exit.
    pub async fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        info!("Shutting down sync worker pool");

        let results = futures::future::join_all(self.workers.drain(..)).await;
        for result in results {
            if let Err(e) = result {
                error!("Sync worker exited abnormally: {}", e);
            }
        }

        info!("Sync worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    engine: Arc<SyncEngine>,
    receiver: Arc<Mutex<mpsc::Receiver<SyncJob>>>,
    stats: Arc<PoolStats>,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            debug!("Sync worker {} stopping, queue closed", worker_id);
            break;
        };

        stats.queued.fetch_sub(1, Ordering::Relaxed);
        stats.active.fetch_add(1, Ordering::Relaxed);

        let task_id = job.task.id.clone();
        debug!("Sync worker {} picked up task {}", worker_id, task_id);

        let runner = Arc::clone(&engine);
        let outcome = tokio::spawn(async move { runner.run(job).await }).await;

        stats.active.fetch_sub(1, Ordering::Relaxed);
        stats.total_processed.fetch_add(1, Ordering::Relaxed);

        match outcome {
            Ok(SyncStatus::Failed) => {
                stats.total_failed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Task {}: sync job aborted: {}", task_id, e);
                stats.total_failed.fetch_add(1, Ordering::Relaxed);
                engine.abandon(&task_id, WORKER_PANIC_MESSAGE);
            }
        }
    }
}
