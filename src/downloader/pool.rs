//! Bounded worker pool
//!
//! One pass of the pool partitions its task list and spawns one tokio task per
//! shard on a `JoinSet`. Each shard runs its tasks sequentially. When shutdown
//! is requested or another shard hits an unrecoverable error, shards finish
//! the task in hand and stop; the pass then hands back every task that did
//! not complete.

use crate::downloader::partition::partition;
use crate::downloader::task::FetchTask;
use crate::downloader::worker::FetchWorker;
use crate::downloader::DownloadError;
use crate::shutdown::SharedShutdown;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Result of one pool pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Number of shards spawned
    pub shards: usize,
    /// Tasks never started because of shutdown, in generation order
    pub unstarted: Vec<FetchTask>,
}

/// A pool pass stopped by an unrecoverable error
#[derive(Debug)]
pub struct PassFailure {
    /// First error raised by a shard
    pub error: DownloadError,
    /// Tasks that did not complete, in generation order. The task that
    /// raised the error is among them.
    pub unfinished: Vec<FetchTask>,
}

impl From<PassFailure> for DownloadError {
    fn from(failure: PassFailure) -> Self {
        failure.error
    }
}

/// Runs task lists through a shared [`FetchWorker`]
pub struct WorkerPool {
    worker: Arc<FetchWorker>,
    workers: usize,
    shutdown: Option<SharedShutdown>,
    progress_bar: Option<ProgressBar>,
}

impl WorkerPool {
    /// Pool of up to `workers` concurrent shards
    pub fn new(worker: Arc<FetchWorker>, workers: usize) -> Self {
        Self {
            worker,
            workers,
            shutdown: None,
            progress_bar: None,
        }
    }

    /// Stop taking new tasks once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Tick `progress_bar` after every finished task
    pub fn with_progress_bar(mut self, progress_bar: ProgressBar) -> Self {
        self.progress_bar = Some(progress_bar);
        self
    }

    /// Run every task once
    pub async fn run(&self, tasks: Vec<FetchTask>) -> Result<PassReport, PassFailure> {
        if tasks.is_empty() {
            return Ok(PassReport::default());
        }

        if let Some(pb) = &self.progress_bar {
            pb.set_length(tasks.len() as u64);
            pb.set_position(0);
        }

        let shards = partition(tasks, self.workers);
        let shard_count = shards.len();
        info!(
            shards = shard_count,
            workers = self.workers,
            "Starting worker pool pass"
        );

        let halt = Arc::new(AtomicBool::new(false));
        let mut progress = Vec::with_capacity(shard_count);
        let mut join_set = JoinSet::new();
        for (index, shard) in shards.into_iter().enumerate() {
            let done = Arc::new(AtomicUsize::new(0));
            let run = ShardRun {
                index,
                worker: Arc::clone(&self.worker),
                shutdown: self.shutdown.clone(),
                halt: Arc::clone(&halt),
                done: Arc::clone(&done),
                progress_bar: self.progress_bar.clone(),
            };
            progress.push((shard.clone(), done));
            join_set.spawn(run.run(shard));
        }

        let mut fatal = None;
        while let Some(joined) = join_set.join_next().await {
            let e = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => {
                    error!(error = %e, "Worker hit an unrecoverable error, stopping pool");
                    e
                }
                Err(e) => {
                    error!(error = %e, "Worker task panicked, stopping pool");
                    DownloadError::WorkerPanic(e.to_string())
                }
            };
            halt.store(true, Ordering::SeqCst);
            fatal.get_or_insert(e);
        }

        // Shards are contiguous, so concatenating their tails keeps generation order
        let unfinished: Vec<FetchTask> = progress
            .into_iter()
            .flat_map(|(shard, done)| shard.into_iter().skip(done.load(Ordering::SeqCst)))
            .collect();

        if let Some(error) = fatal {
            warn!(unfinished = unfinished.len(), "Pool pass aborted");
            return Err(PassFailure { error, unfinished });
        }
        if !unfinished.is_empty() {
            info!(unstarted = unfinished.len(), "Pool pass interrupted by shutdown");
        }

        Ok(PassReport {
            shards: shard_count,
            unstarted: unfinished,
        })
    }
}

/// One shard's view of the pass
struct ShardRun {
    index: usize,
    worker: Arc<FetchWorker>,
    shutdown: Option<SharedShutdown>,
    halt: Arc<AtomicBool>,
    done: Arc<AtomicUsize>,
    progress_bar: Option<ProgressBar>,
}

impl ShardRun {
    fn should_stop(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
            || self
                .shutdown
                .as_ref()
                .is_some_and(|s| s.is_shutdown_requested())
    }

    async fn run(self, shard: Vec<FetchTask>) -> Result<(), DownloadError> {
        debug!(shard = self.index, tasks = shard.len(), "Shard started");

        for task in &shard {
            if self.should_stop() {
                debug!(
                    shard = self.index,
                    unstarted = shard.len() - self.done.load(Ordering::SeqCst),
                    "Shard stopping early"
                );
                return Ok(());
            }

            if let Err(e) = self.worker.process(task).await {
                self.halt.store(true, Ordering::SeqCst);
                return Err(e.into());
            }
            self.done.fetch_add(1, Ordering::SeqCst);
            if let Some(pb) = &self.progress_bar {
                pb.inc(1);
            }
        }

        debug!(shard = self.index, "Shard finished");
        Ok(())
    }
}
