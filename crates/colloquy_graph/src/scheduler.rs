//! Schedulers for node mapping work.
//!
//! Mapping an intent onto an edge runs user code (validators, effects,
//! custom mappers) that may be slow or may panic. The engine hands that work
//! to a [`MappingScheduler`] as a self-contained [`MappingJob`] and awaits
//! the outcome.
//!
//! - [`InlineScheduler`] runs the job in place. This is the default.
//! - [`WorkerPool`] runs jobs on tokio's blocking thread pool, with at most
//!   `max_workers` jobs in flight.
//!
//! Both catch panics in the job and report them as
//! [`SchedulerError::Panicked`].

use core::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use colloquy_store::deferred::{BoxFuture, describe_panic};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::edge::EdgeMapping;
use crate::node::MappingError;

/// A unit of mapping work. It owns everything it needs.
pub type MappingJob = Box<dyn FnOnce() -> Result<EdgeMapping, MappingError> + Send + 'static>;

/// Errors reported by a [`MappingScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The job ran and returned an error.
    Mapping(MappingError),
    /// The job panicked.
    Panicked(String),
    /// The job could not be run.
    Unavailable(String),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::Mapping(err) => write!(f, "{err}"),
            SchedulerError::Panicked(msg) => write!(f, "mapping panicked: {msg}"),
            SchedulerError::Unavailable(msg) => write!(f, "scheduler unavailable: {msg}"),
        }
    }
}

impl core::error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            SchedulerError::Mapping(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MappingError> for SchedulerError {
    fn from(err: MappingError) -> Self {
        SchedulerError::Mapping(err)
    }
}

/// Runs mapping jobs.
pub trait MappingScheduler: Send + Sync {
    /// Returns the scheduler's name for tracing.
    fn name(&self) -> &str;

    /// Runs `job` and resolves to its outcome.
    fn schedule(&self, job: MappingJob) -> BoxFuture<'_, Result<EdgeMapping, SchedulerError>>;
}

impl fmt::Debug for dyn MappingScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingScheduler")
            .field("name", &self.name())
            .finish()
    }
}

/// Runs each job on the calling task.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl MappingScheduler for InlineScheduler {
    fn name(&self) -> &str {
        "inline"
    }

    fn schedule(&self, job: MappingJob) -> BoxFuture<'_, Result<EdgeMapping, SchedulerError>> {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(job));
        Box::pin(async move {
            match outcome {
                Ok(result) => result.map_err(SchedulerError::Mapping),
                Err(panic) => Err(SchedulerError::Panicked(describe_panic(&*panic))),
            }
        })
    }
}

/// Runs jobs on tokio's blocking pool, bounded by a semaphore.
///
/// Jobs submitted while all workers are busy wait for a permit. Must be used
/// from within a tokio runtime unless built with [`WorkerPool::on`].
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_workers: usize,
    handle: Option<Handle>,
}

impl WorkerPool {
    /// Creates a pool running at most `max_workers` jobs at once on the
    /// current runtime. A `max_workers` of zero is raised to one.
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            handle: None,
        }
    }

    /// Creates a pool that spawns onto the runtime behind `handle`.
    #[must_use]
    pub fn on(handle: Handle, max_workers: usize) -> Self {
        Self {
            handle: Some(handle),
            ..Self::new(max_workers)
        }
    }

    /// Returns the maximum number of concurrent jobs.
    #[must_use]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Returns the number of idle workers.
    #[must_use]
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

impl MappingScheduler for WorkerPool {
    fn name(&self) -> &str {
        "worker_pool"
    }

    fn schedule(&self, job: MappingJob) -> BoxFuture<'_, Result<EdgeMapping, SchedulerError>> {
        Box::pin(async move {
            let permit = Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::Unavailable("worker pool closed".to_string()))?;

            let task = move || {
                let _permit = permit;
                job()
            };
            let handle = match &self.handle {
                Some(handle) => handle.spawn_blocking(task),
                None => tokio::task::spawn_blocking(task),
            };

            match handle.await {
                Ok(result) => result.map_err(SchedulerError::Mapping),
                Err(err) if err.is_panic() => {
                    Err(SchedulerError::Panicked(describe_panic(&*err.into_panic())))
                }
                Err(err) => Err(SchedulerError::Unavailable(err.to_string())),
            }
        })
    }
}
