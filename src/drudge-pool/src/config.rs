use std::{env, thread, time::Duration};

use thiserror::Error;

/// Environment variable that overrides the default worker count.
pub const DRUDGE_WORKERS: &str = "DRUDGE_WORKERS";

const WORKER_NAME: &str = "drudge-worker";

/// Errors in a [`PoolConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BadConfiguration {
    #[error("invalid value in {}; must be a natural number", DRUDGE_WORKERS)]
    WorkersVar,

    #[error("a worker pool needs at least one worker")]
    NoWorkers,
}

fn available_workers() -> usize {
    thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

fn parse_workers(value: Option<&str>) -> Result<usize, BadConfiguration> {
    match value {
        Some(value) => match value.trim().parse() {
            Ok(0) | Err(_) => Err(BadConfiguration::WorkersVar),
            Ok(n) => Ok(n),
        },

        None => Ok(available_workers()),
    }
}

/// Settings for spawning a [`WorkerPool`].
///
/// [`WorkerPool`]: crate::WorkerPool
#[derive(Clone, Debug)]
pub struct PoolConfig {
    workers: usize,
    thread_name: String,
    stack_size: Option<usize>,
    join_timeout: Option<Duration>,
}

impl PoolConfig {
    /// Creates a configuration for a pool of `workers` threads.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            thread_name: WORKER_NAME.into(),
            stack_size: None,
            join_timeout: None,
        }
    }

    /// Creates a configuration sized from the environment.
    ///
    /// The `DRUDGE_WORKERS` environment variable specifies the number
    /// of workers. If not set, falls back to
    /// [`thread::available_parallelism`].
    pub fn from_env() -> Result<Self, BadConfiguration> {
        let value = env::var(DRUDGE_WORKERS).ok();
        parse_workers(value.as_deref()).map(Self::new)
    }

    /// Sets the name prefix for worker threads.
    ///
    /// Every thread gets its worker index appended.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the stack size in bytes for worker threads.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Bounds how long shutdown waits for queued work to finish.
    ///
    /// Without a timeout, a hung task blocks shutdown indefinitely.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = Some(timeout);
        self
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub(crate) fn worker_name(&self, worker: usize) -> String {
        format!("{}-{worker}", self.thread_name)
    }

    #[inline]
    pub(crate) fn worker_stack(&self) -> Option<usize> {
        self.stack_size
    }

    #[inline]
    pub(crate) fn join_deadline(&self) -> Option<Duration> {
        self.join_timeout
    }

    pub(crate) fn validate(&self) -> Result<(), BadConfiguration> {
        if self.workers == 0 {
            Err(BadConfiguration::NoWorkers)
        } else {
            Ok(())
        }
    }
}
