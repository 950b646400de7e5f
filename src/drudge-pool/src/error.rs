use std::{io, time::Duration};

use thiserror::Error;

use crate::config::BadConfiguration;

/// Fatal errors raised by the lifecycle of a [`WorkerPool`].
///
/// Failures of individual jobs never show up here; they are reported
/// as `None` results instead.
///
/// [`WorkerPool`]: crate::WorkerPool
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool configuration is unusable.
    #[error(transparent)]
    Config(#[from] BadConfiguration),

    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker {worker}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    /// A worker could not set up its task context.
    #[error("worker {worker} failed to set up its task: {message}")]
    Setup { worker: usize, message: String },

    /// A worker failed while tearing down its task context.
    #[error("worker {worker} failed to tear down its task: {message}")]
    Teardown { worker: usize, message: String },

    /// Shutdown did not observe all queued work as done in time.
    #[error("work queue still had {pending} unfinished items after {timeout:?}")]
    JoinTimeout { pending: usize, timeout: Duration },

    /// All workers went away while results were still outstanding.
    #[error("result channel disconnected with {outstanding} results outstanding")]
    Disconnected { outstanding: usize },

    /// Jobs of an earlier, dropped stream never finished.
    #[error("{outstanding} jobs of an abandoned stream are still in flight")]
    Abandoned { outstanding: usize },

    /// A tagged job never produced its result.
    #[error("no result was received for job #{sequence}")]
    MissingResult { sequence: usize },

    /// The pool has already been shut down.
    #[error("worker pool is shut down")]
    Closed,
}
