use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crate::{
    config::PoolConfig,
    error::PoolError,
    queue::{IdentityTag, Message, WorkQueue},
    task::Task,
    worker::{panic_message, Completion, Status, Worker},
};

mod stream;
use stream::Stream;
pub use stream::Unordered;

/// Totals reported by [`WorkerPool::consume`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    /// Number of jobs that went through the pool.
    pub processed: usize,
    /// Number of those jobs that failed.
    pub failed: usize,
}

// Puts the results of `submitted` tagged jobs back into input order.
fn reassemble<R>(
    mut slots: HashMap<usize, Option<R>>,
    submitted: usize,
) -> Result<Vec<Option<R>>, PoolError> {
    (0..submitted)
        .map(|sequence| {
            slots
                .remove(&sequence)
                .ok_or(PoolError::MissingResult { sequence })
        })
        .collect()
}

/// A fixed set of workers sharing one work queue and one result channel.
///
/// Workers are started by [`WorkerPool::new`] and stopped by
/// [`WorkerPool::shutdown`], which also happens implicitly on drop.
/// Submission methods borrow the pool mutably, so only one stream of
/// jobs can be in flight at any time.
pub struct WorkerPool<T: Task> {
    config: PoolConfig,
    queue: Arc<WorkQueue<Message<T::Job>>>,
    results: Option<mpsc::Receiver<Completion<T::Output>>>,
    status: mpsc::Receiver<Status>,
    handles: Vec<JoinHandle<()>>,
    live: usize,
    abandoned: usize,
}

impl<T: Task + Clone> WorkerPool<T> {
    /// Spawns the workers and waits until all of them are set up.
    ///
    /// Every worker gets its own clone of `task`. If any worker fails
    /// to start or to enter its task, the others are shut down again
    /// and the failure is returned.
    pub fn new(config: PoolConfig, task: T) -> Result<Self, PoolError> {
        config.validate()?;

        let queue = Arc::new(WorkQueue::new());
        let (results_tx, results_rx) = mpsc::channel();
        let (status_tx, status_rx) = mpsc::channel();

        let mut pool = Self {
            config,
            queue,
            results: Some(results_rx),
            status: status_rx,
            handles: Vec::new(),
            live: 0,
            abandoned: 0,
        };

        let mut failure = None;
        for id in 0..pool.config.workers() {
            let worker = Worker::new(
                id,
                task.clone(),
                pool.queue.clone(),
                results_tx.clone(),
                status_tx.clone(),
            );

            let mut builder = thread::Builder::new().name(pool.config.worker_name(id));
            if let Some(size) = pool.config.worker_stack() {
                builder = builder.stack_size(size);
            }

            match builder.spawn(move || worker.run()) {
                Ok(handle) => pool.handles.push(handle),
                Err(source) => {
                    failure = Some(PoolError::Spawn { worker: id, source });
                    break;
                }
            }
        }

        // Workers hold the only senders from here on, so the channels
        // disconnect once every worker is gone.
        drop(results_tx);
        drop(status_tx);

        for _ in 0..pool.handles.len() {
            match pool.status.recv() {
                Ok(Status::Ready(_)) => pool.live += 1,
                Ok(Status::SetupFailed(worker, message)) => {
                    failure.get_or_insert(PoolError::Setup { worker, message });
                }
                Ok(Status::Exited(worker, _)) => {
                    failure.get_or_insert(PoolError::Setup {
                        worker,
                        message: "exited during setup".into(),
                    });
                }
                Err(_) => {
                    failure.get_or_insert(PoolError::Disconnected { outstanding: 0 });
                    break;
                }
            }
        }

        match failure {
            Some(e) => {
                if let Err(shutdown) = pool.shutdown() {
                    log::warn!("failed to shut down partially started pool: {shutdown}");
                }
                Err(e)
            }

            None => {
                log::debug!("worker pool started with {} workers", pool.live);
                Ok(pool)
            }
        }
    }

    /// Spawns a pool of `workers` threads with default settings.
    pub fn with_workers(workers: usize, task: T) -> Result<Self, PoolError> {
        Self::new(PoolConfig::new(workers), task)
    }

    /// Runs `f` against a fresh pool and shuts the pool down afterwards.
    ///
    /// Shutdown failures take precedence over the value returned by `f`.
    pub fn scope<F, R>(config: PoolConfig, task: T, f: F) -> Result<R, PoolError>
    where
        F: FnOnce(&mut Self) -> R,
    {
        let mut pool = Self::new(config, task)?;
        let value = f(&mut pool);
        pool.shutdown()?;

        Ok(value)
    }
}

impl<T: Task> WorkerPool<T> {
    /// The number of running workers.
    #[inline]
    pub fn workers(&self) -> usize {
        self.live
    }

    /// Whether [`WorkerPool::shutdown`] has already run.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.results.is_none()
    }

    /// Runs `jobs` through the pool and yields results in completion
    /// order.
    ///
    /// At most one job per worker is queued at any time; the next job
    /// is pulled from `jobs` only after a result was received. Failed
    /// jobs yield `Ok(None)`.
    ///
    /// Dropping the iterator early waits for jobs already handed to
    /// the workers and discards their results.
    pub fn process_unordered<I>(&mut self, jobs: I) -> Unordered<'_, T, I::IntoIter>
    where
        I: IntoIterator<Item = T::Job>,
    {
        Unordered::new(self, jobs.into_iter())
    }

    /// Runs `jobs` through the pool and collects results in input order.
    ///
    /// The returned vector has one entry per job; `None` entries mark
    /// jobs that failed.
    pub fn process<I>(&mut self, jobs: I) -> Result<Vec<Option<T::Output>>, PoolError>
    where
        I: IntoIterator<Item = T::Job>,
    {
        let mut submitted = 0;
        let tagged = jobs.into_iter().map(|job| {
            let tag = IdentityTag::new(submitted, job);
            submitted += 1;
            Message::Tagged(tag)
        });

        let mut slots = HashMap::new();
        for completion in Stream::new(self, tagged) {
            let Completion { sequence, output } = completion?;
            if let Some(sequence) = sequence {
                slots.insert(sequence, output);
            }
        }

        reassemble(slots, submitted)
    }

    /// Runs `jobs` through the pool for their side effects only.
    pub fn consume<I>(&mut self, jobs: I) -> Result<ConsumeSummary, PoolError>
    where
        I: IntoIterator<Item = T::Job>,
    {
        let mut summary = ConsumeSummary::default();
        for output in self.process_unordered(jobs) {
            summary.processed += 1;
            if output?.is_none() {
                summary.failed += 1;
            }
        }

        Ok(summary)
    }

    /// Stops all workers and closes the result channel.
    ///
    /// Sends one shutdown signal per running worker and blocks until
    /// every queued item has been processed. Calling this again after
    /// it returned is a no-op.
    pub fn shutdown(&mut self) -> Result<(), PoolError> {
        let Some(results) = self.results.take() else {
            return Ok(());
        };

        log::trace!(
            "shutting down {} workers, {} items unfinished",
            self.live,
            self.queue.unfinished()
        );
        for _ in 0..self.live {
            self.queue.put(Message::Shutdown);
        }
        self.live = 0;

        if let Some(timeout) = self.config.join_deadline() {
            if let Err(pending) = self.queue.join(Some(timeout)) {
                // Hung workers keep their threads; they are detached here.
                self.handles.clear();
                return Err(PoolError::JoinTimeout { pending, timeout });
            }
        } else {
            let _ = self.queue.join(None);
        }

        let mut failure = None;
        for (worker, handle) in self.handles.drain(..).enumerate() {
            if let Err(panic) = handle.join() {
                failure.get_or_insert(PoolError::Teardown {
                    worker,
                    message: format!("panicked: {}", panic_message(panic.as_ref())),
                });
            }
        }

        for status in self.status.try_iter() {
            if let Status::Exited(worker, Some(message)) = status {
                failure.get_or_insert(PoolError::Teardown { worker, message });
            }
        }

        drop(results);
        log::debug!("worker pool shut down");

        failure.map_or(Ok(()), Err)
    }

    // Late results of abandoned jobs are collected here, so the pool
    // becomes usable again once every one of them has arrived.
    fn ensure_idle(&mut self) -> Result<(), PoolError> {
        let results = self.results.as_ref().ok_or(PoolError::Closed)?;

        while self.abandoned > 0 {
            match results.try_recv() {
                Ok(_) => self.abandoned -= 1,
                Err(_) => {
                    return Err(PoolError::Abandoned {
                        outstanding: self.abandoned,
                    })
                }
            }
        }

        Ok(())
    }

    fn put(&self, message: Message<T::Job>) {
        self.queue.put(message);
    }

    fn recv(&self, outstanding: usize) -> Result<Completion<T::Output>, PoolError> {
        let results = self.results.as_ref().ok_or(PoolError::Closed)?;
        results
            .recv()
            .map_err(|_| PoolError::Disconnected { outstanding })
    }

    // Discards the results of `outstanding` jobs, waiting at most the
    // join timeout for each of them.
    fn discard(&mut self, mut outstanding: usize) {
        let Some(results) = self.results.as_ref() else {
            return;
        };

        let timeout = self.config.join_deadline();
        while outstanding > 0 {
            let received = match timeout {
                Some(timeout) => results
                    .recv_timeout(timeout)
                    .map_err(|e| matches!(e, RecvTimeoutError::Timeout)),
                None => results.recv().map_err(|_| false),
            };

            match received {
                Ok(_) => outstanding -= 1,
                Err(timed_out) => {
                    if timed_out {
                        log::warn!("abandoning {outstanding} jobs still in flight");
                        self.abandoned += outstanding;
                    }
                    return;
                }
            }
        }
    }
}

impl<T: Task> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("worker pool shutdown failed: {e}");
        }
    }
}
