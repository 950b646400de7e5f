use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc},
};

use crate::{
    queue::{Message, WorkQueue},
    task::Task,
};

/// The outcome of one job, as published to the result channel.
#[derive(Debug)]
pub(crate) struct Completion<R> {
    pub sequence: Option<usize>,
    pub output: Option<R>,
}

/// Lifecycle events of a worker, reported to the owning pool.
#[derive(Debug)]
pub(crate) enum Status {
    Ready(usize),
    SetupFailed(usize, String),
    Exited(usize, Option<String>),
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// Runs a task operation, folding errors and panics into a message.
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

/// A task whose context is alive for the worker's lifetime.
///
/// Dropping it runs [`Task::exit`], so teardown also happens when the
/// worker loop unwinds.
struct Bound<'a, T: Task> {
    worker: usize,
    task: T,
    context: Option<T::Context>,
    status: &'a mpsc::Sender<Status>,
}

impl<T: Task> Bound<'_, T> {
    fn invoke(&mut self, job: T::Job) -> Option<T::Output> {
        let context = self.context.as_mut()?;
        let task = &mut self.task;

        match guarded(|| task.invoke(context, job).map_err(|e| e.to_string())) {
            Ok(output) => Some(output),
            Err(e) => {
                log::warn!("worker {}: job failed: {e}", self.worker);
                None
            }
        }
    }
}

impl<T: Task> Drop for Bound<'_, T> {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };

        let task = &mut self.task;
        let teardown = guarded(|| task.exit(context).map_err(|e| e.to_string())).err();
        if let Some(e) = &teardown {
            log::error!("worker {}: teardown failed: {e}", self.worker);
        }

        log::debug!("worker {} exited", self.worker);
        let _ = self.status.send(Status::Exited(self.worker, teardown));
    }
}

/// A single execution unit servicing the shared work queue.
pub(crate) struct Worker<T: Task> {
    id: usize,
    task: T,
    queue: Arc<WorkQueue<Message<T::Job>>>,
    results: mpsc::Sender<Completion<T::Output>>,
    status: mpsc::Sender<Status>,
}

impl<T: Task> Worker<T> {
    pub fn new(
        id: usize,
        task: T,
        queue: Arc<WorkQueue<Message<T::Job>>>,
        results: mpsc::Sender<Completion<T::Output>>,
        status: mpsc::Sender<Status>,
    ) -> Self {
        Self {
            id,
            task,
            queue,
            results,
            status,
        }
    }

    /// Sets up the task and processes jobs until a shutdown signal.
    pub fn run(self) {
        let Self {
            id,
            mut task,
            queue,
            results,
            status,
        } = self;

        log::debug!("worker {id} starting");
        let context = match guarded(|| task.enter().map_err(|e| e.to_string())) {
            Ok(context) => context,
            Err(e) => {
                log::error!("worker {id}: setup failed: {e}");
                let _ = status.send(Status::SetupFailed(id, e));
                return;
            }
        };

        let mut bound = Bound {
            worker: id,
            task,
            context: Some(context),
            status: &status,
        };
        let _ = status.send(Status::Ready(id));

        loop {
            let (sequence, job) = match queue.get() {
                Message::Shutdown => {
                    log::trace!("worker {id} received shutdown signal");
                    queue.task_done();
                    break;
                }

                Message::Job(job) => (None, job),
                Message::Tagged(tag) => (Some(tag.sequence), tag.payload),
            };

            let output = bound.invoke(job);
            queue.task_done();

            // The receiver only goes away once the pool is shut down, at
            // which point no jobs are left to report on.
            let _ = results.send(Completion { sequence, output });
        }
    }
}
