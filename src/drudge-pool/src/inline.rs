use crate::{error::PoolError, task::Task, worker::guarded};

/// Drives a [`Task`] on the calling thread, without spawning workers.
///
/// Jobs go through the same lifecycle as in a [`WorkerPool`]: the
/// task is entered once on construction, failed or panicking jobs
/// yield `None`, and the task is exited by [`Inline::finish`] or on
/// drop. Useful for debugging tasks and for machines where threads
/// are not worth it.
///
/// [`WorkerPool`]: crate::WorkerPool
pub struct Inline<T: Task> {
    task: T,
    context: Option<T::Context>,
}

impl<T: Task> Inline<T> {
    /// Enters `task` on the current thread.
    pub fn new(mut task: T) -> Result<Self, PoolError> {
        let context = guarded(|| task.enter().map_err(|e| e.to_string()))
            .map_err(|message| PoolError::Setup { worker: 0, message })?;

        log::debug!("inline task entered");
        Ok(Self {
            task,
            context: Some(context),
        })
    }

    /// Processes a single job.
    pub fn invoke(&mut self, job: T::Job) -> Option<T::Output> {
        let context = self.context.as_mut()?;
        let task = &mut self.task;

        match guarded(|| task.invoke(context, job).map_err(|e| e.to_string())) {
            Ok(output) => Some(output),
            Err(e) => {
                log::warn!("inline: job failed: {e}");
                None
            }
        }
    }

    /// Processes `jobs` one after the other, in input order.
    pub fn process<I>(&mut self, jobs: I) -> Vec<Option<T::Output>>
    where
        I: IntoIterator<Item = T::Job>,
    {
        jobs.into_iter().map(|job| self.invoke(job)).collect()
    }

    /// Exits the task and reports teardown failures.
    pub fn finish(mut self) -> Result<(), PoolError> {
        self.exit()
            .map_err(|message| PoolError::Teardown { worker: 0, message })
    }

    fn exit(&mut self) -> Result<(), String> {
        let Some(context) = self.context.take() else {
            return Ok(());
        };

        let task = &mut self.task;
        guarded(|| task.exit(context).map_err(|e| e.to_string()))
    }
}

impl<T: Task> Drop for Inline<T> {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            log::error!("inline: teardown failed: {e}");
        }
    }
}

/// Runs `jobs` through `task` on the calling thread.
///
/// The counterpart of [`WorkerPool::process`] for zero workers.
///
/// [`WorkerPool::process`]: crate::WorkerPool::process
pub fn run_inline<T, I>(task: T, jobs: I) -> Result<Vec<Option<T::Output>>, PoolError>
where
    T: Task,
    I: IntoIterator<Item = T::Job>,
{
    let mut inline = Inline::new(task)?;
    let results = inline.process(jobs);
    inline.finish()?;

    Ok(results)
}
