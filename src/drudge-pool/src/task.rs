use std::{fmt, marker::PhantomData};

/// A unit of stateful computation bound to one worker.
///
/// The implementing type acts as a descriptor: the pool clones it once
/// per worker and moves the clone onto the worker thread. Everything
/// expensive or non-transferable belongs into the [`Task::Context`],
/// which is built by [`Task::enter`] on the worker thread itself and
/// never leaves it.
pub trait Task: Send + 'static {
    /// The input values processed by this task.
    type Job: Send + 'static;
    /// The result values produced for every job.
    type Output: Send + 'static;
    /// Per-worker state built in [`Task::enter`].
    type Context;
    /// The failure type of all task operations.
    type Error: fmt::Display;

    /// Performs one-time setup for the worker.
    ///
    /// Called exactly once, before any call to [`Task::invoke`].
    fn enter(&mut self) -> Result<Self::Context, Self::Error>;

    /// Processes a single job.
    ///
    /// Errors and panics are contained to the job that raised them.
    fn invoke(
        &mut self,
        context: &mut Self::Context,
        job: Self::Job,
    ) -> Result<Self::Output, Self::Error>;

    /// Releases the worker context.
    ///
    /// Called exactly once after a successful [`Task::enter`], both on
    /// regular shutdown and when the worker loop unwinds.
    fn exit(&mut self, context: Self::Context) -> Result<(), Self::Error> {
        drop(context);
        Ok(())
    }
}

/// A task split into a context constructor and a stateless job handler.
///
/// Use with [`WithContext`] to hand it to a pool. Since [`process`]
/// does not get mutable access to anything, implementations are easy
/// to exercise outside of a pool.
///
/// [`process`]: ContextTask::process
pub trait ContextTask: Clone + Send + 'static {
    type Job: Send + 'static;
    type Output: Send + 'static;
    type Context;
    type Error: fmt::Display;

    /// Builds the context from the parameters stored in `self`.
    fn build_context(&self) -> Result<Self::Context, Self::Error>;

    /// Processes a single job against a shared context.
    fn process(job: Self::Job, context: &Self::Context) -> Result<Self::Output, Self::Error>;
}

/// Adapts a [`ContextTask`] to the [`Task`] interface.
#[derive(Clone, Debug)]
pub struct WithContext<C>(pub C);

impl<C: ContextTask> Task for WithContext<C> {
    type Job = C::Job;
    type Output = C::Output;
    type Context = C::Context;
    type Error = C::Error;

    fn enter(&mut self) -> Result<Self::Context, Self::Error> {
        self.0.build_context()
    }

    fn invoke(
        &mut self,
        context: &mut Self::Context,
        job: Self::Job,
    ) -> Result<Self::Output, Self::Error> {
        C::process(job, context)
    }
}

/// A task without context which runs a function for every job.
///
/// Created by [`task_fn`].
pub struct FnTask<F, J, R, E> {
    f: F,
    _marker: PhantomData<fn(J) -> Result<R, E>>,
}

/// Wraps a function into a [`Task`].
///
/// ```
/// use std::convert::Infallible;
///
/// use drudge_pool::{task_fn, WorkerPool};
///
/// let square = task_fn(|x: u64| Ok::<_, Infallible>(x * x));
/// let mut pool = WorkerPool::with_workers(2, square).unwrap();
/// let squares = pool.process([5, 1, 3]).unwrap();
///
/// assert_eq!(squares, vec![Some(25), Some(1), Some(9)]);
/// ```
pub fn task_fn<F, J, R, E>(f: F) -> FnTask<F, J, R, E>
where
    F: Fn(J) -> Result<R, E>,
{
    FnTask {
        f,
        _marker: PhantomData,
    }
}

impl<F: Clone, J, R, E> Clone for FnTask<F, J, R, E> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            _marker: PhantomData,
        }
    }
}

impl<F, J, R, E> fmt::Debug for FnTask<F, J, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").finish_non_exhaustive()
    }
}

impl<F, J, R, E> Task for FnTask<F, J, R, E>
where
    F: Fn(J) -> Result<R, E> + Send + 'static,
    J: Send + 'static,
    R: Send + 'static,
    E: fmt::Display + 'static,
{
    type Job = J;
    type Output = R;
    type Context = ();
    type Error = E;

    fn enter(&mut self) -> Result<(), E> {
        Ok(())
    }

    fn invoke(&mut self, _: &mut (), job: J) -> Result<R, E> {
        (self.f)(job)
    }
}
