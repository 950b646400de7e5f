use std::iter::{Fuse, Map};

use super::WorkerPool;
use crate::{
    error::PoolError,
    queue::Message,
    task::Task,
    worker::Completion,
};

/// Keeps one job per worker in flight and hands out completions as
/// they arrive.
pub(crate) struct Stream<'a, T: Task, I> {
    pool: &'a mut WorkerPool<T>,
    jobs: Fuse<I>,
    in_flight: usize,
    primed: bool,
    failed: bool,
}

impl<'a, T, I> Stream<'a, T, I>
where
    T: Task,
    I: Iterator<Item = Message<T::Job>>,
{
    pub fn new(pool: &'a mut WorkerPool<T>, jobs: I) -> Self {
        Self {
            pool,
            jobs: jobs.fuse(),
            in_flight: 0,
            primed: false,
            failed: false,
        }
    }

    fn submit_next(&mut self) -> bool {
        match self.jobs.next() {
            Some(message) => {
                self.pool.put(message);
                self.in_flight += 1;
                true
            }

            None => false,
        }
    }

    fn prime(&mut self) {
        self.primed = true;

        // Fill every worker once; short inputs only queue what they have.
        while self.in_flight < self.pool.live && self.submit_next() {}
        log::trace!("primed pool with {} jobs", self.in_flight);
    }
}

impl<T, I> Iterator for Stream<'_, T, I>
where
    T: Task,
    I: Iterator<Item = Message<T::Job>>,
{
    type Item = Result<Completion<T::Output>, PoolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if !self.primed {
            if let Err(e) = self.pool.ensure_idle() {
                self.failed = true;
                return Some(Err(e));
            }

            self.prime();
        }

        if self.in_flight == 0 {
            return None;
        }

        match self.pool.recv(self.in_flight) {
            Ok(completion) => {
                self.in_flight -= 1;
                self.submit_next();

                Some(Ok(completion))
            }

            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl<T: Task, I> Drop for Stream<'_, T, I> {
    fn drop(&mut self) {
        // Results of unconsumed jobs must not leak into the next stream.
        if !self.failed && self.in_flight > 0 {
            self.pool.discard(self.in_flight);
        }
    }
}

type WrapJob<J> = fn(J) -> Message<J>;

/// An iterator over job results in completion order.
///
/// Created by [`WorkerPool::process_unordered`]. Yields `Ok(None)` for
/// jobs that failed and a single `Err` if the pool broke down.
#[must_use = "Consume this Iterator to run the submitted jobs"]
pub struct Unordered<'a, T: Task, I> {
    inner: Stream<'a, T, Map<I, WrapJob<T::Job>>>,
}

impl<'a, T, I> Unordered<'a, T, I>
where
    T: Task,
    I: Iterator<Item = T::Job>,
{
    pub(super) fn new(pool: &'a mut WorkerPool<T>, jobs: I) -> Self {
        let wrap: WrapJob<T::Job> = Message::Job;
        Self {
            inner: Stream::new(pool, jobs.map(wrap)),
        }
    }
}

impl<T, I> Iterator for Unordered<'_, T, I>
where
    T: Task,
    I: Iterator<Item = T::Job>,
{
    type Item = Result<Option<T::Output>, PoolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|completion| completion.map(|c| c.output))
    }
}
