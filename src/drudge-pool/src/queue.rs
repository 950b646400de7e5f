use std::{
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crossbeam_queue::SegQueue;

/// A job paired with its position in the submitted sequence.
///
/// Tags let results be put back into submission order after the
/// workers complete them in arbitrary order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityTag<J> {
    pub sequence: usize,
    pub payload: J,
}

impl<J> IdentityTag<J> {
    #[inline]
    pub fn new(sequence: usize, payload: J) -> Self {
        Self { sequence, payload }
    }
}

/// Items travelling from the pool to its workers.
#[derive(Debug)]
pub(crate) enum Message<J> {
    Job(J),
    Tagged(IdentityTag<J>),
    Shutdown,
}

struct Counters {
    unfinished: usize,
}

/// A multi-producer, multi-consumer FIFO queue which keeps track of
/// how many of its items are still being worked on.
///
/// Every item obtained from [`WorkQueue::get`] must be acknowledged
/// with [`WorkQueue::task_done`] for [`WorkQueue::join`] to return.
pub(crate) struct WorkQueue<T> {
    items: SegQueue<T>,
    counters: Mutex<Counters>,
    available: Condvar,
    drained: Condvar,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
            counters: Mutex::new(Counters { unfinished: 0 }),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    // None of the critical sections can panic, so a poisoned lock
    // still guards consistent counters.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues an item and wakes up one waiting consumer.
    pub fn put(&self, item: T) {
        {
            // The count must be visible before the item can be popped.
            let mut counters = self.lock();
            counters.unfinished += 1;
            self.items.push(item);
        }

        self.available.notify_one();
    }

    /// Dequeues the next item, blocking until one is available.
    pub fn get(&self) -> T {
        loop {
            if let Some(item) = self.items.pop() {
                return item;
            }

            let counters = self.lock();
            if self.items.is_empty() {
                drop(
                    self.available
                        .wait(counters)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
        }
    }

    /// Marks one previously dequeued item as fully processed.
    pub fn task_done(&self) {
        let mut counters = self.lock();
        debug_assert!(counters.unfinished > 0, "task_done called too often");

        counters.unfinished = counters.unfinished.saturating_sub(1);
        if counters.unfinished == 0 {
            self.drained.notify_all();
        }
    }

    /// Blocks until every item ever enqueued has been marked done.
    ///
    /// With a `timeout`, gives up after that duration and returns the
    /// number of items still unfinished as the error.
    pub fn join(&self, timeout: Option<Duration>) -> Result<(), usize> {
        let counters = self.lock();

        match timeout {
            Some(timeout) => {
                let (counters, _) = self
                    .drained
                    .wait_timeout_while(counters, timeout, |c| c.unfinished > 0)
                    .unwrap_or_else(PoisonError::into_inner);

                match counters.unfinished {
                    0 => Ok(()),
                    pending => Err(pending),
                }
            }

            None => {
                drop(
                    self.drained
                        .wait_while(counters, |c| c.unfinished > 0)
                        .unwrap_or_else(PoisonError::into_inner),
                );
                Ok(())
            }
        }
    }

    /// Number of items enqueued but not yet marked done.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }
}
