//! Implementation of a worker pool for long-lived, stateful tasks.
//!
//! # Motivation
//!
//! Some jobs need an expensive piece of state before they can run, e.g.
//! a loaded model or an open connection. Building that state once per
//! job is wasteful, sharing one instance between threads is often not
//! possible at all.
//!
//! # Design
//!
//! A [`WorkerPool`] spawns a fixed number of worker threads. Each worker
//! receives its own copy of a [`Task`] descriptor and calls
//! [`Task::enter`] exactly once to build its private context. Jobs are
//! then pulled from a shared queue until the worker consumes its
//! shutdown signal, at which point [`Task::exit`] tears the context down.
//!
//! A job that fails or panics inside [`Task::invoke`] does not take its
//! worker down with it. The failure is logged and reported as a `None`
//! result in the slot of that job.
//!
//! Results are consumed either in completion order through
//! [`WorkerPool::process_unordered`], or reassembled into input order
//! through [`WorkerPool::process`].
//!
//! [`Inline`] runs the same task lifecycle on the calling thread, which
//! is handy for debugging a task before handing it to a pool.

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod config;
pub use config::{BadConfiguration, PoolConfig, DRUDGE_WORKERS};

mod error;
pub use error::PoolError;

mod inline;
pub use inline::{run_inline, Inline};

mod pool;
pub use pool::{ConsumeSummary, Unordered, WorkerPool};

mod queue;
pub use queue::IdentityTag;

mod task;
pub use task::{task_fn, ContextTask, FnTask, Task, WithContext};

mod worker;
