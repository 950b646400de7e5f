use std::{
    collections::HashSet,
    convert::Infallible,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use drudge_pool::{
    task_fn, ConsumeSummary, ContextTask, PoolConfig, PoolError, Task, WithContext, WorkerPool,
};

fn square(x: u64) -> Result<u64, Infallible> {
    Ok(x * x)
}

fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
    v.sort();
    v
}

#[test]
fn process_restores_input_order() -> Result<(), PoolError> {
    let mut pool = WorkerPool::with_workers(2, task_fn(square))?;

    assert_eq!(pool.process([5, 1, 3])?, vec![Some(25), Some(1), Some(9)]);
    pool.shutdown()
}

#[test]
fn process_matches_sequential_results() -> Result<(), PoolError> {
    let jobs: Vec<u64> = (0..50).rev().collect();
    let expected: Vec<_> = jobs.iter().map(|&x| Some(x * x)).collect();

    for workers in 1..=5 {
        // Later jobs are quicker, so completion order differs from input order.
        let task = task_fn(|x: u64| {
            thread::sleep(Duration::from_micros(x * 50));
            square(x)
        });

        let mut pool = WorkerPool::with_workers(workers, task)?;
        assert_eq!(pool.process(jobs.clone())?, expected);
    }

    Ok(())
}

#[test]
fn unordered_yields_every_result_once() -> Result<(), PoolError> {
    let jobs: Vec<u64> = (0..40).collect();
    let expected = sorted(jobs.iter().map(|&x| x * x).collect());

    for workers in [1, 3, 8] {
        let mut pool = WorkerPool::with_workers(workers, task_fn(square))?;
        let results: Vec<_> = pool
            .process_unordered(jobs.clone())
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        assert_eq!(sorted(results), expected);
    }

    Ok(())
}

#[test]
fn unordered_prefers_short_jobs() -> Result<(), PoolError> {
    let task = task_fn(|ms: u64| {
        thread::sleep(Duration::from_millis(ms));
        Ok::<_, Infallible>(ms)
    });

    let mut pool = WorkerPool::with_workers(3, task)?;
    let results: Vec<_> = pool
        .process_unordered([300, 10, 150])
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!(results, vec![Some(10), Some(150), Some(300)]);
    Ok(())
}

#[test]
fn fewer_jobs_than_workers() -> Result<(), PoolError> {
    let mut pool = WorkerPool::with_workers(6, task_fn(square))?;

    let results = pool.process_unordered([2, 4]).collect::<Result<Vec<_>, _>>()?;
    assert_eq!(sorted(results), vec![Some(4), Some(16)]);

    assert_eq!(pool.process(Vec::new())?, Vec::new());
    assert_eq!(pool.process_unordered(Vec::new()).count(), 0);
    Ok(())
}

#[test]
fn failed_jobs_leave_empty_slots() -> Result<(), PoolError> {
    let task = task_fn(|x: i32| match x {
        0 => panic!("zero is not allowed"),
        x if x < 0 => Err(format!("{x} is negative")),
        x => Ok(x * 10),
    });

    let mut pool = WorkerPool::with_workers(2, task)?;
    assert_eq!(
        pool.process([1, -2, 0, 4, 0, -6, 7])?,
        vec![Some(10), None, None, Some(40), None, None, Some(70)]
    );

    // All workers are still around after the failures.
    assert_eq!(pool.workers(), 2);
    assert_eq!(pool.process([3, 5])?, vec![Some(30), Some(50)]);
    Ok(())
}

#[test]
fn consume_counts_failures() -> Result<(), PoolError> {
    let seen = Arc::new(AtomicUsize::new(0));
    let task = {
        let seen = seen.clone();
        task_fn(move |x: u32| {
            seen.fetch_add(1, Ordering::SeqCst);
            if x % 3 == 0 {
                Err("multiple of three")
            } else {
                Ok(())
            }
        })
    };

    let mut pool = WorkerPool::with_workers(4, task)?;
    let summary = pool.consume(1..=30)?;

    assert_eq!(
        summary,
        ConsumeSummary {
            processed: 30,
            failed: 10
        }
    );
    assert_eq!(seen.load(Ordering::SeqCst), 30);
    Ok(())
}

#[test]
fn dropped_stream_does_not_leak_results() -> Result<(), PoolError> {
    let mut pool = WorkerPool::with_workers(3, task_fn(square))?;

    let first = pool.process_unordered(0..100).next();
    assert!(matches!(first, Some(Ok(Some(_)))));

    assert_eq!(pool.process([7, 8])?, vec![Some(49), Some(64)]);
    Ok(())
}

#[test]
fn shutdown_is_idempotent() -> Result<(), PoolError> {
    let mut pool = WorkerPool::with_workers(3, task_fn(square))?;
    pool.process([1, 2, 3])?;

    pool.shutdown()?;
    pool.shutdown()?;
    assert!(pool.is_closed());
    assert_eq!(pool.workers(), 0);

    assert!(matches!(pool.process([1]), Err(PoolError::Closed)));
    Ok(())
}

#[test]
fn scope_shuts_down_pool() -> Result<(), PoolError> {
    let config = PoolConfig::new(2).thread_name("scoped");
    let squares = WorkerPool::scope(config, task_fn(square), |pool| pool.process(1..=4))??;

    assert_eq!(squares, vec![Some(1), Some(4), Some(9), Some(16)]);
    Ok(())
}

#[test]
fn zero_workers_is_rejected() {
    let res = WorkerPool::with_workers(0, task_fn(square));
    assert!(matches!(res, Err(PoolError::Config(_))));
}

/// Records which threads entered and exited, and which thread served
/// each job.
#[derive(Clone, Default)]
struct Tracker {
    entered: Arc<Mutex<Vec<String>>>,
    exited: Arc<Mutex<Vec<String>>>,
    fail_enter_on: Option<&'static str>,
    fail_exit: bool,
}

fn current_name() -> String {
    thread::current().name().unwrap_or_default().to_string()
}

impl Task for Tracker {
    type Job = u32;
    type Output = String;
    type Context = String;
    type Error = String;

    fn enter(&mut self) -> Result<String, String> {
        let name = current_name();
        if self.fail_enter_on == Some(name.as_str()) {
            return Err(format!("{name} refused to start"));
        }

        self.entered.lock().unwrap().push(name.clone());
        Ok(name)
    }

    fn invoke(&mut self, context: &mut String, _: u32) -> Result<String, String> {
        assert_eq!(*context, current_name());
        Ok(context.clone())
    }

    fn exit(&mut self, context: String) -> Result<(), String> {
        self.exited.lock().unwrap().push(context);
        if self.fail_exit {
            Err("could not release".into())
        } else {
            Ok(())
        }
    }
}

#[test]
fn every_worker_enters_and_exits_once() -> Result<(), PoolError> {
    let tracker = Tracker::default();
    let config = PoolConfig::new(4).thread_name("tracked");

    let served = WorkerPool::scope(config, tracker.clone(), |pool| pool.process(0..200))??;
    let served: HashSet<_> = served.into_iter().flatten().collect();

    let entered = sorted(tracker.entered.lock().unwrap().clone());
    let exited = sorted(tracker.exited.lock().unwrap().clone());
    assert_eq!(entered, vec!["tracked-0", "tracked-1", "tracked-2", "tracked-3"]);
    assert_eq!(exited, entered);
    assert!(served.iter().all(|name| entered.contains(name)));
    Ok(())
}

#[test]
fn setup_failure_is_fatal() {
    let tracker = Tracker {
        fail_enter_on: Some("flaky-1"),
        ..Tracker::default()
    };
    let config = PoolConfig::new(3).thread_name("flaky");

    match WorkerPool::new(config, tracker.clone()) {
        Err(PoolError::Setup { worker, message }) => {
            assert_eq!(worker, 1);
            assert_eq!(message, "flaky-1 refused to start");
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("pool started despite a setup failure"),
    }

    // The healthy workers were torn down again.
    let entered = sorted(tracker.entered.lock().unwrap().clone());
    let exited = sorted(tracker.exited.lock().unwrap().clone());
    assert_eq!(entered, vec!["flaky-0", "flaky-2"]);
    assert_eq!(exited, entered);
}

#[test]
fn teardown_failure_is_reported() -> Result<(), PoolError> {
    let tracker = Tracker {
        fail_exit: true,
        ..Tracker::default()
    };

    let mut pool = WorkerPool::with_workers(2, tracker)?;
    pool.process([1, 2])?;

    match pool.shutdown() {
        Err(PoolError::Teardown { message, .. }) => assert_eq!(message, "could not release"),
        other => panic!("unexpected shutdown result: {other:?}"),
    }

    // A failed shutdown still counts as done.
    pool.shutdown()
}

#[derive(Clone)]
struct Scaled {
    factor: u64,
}

impl ContextTask for Scaled {
    type Job = u64;
    type Output = u64;
    type Context = Vec<u64>;
    type Error = String;

    fn build_context(&self) -> Result<Vec<u64>, String> {
        Ok((0..16).map(|i| i * self.factor).collect())
    }

    fn process(job: u64, table: &Vec<u64>) -> Result<u64, String> {
        table
            .get(job as usize)
            .copied()
            .ok_or_else(|| format!("{job} is out of range"))
    }
}

#[test]
fn context_tasks_share_nothing_but_parameters() -> Result<(), PoolError> {
    let mut pool = WorkerPool::with_workers(3, WithContext(Scaled { factor: 3 }))?;

    assert_eq!(
        pool.process([1, 15, 99, 4])?,
        vec![Some(3), Some(45), None, Some(12)]
    );
    Ok(())
}

#[test]
fn hung_jobs_time_out_shutdown() -> Result<(), PoolError> {
    let task = task_fn(|ms: u64| {
        thread::sleep(Duration::from_millis(ms));
        Ok::<_, Infallible>(ms)
    });
    let config = PoolConfig::new(2).join_timeout(Duration::from_millis(50));

    let mut pool = WorkerPool::new(config, task)?;
    {
        let mut results = pool.process_unordered([2_000, 1]);
        assert!(matches!(results.next(), Some(Ok(Some(1)))));
    }

    assert!(matches!(
        pool.process([1]),
        Err(PoolError::Abandoned { outstanding: 1 })
    ));
    assert!(matches!(
        pool.shutdown(),
        Err(PoolError::JoinTimeout { pending, .. }) if pending >= 1
    ));
    Ok(())
}

#[test]
fn pool_recovers_once_abandoned_jobs_finish() -> Result<(), PoolError> {
    let task = task_fn(|ms: u64| {
        thread::sleep(Duration::from_millis(ms));
        Ok::<_, Infallible>(ms)
    });
    let config = PoolConfig::new(2).join_timeout(Duration::from_millis(50));

    let mut pool = WorkerPool::new(config, task)?;
    {
        let mut results = pool.process_unordered([300, 1]);
        assert!(matches!(results.next(), Some(Ok(Some(1)))));
    }

    thread::sleep(Duration::from_millis(600));

    assert_eq!(pool.process([1])?, vec![Some(1)]);
    pool.shutdown()
}

#[test]
fn none_payload_is_a_job() -> Result<(), PoolError> {
    let mut pool = WorkerPool::with_workers(2, task_fn(|x: Option<u32>| Ok::<_, Infallible>(x)))?;

    assert_eq!(
        pool.process([None, Some(1), None])?,
        vec![Some(None), Some(Some(1)), Some(None)]
    );
    assert_eq!(
        pool.consume([None, None, None])?,
        ConsumeSummary {
            processed: 3,
            failed: 0,
        }
    );
    pool.shutdown()
}
