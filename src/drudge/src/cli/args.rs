use std::time::Duration;

use clap::{ArgAction, Args};
use drudge_pool::{run_inline, PoolConfig, Task, WorkerPool, DRUDGE_WORKERS};

/// Configures the verbosity of the builtin logger.
#[derive(Clone, Copy, Debug, Args)]
pub struct Verbosity {
    /// Configures the log verbosity of Drudge.
    ///
    /// `-v` is Debug, `-vv` is Trace.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Verbosity {
    /// Configures the global logger based on the settings.
    pub fn setup(self) -> eyre::Result<()> {
        let level = self.log_level();
        simple_logger::init_with_level(level)?;

        Ok(())
    }

    fn log_level(self) -> log::Level {
        match self.verbose {
            0 => log::Level::Info,
            1 => log::Level::Debug,
            _ => log::Level::Trace,
        }
    }
}

/// Options for sizing the worker pool.
#[derive(Clone, Debug, Args)]
pub struct PoolArgs {
    /// The number of worker threads to run jobs on.
    ///
    /// Defaults to the available parallelism of the system. 0 runs
    /// every job on the main thread.
    #[clap(short, long, env = DRUDGE_WORKERS)]
    pub jobs: Option<usize>,

    /// Upper bound in milliseconds for waiting on workers during
    /// shutdown.
    #[clap(long)]
    pub join_timeout: Option<u64>,
}

impl PoolArgs {
    /// Whether jobs should run on the calling thread instead of a pool.
    pub fn inline(&self) -> bool {
        self.jobs == Some(0)
    }

    /// Builds the pool configuration for a command.
    pub fn config(&self, name: &str) -> eyre::Result<PoolConfig> {
        let config = match self.jobs {
            Some(n) => PoolConfig::new(n),
            None => PoolConfig::from_env()?,
        };

        let config = config.thread_name(format!("drudge-{name}"));
        Ok(match self.join_timeout {
            Some(ms) => config.join_timeout(Duration::from_millis(ms)),
            None => config,
        })
    }

    /// Runs `jobs` through `task` and returns the results in input order.
    pub fn process<T, I>(
        &self,
        name: &str,
        task: T,
        jobs: I,
    ) -> eyre::Result<Vec<Option<T::Output>>>
    where
        T: Task + Clone,
        I: IntoIterator<Item = T::Job>,
    {
        if self.inline() {
            log::debug!("running {name} jobs inline");
            return Ok(run_inline(task, jobs)?);
        }

        let mut pool = WorkerPool::new(self.config(name)?, task)?;
        let results = pool.process(jobs)?;
        pool.shutdown()?;

        Ok(results)
    }
}
