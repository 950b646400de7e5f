use std::{convert::Infallible, num::NonZeroUsize};

use clap::Args;
use drudge_pool::task_fn;
use drudge_utils::{batch::batches, hash::hash_strings, lines::write_jsonl};
use serde::Serialize;

use super::Command;
use crate::cli::{InputsOutputs, PoolArgs};

/// Subcommand for fingerprinting groups of lines in parallel.
#[derive(Debug, Args)]
pub struct Batch {
    #[clap(flatten)]
    args: InputsOutputs,

    #[clap(flatten)]
    pool: PoolArgs,

    /// The number of lines that make up one job.
    #[clap(short, long, default_value = "1024")]
    size: NonZeroUsize,
}

/// The fingerprint of one batch of lines.
#[derive(Debug, PartialEq, Serialize)]
struct BatchRecord {
    batch: usize,
    lines: usize,
    digest: String,
}

fn fingerprint((batch, lines): (usize, Vec<String>)) -> Result<BatchRecord, Infallible> {
    Ok(BatchRecord {
        batch,
        lines: lines.len(),
        digest: hash_strings(&lines),
    })
}

impl Command for Batch {
    fn handle(self) -> eyre::Result<()> {
        let limit = self.args.limit;
        let (input, output) = self.args.evaluate();

        let mut read_error = None;
        let lines = input
            .lines(limit)?
            .map_while(|line| line.map_err(|e| read_error = Some(e)).ok());
        let jobs = batches(lines, self.size).enumerate();

        let records = self.pool.process("batch", task_fn(fingerprint), jobs)?;
        if let Some(e) = read_error {
            return Err(e.into());
        }

        let mut sink = output.writer()?;
        let written = write_jsonl(&mut sink, records.into_iter().flatten())?;
        sink.finish()?;
        log::info!("fingerprinted {written} batches of up to {} lines", self.size);

        Ok(())
    }
}
