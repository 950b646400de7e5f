use std::{convert::Infallible, io::Write};

use clap::{Args, ValueEnum};
use drudge_pool::{Task, WorkerPool};
use drudge_utils::{hash, lines::write_jsonl, timing::timed};
use serde::Serialize;

use super::Command;
use crate::cli::{InputsOutputs, PoolArgs};

/// Subcommand for hashing every line of an input in parallel.
#[derive(Debug, Args)]
pub struct Hash {
    #[clap(flatten)]
    args: InputsOutputs,

    #[clap(flatten)]
    pool: PoolArgs,

    /// The hash algorithm to apply.
    #[clap(short, long, value_enum, default_value_t = Algo::Sha1)]
    algo: Algo,

    /// Writes records in completion order instead of input order.
    #[clap(long)]
    unordered: bool,
}

/// The hash algorithm to apply.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Algo {
    /// Hex-encoded SHA-1 digest.
    Sha1,
    /// The DJB2 algorithm, as 8 hex digits.
    Djb2,
}

impl Algo {
    fn apply(self, input: &[u8]) -> String {
        match self {
            Self::Sha1 => hash::sha1_hex(input),
            Self::Djb2 => format!("{:08x}", hash::djb2(input)),
        }
    }
}

/// One hashed input line.
#[derive(Debug, PartialEq, Serialize)]
struct HashRecord {
    index: usize,
    input: String,
    hash: String,
}

/// Hashes lines and counts them per worker.
#[derive(Clone, Debug)]
struct LineHasher {
    algo: Algo,
}

impl Task for LineHasher {
    type Job = (usize, String);
    type Output = HashRecord;
    type Context = usize;
    type Error = Infallible;

    fn enter(&mut self) -> Result<usize, Infallible> {
        Ok(0)
    }

    fn invoke(
        &mut self,
        hashed: &mut usize,
        (index, input): (usize, String),
    ) -> Result<HashRecord, Infallible> {
        *hashed += 1;

        let hash = self.algo.apply(input.as_bytes());
        Ok(HashRecord { index, input, hash })
    }

    fn exit(&mut self, hashed: usize) -> Result<(), Infallible> {
        log::debug!("worker hashed {hashed} lines with {:?}", self.algo);
        Ok(())
    }
}

// Streams records to `writer` as workers complete them.
fn write_unordered<W, I>(
    pool: &mut WorkerPool<LineHasher>,
    jobs: I,
    writer: W,
) -> eyre::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = (usize, String)>,
{
    let mut failure = None;
    let records = timed(pool.process_unordered(jobs))
        .map_while(|(record, waited)| {
            log::trace!("waited {waited:?} for a result");
            record.map_err(|e| failure = Some(e)).ok()
        })
        .flatten();

    let written = write_jsonl(writer, records)?;
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(written),
    }
}

impl Command for Hash {
    fn handle(self) -> eyre::Result<()> {
        let limit = self.args.limit;
        let (input, output) = self.args.evaluate();

        let mut read_error = None;
        let jobs = input
            .lines(limit)?
            .map_while(|line| line.map_err(|e| read_error = Some(e)).ok())
            .enumerate();

        let task = LineHasher { algo: self.algo };
        let mut sink = output.writer()?;

        let written = if self.unordered && !self.pool.inline() {
            let mut pool = WorkerPool::new(self.pool.config("hash")?, task)?;
            let written = write_unordered(&mut pool, jobs, &mut sink)?;
            pool.shutdown()?;
            written
        } else {
            let records = self.pool.process("hash", task, jobs)?;
            write_jsonl(&mut sink, records.into_iter().flatten())?
        };
        sink.finish()?;

        if let Some(e) = read_error {
            return Err(e.into());
        }
        log::info!("hashed {written} lines");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_in_input_order() {
        let task = LineHasher { algo: Algo::Djb2 };
        let mut pool = WorkerPool::with_workers(3, task).unwrap();

        let jobs = vec![(0, "a".to_string()), (1, String::new())];
        let records: Vec<_> = pool.process(jobs).unwrap().into_iter().flatten().collect();

        assert_eq!(
            records,
            vec![
                HashRecord {
                    index: 0,
                    input: "a".into(),
                    hash: "0002b606".into(),
                },
                HashRecord {
                    index: 1,
                    input: String::new(),
                    hash: "00001505".into(),
                },
            ]
        );
    }

    #[test]
    fn sha1_records() {
        assert_eq!(
            Algo::Sha1.apply(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    fn record_line(index: usize, input: &str) -> String {
        let hash = Algo::Sha1.apply(input.as_bytes());
        let record = HashRecord {
            index,
            input: input.into(),
            hash,
        };
        serde_json::to_string(&record).unwrap()
    }

    #[test]
    fn unordered_writes_every_record_once() {
        let mut pool = WorkerPool::with_workers(3, LineHasher { algo: Algo::Sha1 }).unwrap();
        let inputs = ["x", "y", "z", "x", ""];
        let jobs: Vec<_> = inputs.iter().map(|s| s.to_string()).enumerate().collect();

        let mut out = Vec::new();
        assert_eq!(write_unordered(&mut pool, jobs, &mut out).unwrap(), 5);
        pool.shutdown().unwrap();

        let mut written: Vec<_> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        let mut expected: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(i, s)| record_line(i, s))
            .collect();

        written.sort();
        expected.sort();
        assert_eq!(written, expected);
    }

    #[test]
    fn unordered_reports_pool_failure() {
        let mut pool = WorkerPool::with_workers(2, LineHasher { algo: Algo::Djb2 }).unwrap();
        pool.shutdown().unwrap();

        let mut out = Vec::new();
        let err = write_unordered(&mut pool, vec![(0, "a".to_string())], &mut out).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<drudge_pool::PoolError>(),
            Some(drudge_pool::PoolError::Closed)
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn inline_matches_pool_output() {
        let jobs = vec![(0, "a".to_string()), (1, "b".to_string())];
        let task = LineHasher { algo: Algo::Sha1 };

        let inline = drudge_pool::run_inline(task.clone(), jobs.clone()).unwrap();
        let mut pool = WorkerPool::with_workers(2, task).unwrap();

        assert_eq!(inline, pool.process(jobs).unwrap());
    }
}
