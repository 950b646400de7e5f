use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use clap::Args;
use drudge_utils::lines::{self, FileWriter, LinesError};
use eyre::Context;

use crate::{cli::HYPHEN, utils};

/// An input source for line-oriented commands.
#[derive(Clone, Debug)]
pub enum InputSource {
    /// Lines will be read from stdin.
    Stdin,
    /// Lines will be read from a file or a directory of files.
    File(PathBuf),
}

/// An output destination for line-oriented commands.
#[derive(Clone, Debug)]
pub enum OutputSource {
    /// Records will be written to stdout.
    Stdout,
    /// Records will be written to a single file.
    File(PathBuf),
}

/// Generalized command options for reading lines and writing
/// JSON-lines records.
#[derive(Debug, Args)]
pub struct InputsOutputs {
    /// The file to read jobs from, one per line.
    ///
    /// When the value is "-", lines will be read from stdin. When it
    /// names a directory, every file inside of it is read.
    pub input: PathBuf,

    /// An optional output file for the produced records.
    ///
    /// Defaults to "-" for printing output to stdout.
    #[clap(short, default_value = HYPHEN)]
    pub output: PathBuf,

    /// Stops reading after this many lines.
    #[clap(long)]
    pub limit: Option<usize>,
}

impl InputsOutputs {
    /// Evaluates the supplied arguments into input and output sources.
    pub fn evaluate(self) -> (InputSource, OutputSource) {
        let input = if self.input.as_os_str() == HYPHEN {
            InputSource::Stdin
        } else {
            InputSource::File(self.input)
        };

        let output = if self.output.as_os_str() == HYPHEN {
            OutputSource::Stdout
        } else {
            OutputSource::File(self.output)
        };

        (input, output)
    }
}

/// A lazily read sequence of input lines.
pub type LineStream = Box<dyn Iterator<Item = Result<String, LinesError>>>;

impl InputSource {
    /// Lazily reads up to `limit` lines from the source.
    ///
    /// Directories are read file by file, `.gz` files are decompressed.
    pub fn lines(&self, limit: Option<usize>) -> eyre::Result<LineStream> {
        Ok(match self {
            Self::Stdin => Box::new(
                lines::read_lines(utils::stdin_reader(), limit)
                    .map(|l| l.map_err(LinesError::from)),
            ),

            Self::File(path) if path.is_dir() => Box::new(
                lines::open_dir_lines(path, limit)
                    .with_context(|| format!("failed to list '{}'", path.display()))?,
            ),

            Self::File(path) => Box::new(
                lines::open_lines(path, limit)?.map(|l| l.map_err(LinesError::from)),
            ),
        })
    }
}

/// An open output destination.
pub enum Sink {
    Stdout(BufWriter<io::StdoutLock<'static>>),
    File(FileWriter),
}

impl Sink {
    /// Flushes all pending output, completing compressed files.
    pub fn finish(self) -> eyre::Result<()> {
        match self {
            Self::Stdout(mut w) => w.flush()?,
            Self::File(w) => w.finish().context("failed to finish output file")?,
        }

        Ok(())
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(w) => w.write(buf),
            Self::File(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl OutputSource {
    /// Opens the destination for writing.
    ///
    /// Files ending in `.gz` are gzip-compressed.
    pub fn writer(&self) -> eyre::Result<Sink> {
        Ok(match self {
            Self::Stdout => Sink::Stdout(BufWriter::new(io::stdout().lock())),
            Self::File(path) => Sink::File(FileWriter::create(path)?),
        })
    }
}
