use clap::{Parser, Subcommand};

use crate::cmd::*;

mod args;
pub use args::PoolArgs;

pub mod io;
pub use io::*;

pub const HYPHEN: &str = "-";

/// The CLI interface for the Drudge application.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    /// The selected command.
    #[clap(subcommand)]
    pub command: DrudgeCommand,

    #[clap(flatten)]
    pub verbosity: args::Verbosity,
}

/// The top-level commands supported by Drudge.
#[derive(Debug, Subcommand)]
pub enum DrudgeCommand {
    Batch(batch::Batch),
    Hash(hash::Hash),
}

impl Command for DrudgeCommand {
    fn handle(self) -> eyre::Result<()> {
        match self {
            Self::Batch(batch) => batch.handle(),
            Self::Hash(hash) => hash.handle(),
        }
    }
}
