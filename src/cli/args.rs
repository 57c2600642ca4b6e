//! Command-line argument parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chain-mirror")]
#[command(about = "Incrementally mirror container images from cgr.dev into Amazon ECR")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Dry run mode (log the mapping, touch no registry)
    #[arg(
        long = "dry-run",
        short = 'n',
        global = true,
        help = "Log intended source -> destination mappings without network side effects"
    )]
    pub dry_run: bool,

    #[arg(
        long = "copy-all-tags",
        global = true,
        help = "Mirror every source tag instead of only \"latest\""
    )]
    pub copy_all_tags: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run as a Lambda function, chaining through async self-invocation
    Serve,

    /// Run one invocation locally
    Run {
        /// Position in the repository list
        #[arg(long, allow_negative_numbers = true, conflicts_with = "repo")]
        index: Option<i64>,

        /// Mirror exactly this repository, without chaining
        #[arg(long)]
        repo: Option<String>,

        /// Keep draining continuations in-process until the sweep ends
        #[arg(long)]
        follow: bool,
    },

    /// Print the resolved repository list and its fingerprint
    List,
}
