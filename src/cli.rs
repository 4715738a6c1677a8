use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// plandeploy - run installation plans and preflight checks
#[derive(Parser)]
#[command(name = "plandeploy")]
#[command(about = "Run a plan manifest as a deployment job or a preflight check")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: run the manifest's preflight checks instead of the job.
    ///
    /// Nothing is deployed; the output is the preflight result with one
    /// entry per step that reported an issue.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Path to a JSON configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a plan manifest
    Run {
        /// Path to the plan manifest
        manifest: PathBuf,

        /// Owning user id recorded on the job or preflight result
        #[arg(long)]
        user: Option<u64>,
    },
    /// Validate a plan manifest
    Validate {
        /// Path to the plan manifest
        manifest: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
