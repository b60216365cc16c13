//! CLI argument parsing with clap derive

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::application::launch;
use crate::infra::lsf::LsfHosts;
use crate::output::OutputContext;

/// Run an Open MPI job pinned to a contiguous block of free TCP ports
#[derive(Parser)]
#[command(name = "mpiports", version)]
pub struct Cli {
    /// Redirect output from application processes into DIR/rank.out
    /// (DIR is deleted and recreated at start up)
    #[arg(long = "output-filename", value_name = "DIR")]
    pub output_filename: PathBuf,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Arguments handed to mpirun unchanged, after the port flags
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "MPIRUN_ARGS"
    )]
    pub args: Vec<OsString>,
}

impl Cli {
    /// Reserve a port range and run the job under the retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error when no contiguous port range could be reserved, when
    /// the launcher is missing or the wrong major version, or when the job
    /// still failed once all attempts were spent.
    pub async fn run(self) -> Result<()> {
        let ctx = OutputContext::new(self.no_color, self.quiet);
        launch::run(&ctx, &LsfHosts, &self.output_filename, &self.args).await
    }
}
