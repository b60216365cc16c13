//! mpiports - run an Open MPI job on a contiguous block of free TCP ports

use clap::Parser;

use mpiports::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
