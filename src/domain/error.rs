//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. The retry layer cares about the distinction between
//! these variants, so they stay enums rather than opaque strings.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

// ── Port reservation errors ───────────────────────────────────────────────────

/// Errors from the contiguous-port search.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("a port range must contain at least one port")]
    EmptyRange,

    /// The port space was too fragmented to assemble a block of the requested
    /// width within the attempt budget. Retrying the whole launch may succeed
    /// once other processes release ports.
    #[error("no contiguous run of {wanted} free ports found after {attempts} attempts")]
    NoContiguousRange { wanted: usize, attempts: usize },

    #[error("binding an ephemeral listener failed: {0}")]
    Bind(#[source] io::Error),
}

// ── Launch errors ─────────────────────────────────────────────────────────────

/// Errors from supervising the external launcher.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The liveness heuristic tripped: the launcher ran (or exited) without
    /// ever creating its output directory. Its own exit status is unreliable
    /// for this failure mode, so this variant takes precedence over it.
    #[error("mpirun is non-responsive (failed to create output directory)")]
    Stuck,

    /// Wrong or missing launcher binary. Retrying cannot fix this.
    #[error("only Open MPI v4 is supported")]
    VersionMismatch,

    #[error("failed to spawn {exe}: {source}")]
    Spawn { exe: String, source: io::Error },

    #[error("waiting on mpirun failed: {0}")]
    Wait(#[source] io::Error),

    /// The launcher's own failure, propagated once the liveness check passed.
    #[error("mpirun exited with {0}")]
    Exited(ExitStatus),
}
