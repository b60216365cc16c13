//! The allocate-then-launch orchestration.
//!
//! Wires host count → ports needed → port checker → launcher, and retries
//! the whole sequence under backoff: a fresh attempt re-reserves ports, so
//! transient stuck launches and allocation races self-heal across attempts.

use std::ffi::OsString;
use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::HostSource;
use crate::domain::error::LaunchError;
use crate::mpirun::Launcher;
use crate::output::{OutputContext, progress};
use crate::port::Checker;
use crate::retry::{self, Failure, Policy};

/// One out-of-band and one bulk-transport port per host, plus headroom for
/// the launcher's own daemons.
fn ports_needed(host_count: usize) -> usize {
    host_count * 2 + 2
}

/// Reserve ports and run the job, retrying the whole sequence on transient
/// failures.
///
/// # Errors
///
/// Returns the last attempt's error once the retry policy stops: an
/// allocation failure, a launch failure, or (without further attempts) a
/// launcher version mismatch.
pub async fn run(
    ctx: &OutputContext,
    hosts: &impl HostSource,
    out_dir: &Path,
    args: &[OsString],
) -> Result<()> {
    let hosts = hosts.hosts();
    ctx.info(&format!("working with {} host(s)", hosts.len()));
    let wanted = ports_needed(hosts.len());

    let mut checker = Checker::new("localhost").context("creating a port checker")?;
    let policy = Policy::default();

    let outcome = retry::with_backoff(&policy, async || {
        attempt(ctx, &mut checker, wanted, out_dir, args).await
    })
    .await;

    ctx.info(&format!(
        "{} after {} attempt(s)",
        outcome.stopped, outcome.attempts
    ));

    outcome.result
}

/// One allocate-then-launch pass.
async fn attempt(
    ctx: &OutputContext,
    checker: &mut Checker,
    wanted: usize,
    out_dir: &Path,
    args: &[OsString],
) -> Result<(), Failure> {
    let pb = ctx
        .show_progress()
        .then(|| progress::spinner(&format!("reserving {wanted} contiguous ports")));
    let range = checker.available_range(wanted).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let (min, max) = match range {
        Ok(range) => range,
        Err(err) => {
            ctx.warn(&format!("finding {wanted} contiguous free ports failed: {err}"));
            return Err(Failure::Transient(err.into()));
        }
    };
    ctx.success(&format!("ports {min}..{max} are free right now"));

    let launcher = match Launcher::new(out_dir, min, max) {
        Ok(launcher) => launcher,
        Err(err) => {
            ctx.warn(&format!("preparing the output directory failed: {err}"));
            return Err(Failure::Transient(
                anyhow::Error::new(err).context("preparing the output directory"),
            ));
        }
    };

    if !launcher.check_version().await {
        return Err(Failure::Fatal(LaunchError::VersionMismatch.into()));
    }

    ctx.info(&format!("will run: {}", launcher.command_line(args)));

    launcher.execute(args).await.map_err(|err| {
        ctx.warn(&format!("execution of mpirun failed: {err}"));
        Failure::Transient(err.into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_ports_per_host_plus_overhead() {
        assert_eq!(ports_needed(0), 2);
        assert_eq!(ports_needed(1), 4);
        assert_eq!(ports_needed(16), 34);
    }
}
