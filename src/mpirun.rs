//! Supervises the `mpirun` binary.
//!
//! The launcher is told exactly which TCP ports to use via MCA parameters
//! derived from a reserved contiguous range. It is also watched for a known
//! failure mode: when it is going to hang and time itself out, it never
//! creates its output directory, so the directory's appearance is used as
//! the liveness signal, independent of the exit status.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::domain::error::LaunchError;

const EXE: &str = "mpirun";
const VERSION_BANNER: &str = "mpirun (Open MPI) 4";
const OUT_ARG: &str = "-output-filename";
const MCA_ARG: &str = "--mca";
const OOB_PORTS_ARG: &str = "oob_tcp_dynamic_ipv4_ports";
const BTL_MIN_ARG: &str = "btl_tcp_port_min_v4";
const BTL_RANGE_ARG: &str = "btl_tcp_port_range_v4";

/// How long the launcher gets to create its output directory.
const STUCK_WINDOW: Duration = Duration::from_secs(30);

/// Where a supervised process's output streams go.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputSink {
    /// Share this process's stream; mpirun output is the user's output.
    #[default]
    Inherit,
    /// Discard.
    Null,
}

impl OutputSink {
    fn to_stdio(self) -> Stdio {
        match self {
            Self::Inherit => Stdio::inherit(),
            Self::Null => Stdio::null(),
        }
    }
}

/// Runs `mpirun` with a pinned port range and stuck detection.
///
/// Configuration is fixed at construction; `execute` can be called for the
/// lifetime of the reserved range the launcher was built from.
pub struct Launcher {
    exe: String,
    out_dir: PathBuf,
    oob_ports: String,
    btl_min: String,
    btl_range: String,
    pub stdout: OutputSink,
    pub stderr: OutputSink,
    stuck_window: Duration,
}

impl Launcher {
    /// Create a launcher for a job writing under `out_dir` and confined to
    /// ports `min_port..=max_port`.
    ///
    /// `out_dir` is deleted immediately: a left-over directory from an
    /// earlier attempt would defeat the liveness check. The range is split
    /// into an out-of-band window (one port per host, rounded down) and a
    /// bulk-transport window covering the rest, matching Open MPI's MCA
    /// parameter semantics.
    ///
    /// # Errors
    ///
    /// Returns an error if a pre-existing `out_dir` cannot be removed.
    pub fn new(out_dir: impl Into<PathBuf>, min_port: u16, max_port: u16) -> io::Result<Self> {
        let out_dir = out_dir.into();
        match fs::remove_dir_all(&out_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        let min = u32::from(min_port);
        let hosts = u32::from(max_port).saturating_sub(min).saturating_sub(1) / 2;
        let oob_max = min + hosts;

        Ok(Self {
            exe: EXE.to_owned(),
            out_dir,
            oob_ports: format!("{min_port}-{oob_max}"),
            btl_min: (oob_max + 1).to_string(),
            btl_range: (hosts + 1).to_string(),
            stdout: OutputSink::default(),
            stderr: OutputSink::default(),
            stuck_window: STUCK_WINDOW,
        })
    }

    fn cmd_args(&self, args: &[OsString]) -> Vec<OsString> {
        let mut all: Vec<OsString> = vec![
            OUT_ARG.into(),
            self.out_dir.clone().into(),
            MCA_ARG.into(),
            OOB_PORTS_ARG.into(),
            self.oob_ports.clone().into(),
            MCA_ARG.into(),
            BTL_MIN_ARG.into(),
            self.btl_min.clone().into(),
            MCA_ARG.into(),
            BTL_RANGE_ARG.into(),
            self.btl_range.clone().into(),
        ];
        all.extend_from_slice(args);
        all
    }

    /// The full command with output and port arguments, suffixed with the
    /// caller's args. No side effects; most callers want [`Self::execute`].
    #[must_use]
    pub fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.args(self.cmd_args(args));
        cmd
    }

    /// The command line `execute` would run, for display.
    #[must_use]
    pub fn command_line(&self, args: &[OsString]) -> String {
        let rendered: Vec<String> = self
            .cmd_args(args)
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        format!("{} {}", self.exe, rendered.join(" "))
    }

    /// Whether the launcher on `PATH` is an Open MPI with the supported
    /// major version. Any execution failure counts as no.
    pub async fn check_version(&self) -> bool {
        let Ok(out) = Command::new(&self.exe).arg("-V").output().await else {
            return false;
        };
        out.status.success() && out.stdout.starts_with(VERSION_BANNER.as_bytes())
    }

    /// Run the launcher and watch it for the stuck failure mode.
    ///
    /// Races the child's exit against the stuck window. If the window closes
    /// first and the output directory still does not exist, the child is
    /// killed and reaped and [`LaunchError::Stuck`] is returned; if the
    /// directory does exist the job is healthy and gets to finish naturally.
    /// A child that exits without ever creating the directory is also
    /// reported stuck, whatever its exit code said.
    ///
    /// # Errors
    ///
    /// [`LaunchError::Stuck`], [`LaunchError::Spawn`], [`LaunchError::Wait`],
    /// or [`LaunchError::Exited`] with the child's own status.
    pub async fn execute(&self, args: &[OsString]) -> Result<(), LaunchError> {
        let mut cmd = self.command(args);
        cmd.stdout(self.stdout.to_stdio()).stderr(self.stderr.to_stdio());

        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            exe: self.exe.clone(),
            source,
        })?;

        tokio::select! {
            status = child.wait() => {
                let status = status.map_err(LaunchError::Wait)?;
                if !self.out_dir_exists() {
                    return Err(LaunchError::Stuck);
                }
                exit_result(status)
            }
            () = tokio::time::sleep(self.stuck_window) => {
                if self.out_dir_exists() {
                    let status = child.wait().await.map_err(LaunchError::Wait)?;
                    exit_result(status)
                } else {
                    // kill() also reaps; if the child beat us to exiting,
                    // wait() picks up the corpse instead.
                    if child.kill().await.is_err() {
                        let _ = child.wait().await;
                    }
                    Err(LaunchError::Stuck)
                }
            }
        }
    }

    fn out_dir_exists(&self) -> bool {
        self.out_dir.exists()
    }
}

fn exit_result(status: ExitStatus) -> Result<(), LaunchError> {
    if status.success() {
        Ok(())
    } else {
        Err(LaunchError::Exited(status))
    }
}
