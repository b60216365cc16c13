//! Concurrent TCP port scanning.
//!
//! Probes are plain connect attempts, so the scanner cannot tell a free port
//! from one a firewall silently drops traffic to. It errs on the side of
//! "in use": only an outright connection refusal counts as available.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio::time;

/// Buffered results in flight between probe tasks and the accumulator.
const RESULT_BUFFER: usize = 20;

/// Scans for connectable ports on one host.
///
/// The semaphore caps in-flight probes; size it to the process's open-file
/// budget (see [`crate::infra::limits`]) so a wide scan cannot exhaust
/// descriptors.
pub struct Scanner {
    host: Arc<str>,
    limit: Arc<Semaphore>,
    timeout: Duration,
}

impl Scanner {
    #[must_use]
    pub fn new(host: &str, limit: Arc<Semaphore>, timeout: Duration) -> Self {
        Self {
            host: Arc::from(host),
            limit,
            timeout,
        }
    }

    /// Whether `port` could be opened on this host right now.
    ///
    /// Refused connections mean available; an accepted connection means in
    /// use. Descriptor exhaustion is no verdict at all: the probe sleeps one
    /// timeout interval and tries the same port again.
    pub async fn port_available(&self, port: u16) -> bool {
        probe(&self.host, port, self.timeout).await
    }

    /// Scan `min..=max` inclusive and collect the ports that look free.
    ///
    /// Each port is probed in its own task behind the admission semaphore;
    /// results funnel through a single accumulator so nothing writes the
    /// collection concurrently. Returns once every probe has finished and
    /// been drained. Order follows probe completion, not port number.
    pub async fn available_ports(&self, min: u16, max: u16) -> Vec<u16> {
        let (tx, mut rx) = mpsc::channel::<u16>(RESULT_BUFFER);

        let accumulator = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Some(port) = rx.recv().await {
                open.push(port);
            }
            open
        });

        let mut probes = Vec::with_capacity(usize::from(max.saturating_sub(min)) + 1);
        for port in min..=max {
            // The semaphore is never closed; acquisition only fails if it
            // were, in which case there is nothing left to scan with.
            let Ok(permit) = Arc::clone(&self.limit).acquire_owned().await else {
                break;
            };
            let tx = tx.clone();
            let host = Arc::clone(&self.host);
            let timeout = self.timeout;

            probes.push(tokio::spawn(async move {
                let _permit = permit;
                if probe(&host, port, timeout).await {
                    let _ = tx.send(port).await;
                }
            }));
        }
        drop(tx);

        for handle in probes {
            let _ = handle.await;
        }

        accumulator.await.unwrap_or_default()
    }
}

async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    loop {
        match time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_conn)) => return false,
            Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionRefused => return true,
            Ok(Err(err)) if fd_exhausted(&err) => time::sleep(timeout).await,
            // Timed out, unreachable, blocked by policy: call it in use.
            _ => return false,
        }
    }
}

fn fd_exhausted(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        matches!(err.raw_os_error(), Some(nix::libc::EMFILE | nix::libc::ENFILE))
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

/// Ask the kernel for `count` free ports, ready to use.
///
/// Every listener stays open until the whole batch is allocated, so the same
/// port cannot be handed out twice; they are all released together on return.
/// The ports are not guaranteed to be contiguous.
///
/// # Errors
///
/// Fails on the first bind the kernel refuses.
pub async fn get_free_ports(count: usize) -> io::Result<Vec<u16>> {
    let mut listeners = Vec::with_capacity(count);
    let mut ports = Vec::with_capacity(count);

    for _ in 0..count {
        let listener = TcpListener::bind(("localhost", 0)).await?;
        ports.push(listener.local_addr()?.port());
        listeners.push(listener);
    }

    Ok(ports)
}
