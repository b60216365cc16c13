//! Contiguous-port reservation.
//!
//! The checker keeps an in-process registry of ports the kernel has confirmed
//! bindable. Binding is momentary: each probe listener is closed again
//! immediately, so a claim is bookkeeping, not a reservation. The launcher
//! that consumes the range starts right afterwards, which keeps the window
//! between "probed free" and "actually bound by the job" as small as possible.

pub mod scanner;

use std::collections::HashSet;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use tokio::net::TcpListener;

use crate::domain::error::PortError;

/// Ephemeral anchors tried per requested port before giving up on a range.
const ATTEMPTS_PER_PORT: usize = 100;

/// Finds runs of currently-unused ports on one host.
///
/// A checker is single-owner: every method that changes the registry takes
/// `&mut self`, so concurrent allocation needs separate instances.
pub struct Checker {
    addr: SocketAddr,
    claimed: HashSet<u16>,
}

impl Checker {
    /// Create a checker for `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` does not resolve to a socket address.
    pub fn new(host: &str) -> io::Result<Self> {
        let addr = (host, 0)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, format!("{host} did not resolve")))?;

        Ok(Self {
            addr,
            claimed: HashSet::new(),
        })
    }

    /// Ask the kernel for one currently-free port and claim it.
    ///
    /// The listener is closed before this returns; only the registry entry
    /// remains. This is the only method here that talks to the kernel.
    async fn available_port(&mut self) -> io::Result<u16> {
        let listener = TcpListener::bind(self.addr).await?;
        let port = listener.local_addr()?.port();
        drop(listener);

        self.claimed.insert(port);

        Ok(port)
    }

    /// Forget a claim. A no-op for ports that were never claimed.
    pub fn release(&mut self, port: u16) {
        self.claimed.remove(&port);
    }

    /// Forget every claim.
    pub fn release_all(&mut self) {
        self.claimed.clear();
    }

    /// The maximal run of claimed ports directly above `port`, ascending.
    fn ports_after(&self, port: u16) -> Vec<u16> {
        let mut run = Vec::new();
        let mut last = port;
        while let Some(candidate) = last.checked_add(1) {
            if !self.claimed.contains(&candidate) {
                break;
            }
            run.push(candidate);
            last = candidate;
        }
        run
    }

    /// The maximal run of claimed ports directly below `port`, ascending.
    fn ports_before(&self, port: u16) -> Vec<u16> {
        let mut run = Vec::new();
        let mut last = port;
        while let Some(candidate) = last.checked_sub(1) {
            if !self.claimed.contains(&candidate) {
                break;
            }
            run.push(candidate);
            last = candidate;
        }
        run.reverse();
        run
    }

    /// Try to assemble `wanted` consecutive claimed ports around `anchor`,
    /// from the registry alone. Prefers extending upward, then downward, then
    /// a straddle that uses everything available below before topping up from
    /// above.
    fn check_range(&self, anchor: u16, wanted: usize) -> Option<Vec<u16>> {
        debug_assert!(wanted >= 1);
        let after = self.ports_after(anchor);
        let before = self.ports_before(anchor);
        let extra = wanted - 1;

        if after.len() >= extra {
            let mut run = vec![anchor];
            run.extend_from_slice(&after[..extra]);
            return Some(run);
        }

        if before.len() >= extra {
            let mut run = before[before.len() - extra..].to_vec();
            run.push(anchor);
            return Some(run);
        }

        if before.len() + after.len() >= extra {
            let from_above = extra - before.len();
            let mut run = before;
            run.push(anchor);
            run.extend_from_slice(&after[..from_above]);
            return Some(run);
        }

        None
    }

    /// Reserve `wanted` contiguous currently-free ports.
    ///
    /// Claims accumulate across anchors: the kernel tends to hand out nearby
    /// ephemeral ports, so repeated probing grows runs until one of them is
    /// wide enough. On success every port in the returned inclusive range is
    /// left claimed; on failure everything claimed by this checker is
    /// released.
    ///
    /// # Errors
    ///
    /// [`PortError::EmptyRange`] for `wanted == 0`, [`PortError::Bind`] when
    /// the kernel refuses a probe listener, and
    /// [`PortError::NoContiguousRange`] once the attempt budget is spent.
    pub async fn available_range(&mut self, wanted: usize) -> Result<(u16, u16), PortError> {
        if wanted == 0 {
            return Err(PortError::EmptyRange);
        }

        let attempts = wanted.saturating_mul(ATTEMPTS_PER_PORT);
        for _ in 0..attempts {
            let anchor = self.available_port().await.map_err(PortError::Bind)?;
            if let Some(run) = self.check_range(anchor, wanted) {
                return Ok((run[0], run[run.len() - 1]));
            }
        }

        self.release_all();

        Err(PortError::NoContiguousRange { wanted, attempts })
    }
}
