//! mpiports library: contiguous port reservation and mpirun supervision.
//!
//! Exposed as a library so integration tests can drive the pieces directly.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod application;
pub mod cli;
pub mod domain;
pub mod infra;
pub mod mpirun;
pub mod output;
pub mod port;
pub mod retry;
