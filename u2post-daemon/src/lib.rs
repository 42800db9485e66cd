//! u2post daemon library.
//!
//! Exposes the daemon's building blocks for integration testing.
//! In production, `u2post-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;
pub mod output;
pub mod pid_file;
