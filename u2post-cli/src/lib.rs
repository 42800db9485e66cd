//! u2post CLI library
//!
//! The binary in `main.rs` is a thin wrapper; command handlers live here so
//! integration tests can drive them directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
