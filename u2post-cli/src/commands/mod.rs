//! Command handlers -- one module per subcommand

pub mod config;
pub mod dump;
pub mod extract;
pub mod registry;
pub mod rules;
