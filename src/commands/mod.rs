//! CLI command implementations for speedtest-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `test`: Run speed tests from the terminal
//! - `servers`: List discovered servers
//! - `config`: Configuration file generation

pub mod config;
pub mod servers;
pub mod test;

// Re-export command functions
pub use config::command_config;
pub use servers::command_servers;
pub use test::command_test;
