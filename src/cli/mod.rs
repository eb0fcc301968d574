//! CLI module for the address agent.
//!
//! This module provides the command-line interface for running the agent
//! and managing addresses.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
