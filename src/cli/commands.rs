//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Address agent - watches address resources and tracks their readiness.
#[derive(Parser, Debug)]
#[command(name = "address-agent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "ADDRESS_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch address resources and print change notifications.
    Watch {
        /// Stop after this many notifications.
        #[arg(long)]
        max_events: Option<usize>,
    },

    /// List the currently defined addresses.
    Addresses {
        /// Only show ready addresses.
        #[arg(long)]
        ready: bool,
    },

    /// Create an address.
    Create {
        /// The address.
        #[arg(short, long)]
        address: String,

        /// Address type (queue, topic, anycast, multicast, subscription).
        #[arg(short = 't', long = "type")]
        address_type: String,

        /// Plan name.
        #[arg(short, long)]
        plan: String,

        /// Topic of a subscription address.
        #[arg(long)]
        topic: Option<String>,
    },

    /// Delete an address.
    Delete {
        /// The address.
        #[arg(short, long)]
        address: String,

        /// Name of the address document, if it differs from the derived one.
        #[arg(long)]
        name: Option<String>,
    },

    /// List the address types permitted by the address space plan.
    Types {
        /// Address space plan, overriding the configured one.
        #[arg(long)]
        plan: Option<String>,
    },

    /// Apply broker propagation stats and update address readiness.
    CheckStatus {
        /// JSON file mapping each address to `{"propagated": <0-100>}`.
        #[arg(long)]
        stats: PathBuf,
    },

    /// Validate the agent configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
