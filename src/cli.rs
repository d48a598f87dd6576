//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// TripAgent - plan multi-day city trips from a natural-language request
#[derive(Debug, Parser)]
#[command(name = "tripagent", version, about)]
pub struct Cli {
    /// Path to a config file (default: ./tripagent.yml, then user config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan a trip from a free-form request
    Plan {
        /// The request, e.g. "Beijing 4 days, history+food, budget 600/day"
        message: String,

        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// Continue a session conversationally
    Chat {
        /// Session id from an earlier plan
        session: String,

        /// Follow-up message or edit request
        message: String,

        /// Edit patch as inline JSON, e.g.
        /// '{"replace_stop":{"day_number":1,"old_poi":"A","new_poi":"B"}}'
        #[arg(long)]
        edit: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// Print the effective configuration and provider selection
    CheckConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable markdown
    Markdown,
    /// Full response as JSON
    Json,
}
