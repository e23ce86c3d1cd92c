//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pb - conversational analytics over the app portfolio
#[derive(Debug, Parser)]
#[command(
    name = "pb",
    about = "Ask analytics questions about the app portfolio in plain English",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (defaults to the interactive REPL)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive session
    Repl,

    /// Ask a single question and print the answer
    Ask {
        /// The question
        #[arg(required = true, num_args = 1.., value_name = "TEXT")]
        text: Vec<String>,

        /// User asking (decides column access)
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Conversation id
        #[arg(long, default_value = "cli")]
        conversation: String,

        /// Thread id within the conversation
        #[arg(short, long, default_value = "main")]
        thread: String,
    },

    /// Create the store and fill it with the demo portfolio
    Seed {
        /// Store path (defaults to store.db-path from config)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print the effective planning configuration as JSON
    Config,
}
