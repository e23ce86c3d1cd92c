//! Interactive REPL
//!
//! Stands in for a chat client: each line is a message in the current
//! conversation and thread, and slash commands play the part of buttons.

mod session;

pub use session::{ReplSession, SlashCommand, print_reply};

use std::sync::Arc;

use eyre::Result;

use crate::config::Config;
use crate::handler::ConversationHandler;

/// Run the interactive REPL
///
/// This is the main entry point for `pb repl`.
pub async fn run_interactive(config: &Config) -> Result<()> {
    let handler = Arc::new(ConversationHandler::from_config(config)?);
    let mut session = ReplSession::new(handler, config.summary());
    session.run().await
}
