//! REPL session management

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;
use uuid::Uuid;

use crate::handler::{ConversationHandler, Inbound, Reply};

const DEFAULT_THREAD: &str = "main";
const DEFAULT_USER: &str = "local";

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Quit,
    Thread(String),
    NewConversation,
    User(String),
    Export,
    Sql,
    Config,
    /// Recognized command missing its argument
    MissingArgument(&'static str),
    Unknown(String),
}

impl SlashCommand {
    pub fn parse(input: &str) -> Self {
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let arg = parts.next().map(str::to_string);

        match (cmd, arg) {
            ("/help" | "/h", _) => Self::Help,
            ("/quit" | "/q" | "/exit", _) => Self::Quit,
            ("/thread" | "/t", Some(id)) => Self::Thread(id),
            ("/thread" | "/t", None) => Self::MissingArgument("/thread <id>"),
            ("/new", _) => Self::NewConversation,
            ("/user" | "/u", Some(id)) => Self::User(id),
            ("/user" | "/u", None) => Self::MissingArgument("/user <id>"),
            ("/export", _) => Self::Export,
            ("/sql", _) => Self::Sql,
            ("/config", _) => Self::Config,
            (other, _) => Self::Unknown(other.to_string()),
        }
    }
}

enum SlashResult {
    Continue,
    Quit,
}

/// Interactive REPL session
pub struct ReplSession {
    handler: Arc<ConversationHandler>,
    config_summary: serde_json::Value,
    conversation_id: String,
    thread_id: String,
    user_id: String,
}

impl ReplSession {
    pub fn new(handler: Arc<ConversationHandler>, config_summary: serde_json::Value) -> Self {
        Self {
            handler,
            config_summary,
            conversation_id: new_conversation_id(),
            thread_id: DEFAULT_THREAD.to_string(),
            user_id: DEFAULT_USER.to_string(),
        }
    }

    /// Run the REPL main loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let prompt = format!("{} ", format!("[{}]>", self.thread_id).bright_green());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input) {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        let inbound = Inbound::new(&self.conversation_id, &self.thread_id, &self.user_id, input);
                        let reply = self.handler.handle(&inbound).await;
                        print_reply(&reply);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Portfolio Analytics REPL".bright_cyan().bold());
        println!("Conversation: {}", self.conversation_id.dimmed());
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let command = SlashCommand::parse(input);
        debug!(?command, "ReplSession::handle_slash_command: called");

        match command {
            SlashCommand::Help => self.print_help(),
            SlashCommand::Quit => return SlashResult::Quit,
            SlashCommand::Thread(id) => {
                println!("{} {}", "Switched to thread".dimmed(), id.yellow());
                self.thread_id = id;
            }
            SlashCommand::NewConversation => {
                self.conversation_id = new_conversation_id();
                self.thread_id = DEFAULT_THREAD.to_string();
                println!("{} {}", "New conversation".dimmed(), self.conversation_id.yellow());
            }
            SlashCommand::User(id) => {
                println!("{} {}", "Acting as user".dimmed(), id.yellow());
                self.user_id = id;
            }
            SlashCommand::Export => print_reply(&self.handler.export(&self.conversation_id, &self.thread_id)),
            SlashCommand::Sql => print_reply(&self.handler.show_sql(&self.conversation_id, &self.thread_id)),
            SlashCommand::Config => match serde_json::to_string_pretty(&self.config_summary) {
                Ok(json) => println!("{}", json),
                Err(e) => println!("{} {}", "!".red(), e),
            },
            SlashCommand::MissingArgument(usage) => {
                println!("{} Usage: {}", "?".yellow(), usage);
            }
            SlashCommand::Unknown(cmd) => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
            }
        }
        SlashResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Exit the REPL", "/quit".yellow());
        println!("  {:14} Switch to another thread", "/thread <id>".yellow());
        println!("  {:14} Start a new conversation", "/new".yellow());
        println!("  {:14} Act as another user", "/user <id>".yellow());
        println!("  {:14} Export this thread's result as CSV", "/export".yellow());
        println!("  {:14} Show this thread's SQL", "/sql".yellow());
        println!("  {:14} Show the effective configuration", "/config".yellow());
        println!();
        println!("{}", "Try asking:".bright_cyan());
        println!("  how many apps do we have?");
        println!("  which country generates the most revenue?");
        println!("  what about android");
        println!("  export this as csv");
        println!();
    }
}

fn new_conversation_id() -> String {
    Uuid::now_v7().to_string()
}

/// Print a reply with a color for its kind
pub fn print_reply(reply: &Reply) {
    let text = reply.to_string();
    match reply {
        Reply::Failed(_) => println!("{}", text.red()),
        Reply::Decline(_) | Reply::NothingCached(_) => println!("{}", text.yellow()),
        Reply::Sql(_) | Reply::Exported(_) => println!("{}", text.cyan()),
        Reply::Scalar(_) | Reply::Table { .. } => println!("{}", text),
    }
    println!();
}
