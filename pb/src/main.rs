//! pb - conversational analytics over the app portfolio
//!
//! CLI entry point: interactive REPL, one-shot questions, store seeding.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use portfoliobot::cli::{Cli, Command};
use portfoliobot::config::Config;
use portfoliobot::handler::{ConversationHandler, Inbound};
use portfoliobot::repl;
use portfoliobot::store::seed_database;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can be traced
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portfoliobot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("portfoliobot.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

async fn ask(config: &Config, text: String, user: String, conversation: String, thread: String) -> Result<()> {
    debug!(%text, %user, %conversation, %thread, "ask: called");
    let handler = ConversationHandler::from_config(config).context("Failed to build handler")?;
    let reply = handler.handle(&Inbound::new(conversation, thread, user, text)).await;
    repl::print_reply(&reply);
    if reply.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

fn seed(config: &Config, db: Option<PathBuf>) -> Result<()> {
    let path = db.unwrap_or_else(|| config.store.db_path.clone());
    debug!(?path, "seed: called");
    let summary = seed_database(&path)?;
    println!("Seeded {} rows into {}", summary.rows, summary.path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        model = %config.llm.model,
        remote = config.llm.remote_enabled(),
        db = %config.store.db_path.display(),
        "portfoliobot loaded config"
    );

    match cli.command {
        None | Some(Command::Repl) => repl::run_interactive(&config).await,
        Some(Command::Ask {
            text,
            user,
            conversation,
            thread,
        }) => ask(&config, text.join(" "), user, conversation, thread).await,
        Some(Command::Seed { db }) => seed(&config, db),
        Some(Command::Config) => {
            println!("{}", serde_json::to_string_pretty(&config.summary())?);
            Ok(())
        }
    }
}
