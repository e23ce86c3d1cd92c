//! portfoliobot - conversational analytics over the app portfolio
//!
//! Answers free-text questions about a single metrics table by planning a
//! SQL query, running it read-only against SQLite, and formatting the result
//! for a chat-style client.
//!
//! # Core Concepts
//!
//! - **Strategy cascade**: follow-up rewrite, off-topic decline, rules,
//!   remote LLM planning and a generic fallback, in a fixed order
//! - **Session cache**: the last result per thread (and per conversation)
//!   feeds follow-ups, exports and show-sql
//! - **Execution gate**: statements are screened and run on a read-only
//!   connection
//!
//! # Modules
//!
//! - [`planner`] - Strategy cascade, rules, follow-ups and the remote planner
//! - [`cache`] - TTL session cache
//! - [`store`] - Execution gate and demo data
//! - [`handler`] - Request pipeline and text actions
//! - [`llm`] - LLM client trait and OpenAI implementation
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod authz;
pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod handler;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod render;
pub mod repl;
pub mod store;

// Re-export commonly used types
pub use authz::AccessPolicy;
pub use cache::{CachedResult, SessionCache, SessionKey, ThreadKey};
pub use config::{Config, LlmConfig};
pub use domain::{AnswerShape, Plan, Query, QueryResult, Value};
pub use handler::{ConversationHandler, Inbound, Reply};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use planner::{
    FollowupResolver, LlmPlanner, PlanOrchestrator, PlanOutcome, PlanRequest, PlannerError, RemotePlanner,
    RuleMatcher, Strategy,
};
pub use prompts::PromptLoader;
pub use render::CsvExporter;
pub use store::{ExecutionGate, GateError};
