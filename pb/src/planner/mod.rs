//! Query planning
//!
//! Turns free text plus optional prior context into a [`Plan`](crate::domain::Plan)
//! through an ordered cascade of strategies:
//!
//! - follow-up rewriting of the previous statement
//! - off-topic decline
//! - rule matching against the known vocabulary
//! - remote (LLM) planning, before or after the rules
//! - a generic recent-rows fallback

mod error;
pub mod followup;
pub mod offtopic;
pub mod orchestrator;
pub mod remote;
pub mod rules;

pub use error::PlannerError;
pub use followup::{FollowupResolver, Platform};
pub use offtopic::{OffTopicDetector, STEERING_MESSAGE};
pub use orchestrator::{CascadeOptions, PlanOrchestrator, PlanOutcome, Strategy, generic_plan};
pub use remote::{LlmPlanner, PlanRequest, RemotePlanner};
pub use rules::{HELP_TEXT, RuleMatch, RuleMatcher};
