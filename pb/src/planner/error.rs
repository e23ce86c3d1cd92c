//! Planner error types

use thiserror::Error;

use crate::llm::LlmError;

/// Why a planning strategy could not produce a plan
///
/// None of these escape the orchestrator: each one just means the strategy
/// declined and the cascade moves on.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Model response was cut off at the token limit")]
    Truncated,

    #[error("Model response was withheld by the content filter")]
    Filtered,

    #[error("Model response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model response is not a JSON object")]
    NotAnObject,

    #[error("Model response has no usable statement")]
    MissingStatement,

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
