//! Plan domain type
//!
//! A plan is the unit of planning output: the statement to run plus the
//! metadata describing how its result should be presented. Declines carry
//! only a message and never a statement.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Presentation category of a plan's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerShape {
    /// A single value (counts, totals)
    #[serde(rename = "simple", alias = "scalar")]
    Scalar,
    /// Multi-row result rendered as a table
    #[serde(rename = "table")]
    Table,
    /// No query; a message steering the user back to supported questions
    #[serde(rename = "decline")]
    Decline,
}

impl AnswerShape {
    /// Wire name used in prompts and model responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scalar => "simple",
            Self::Table => "table",
            Self::Decline => "decline",
        }
    }

    /// Parse a wire name, accepting `scalar` as an alias of `simple`
    pub fn parse(s: &str) -> Option<Self> {
        debug!(%s, "AnswerShape::parse: called");
        match s.trim().to_lowercase().as_str() {
            "simple" | "scalar" => Some(Self::Scalar),
            "table" => Some(Self::Table),
            "decline" => Some(Self::Decline),
            _ => {
                debug!("AnswerShape::parse: unknown shape");
                None
            }
        }
    }
}

impl std::fmt::Display for AnswerShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An executable query with its human-facing explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub statement: String,
    pub explanation: String,
    pub assumptions: String,
}

impl Query {
    pub fn new(statement: impl Into<String>, explanation: impl Into<String>, assumptions: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            explanation: explanation.into(),
            assumptions: assumptions.into(),
        }
    }
}

/// Structured output of the planning pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "answer_type", rename_all = "snake_case")]
pub enum Plan {
    #[serde(rename = "simple")]
    Scalar(Query),
    Table(Query),
    Decline { message: String },
}

impl Plan {
    /// Build a plan of the given shape around a query
    ///
    /// A `Decline` shape has nothing to present, so the query's explanation
    /// becomes the decline message.
    pub fn with_shape(shape: AnswerShape, query: Query) -> Self {
        debug!(%shape, "Plan::with_shape: called");
        match shape {
            AnswerShape::Scalar => Self::Scalar(query),
            AnswerShape::Table => Self::Table(query),
            AnswerShape::Decline => Self::Decline {
                message: query.explanation,
            },
        }
    }

    pub fn decline(message: impl Into<String>) -> Self {
        Self::Decline {
            message: message.into(),
        }
    }

    pub fn shape(&self) -> AnswerShape {
        match self {
            Self::Scalar(_) => AnswerShape::Scalar,
            Self::Table(_) => AnswerShape::Table,
            Self::Decline { .. } => AnswerShape::Decline,
        }
    }

    /// The query behind this plan, if it has one
    pub fn query(&self) -> Option<&Query> {
        match self {
            Self::Scalar(q) | Self::Table(q) => Some(q),
            Self::Decline { .. } => None,
        }
    }

    pub fn statement(&self) -> Option<&str> {
        self.query().map(|q| q.statement.as_str())
    }

    pub fn explanation(&self) -> &str {
        self.query().map(|q| q.explanation.as_str()).unwrap_or("")
    }

    pub fn assumptions(&self) -> &str {
        self.query().map(|q| q.assumptions.as_str()).unwrap_or("")
    }

    pub fn is_decline(&self) -> bool {
        matches!(self, Self::Decline { .. })
    }
}
