//! Replies to the conversational client

use std::path::PathBuf;

/// Sent when an export finds nothing cached
pub const NO_EXPORT: &str = "No recent result to export in this thread.";

/// Sent when show-sql finds nothing cached
pub const NO_SQL: &str = "No SQL cached in this thread.";

/// What the handler answers with
///
/// Every outcome, including failures, is a reply; the handler never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// One-line answer for a single value
    Scalar(String),
    /// Explanation, assumptions and a Markdown table
    Table {
        summary: String,
        assumptions: String,
        table: String,
    },
    /// No query was run
    Decline(String),
    /// The query could not be run or the export could not be written
    Failed(String),
    /// The cached statement
    Sql(String),
    /// A CSV file was written
    Exported(PathBuf),
    /// Nothing cached to act on
    NothingCached(&'static str),
}

impl Reply {
    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Failed(_))
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Scalar(text) | Reply::Decline(text) | Reply::Failed(text) => write!(f, "{}", text),
            Reply::Table {
                summary,
                assumptions,
                table,
            } => {
                writeln!(f, "*Result*")?;
                if !summary.is_empty() {
                    writeln!(f, "{}", summary)?;
                }
                if !assumptions.is_empty() {
                    writeln!(f, "_{}_", assumptions)?;
                }
                write!(f, "\n{}", table)
            }
            Reply::Sql(statement) => write!(f, "```\n{}\n```", statement),
            Reply::Exported(path) => write!(f, "Exported CSV to {}", path.display()),
            Reply::NothingCached(message) => write!(f, "{}", message),
        }
    }
}
