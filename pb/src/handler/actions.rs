//! Text actions
//!
//! Some messages ask to act on the last result rather than plan a new
//! query. They are recognized before planning.

use regex::Regex;
use tracing::debug;

use crate::planner::PlannerError;

const EXPORT_PATTERNS: &[&str] = &[
    r"\b(export|download|save|dump)\b.*\bcsv\b",
    r"^export\s+csv$",
    r"^export\s+this\s+as\s+csv$",
    r"^download\s+csv$",
];

const SHOW_SQL_PATTERNS: &[&str] = &[
    r"\b(show|display|print|reveal|view|see)\b.*\bsql\b",
    r"\bsql\b.*\b(used|query|statement)\b",
    r"^sql$",
    r"^show\s+sql$",
    r"^show\s+the\s+sql$",
];

/// An action on the cached result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAction {
    ExportCsv,
    ShowSql,
}

/// Recognizes text actions; export takes precedence over show-sql
#[derive(Debug, Clone)]
pub struct TextActions {
    export: Vec<Regex>,
    show_sql: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

impl TextActions {
    pub fn new() -> Result<Self, PlannerError> {
        Ok(Self {
            export: compile(EXPORT_PATTERNS)?,
            show_sql: compile(SHOW_SQL_PATTERNS)?,
        })
    }

    pub fn detect(&self, text: &str) -> Option<TextAction> {
        let text = text.trim().to_lowercase();
        let action = if self.export.iter().any(|p| p.is_match(&text)) {
            Some(TextAction::ExportCsv)
        } else if self.show_sql.iter().any(|p| p.is_match(&text)) {
            Some(TextAction::ShowSql)
        } else {
            None
        };
        debug!(?action, "TextActions::detect: checked");
        action
    }
}
