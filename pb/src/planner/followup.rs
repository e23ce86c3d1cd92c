//! FollowupResolver - platform follow-ups on the previous query
//!
//! A follow-up such as "what about android" narrows the previous statement
//! instead of planning from scratch. This is a textual rewrite, not a parse,
//! and it only ever touches the platform dimension.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::PlannerError;

/// Platforms present in the `platform` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    /// Value as stored in the table
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Android => "Android",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rewrites a prior statement for a newly requested platform
#[derive(Debug, Clone)]
pub struct FollowupResolver {
    mention: Regex,
    platform_filter: Regex,
    where_clause: Regex,
    trailing_clause: Regex,
}

fn build(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

impl FollowupResolver {
    pub fn new() -> Result<Self, PlannerError> {
        Ok(Self {
            mention: build(r"\b(ios|android)\b")?,
            platform_filter: build(r"\bplatform\s*=\s*'(?:ios|android)'")?,
            where_clause: build(r"\bwhere\b")?,
            trailing_clause: build(r"\b(?:group\s+by|order\s+by|limit)\b")?,
        })
    }

    /// First platform mentioned in the text, if any
    pub fn detect_platform(&self, text: &str) -> Option<Platform> {
        let m = self.mention.find(text)?;
        if m.as_str().eq_ignore_ascii_case("ios") {
            Some(Platform::Ios)
        } else {
            Some(Platform::Android)
        }
    }

    /// Rewrite `prior` for the platform mentioned in `text`
    ///
    /// Returns `None` when the text names no platform, so the caller can try
    /// other strategies.
    pub fn rewrite(&self, prior: &str, text: &str) -> Option<String> {
        debug!(%prior, %text, "FollowupResolver::rewrite: called");
        let platform = self.detect_platform(text)?;
        let filter = format!("platform='{}'", platform);
        let sql = strip_terminator(prior);

        if self.platform_filter.is_match(sql) {
            debug!(%platform, "FollowupResolver::rewrite: swapping existing platform filter");
            return Some(self.platform_filter.replace_all(sql, filter.as_str()).into_owned());
        }

        if let Some(m) = self.where_clause.find(sql) {
            debug!(%platform, "FollowupResolver::rewrite: conjoining into WHERE");
            let rest = &sql[m.end()..];
            let end = self.predicate_end(rest);
            let mut out = format!(
                "{}{} {} AND ({})",
                &sql[..m.start()],
                m.as_str(),
                filter,
                rest[..end].trim()
            );
            let tail = rest[end..].trim_start();
            if !tail.is_empty() {
                out.push(' ');
                out.push_str(tail);
            }
            return Some(out);
        }

        if let Some(m) = self.trailing_clause.find(sql) {
            debug!(%platform, clause = m.as_str(), "FollowupResolver::rewrite: inserting WHERE before clause");
            return Some(format!("{} WHERE {} {}", sql[..m.start()].trim_end(), filter, &sql[m.start()..]));
        }

        debug!(%platform, "FollowupResolver::rewrite: appending WHERE");
        Some(format!("{} WHERE {}", sql, filter))
    }

    /// Byte offset where the predicate following a WHERE ends
    ///
    /// The predicate stops at a GROUP BY, ORDER BY or LIMIT at its own
    /// nesting level, or at the `)` closing an enclosing subquery.
    fn predicate_end(&self, rest: &str) -> usize {
        let close = unmatched_close(rest).unwrap_or(rest.len());
        let scope = &rest[..close];
        self.trailing_clause
            .find_iter(scope)
            .find(|m| at_top_level(&scope[..m.start()]))
            .map_or(close, |m| m.start())
    }
}

/// Offset of the first `)` with no matching `(`, skipping quoted text
fn unmatched_close(sql: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut quoted = false;
    for (i, c) in sql.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// True when the end of `prefix` is outside quotes and parentheses
fn at_top_level(prefix: &str) -> bool {
    let mut depth = 0i32;
    let mut quoted = false;
    for c in prefix.chars() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            _ => {}
        }
    }
    depth == 0 && !quoted
}

/// Trim and drop at most one trailing `;`
pub fn strip_terminator(sql: &str) -> &str {
    let sql = sql.trim();
    match sql.strip_suffix(';') {
        Some(stripped) => stripped.trim_end(),
        None => sql,
    }
}
