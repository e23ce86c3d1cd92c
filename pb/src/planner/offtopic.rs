//! Small-talk and off-topic detection

use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::PlannerError;

/// Reply given when the user wanders off the analytics topic
pub const STEERING_MESSAGE: &str = "I'm focused on the app portfolio analytics. Try questions like:\n\
• how many apps do we have?\n\
• which country generates the most revenue?\n\
• list all iOS apps sorted by popularity\n\
• biggest change in UA spend Jan 2025 vs Dec 2024";

const PATTERNS: &[&str] = &[
    r"^\s*(hi|hello|hey|yo|sup|hiya|good (morning|afternoon|evening))\s*!?$",
    r"^\s*(thanks|thank you|thx)\s*!?$",
    r"\b(joke|weather|news)\b",
];

/// Recognizes greetings, thanks, and a few obviously unrelated topics
#[derive(Debug, Clone)]
pub struct OffTopicDetector {
    patterns: Vec<Regex>,
}

impl OffTopicDetector {
    pub fn new() -> Result<Self, PlannerError> {
        let patterns = PATTERNS
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_off_topic(&self, text: &str) -> bool {
        let hit = self.patterns.iter().any(|p| p.is_match(text.trim()));
        debug!(hit, "OffTopicDetector::is_off_topic: checked");
        hit
    }
}
