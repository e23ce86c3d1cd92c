//! RuleMatcher - ordered pattern → plan templates
//!
//! The built-in vocabulary is evaluated top to bottom and the first match
//! wins. Order matters: later, looser patterns must not shadow earlier,
//! more specific ones.

use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

use crate::domain::{Plan, Query};

use super::PlannerError;

/// Help text listing the supported questions
pub const HELP_TEXT: &str = "I answer analytics about the app portfolio. Try:\n\
• how many apps do we have?\n\
• how many android apps do we have?\n\
• which country generates the most revenue?\n\
• list all iOS apps sorted by their popularity\n\
• biggest change in UA spend Jan 2025 vs Dec 2024";

const UA_SPEND_DELTA_SQL: &str = "SELECT app_name, ua_dec_2024_12 AS ua_dec_2024_12, ua_jan_2025_01 AS ua_jan_2025_01, \
(ua_jan_2025_01 - ua_dec_2024_12) AS delta, \
CASE WHEN ua_dec_2024_12=0 THEN NULL ELSE (ua_jan_2025_01 - ua_dec_2024_12)*1.0/ua_dec_2024_12 END AS pct_change \
FROM ( \
SELECT app_name, \
SUM(CASE WHEN date BETWEEN '2024-12-01' AND '2024-12-31' THEN ua_cost ELSE 0 END) AS ua_dec_2024_12, \
SUM(CASE WHEN date BETWEEN '2025-01-01' AND '2025-01-31' THEN ua_cost ELSE 0 END) AS ua_jan_2025_01 \
FROM app_metrics \
GROUP BY app_name \
) t \
ORDER BY ABS(delta) DESC \
LIMIT 100";

/// One pattern → plan binding
#[derive(Debug, Clone)]
pub struct Rule {
    /// Stable name, used in logs
    pub name: &'static str,
    /// A phrasing this rule answers (also used as a few-shot example)
    pub example: &'static str,
    pattern: Regex,
    plan: Plan,
}

impl Rule {
    fn new(name: &'static str, example: &'static str, pattern: &str, plan: Plan) -> Result<Self, PlannerError> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            name,
            example,
            pattern,
            plan,
        })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.pattern.is_match(normalized)
    }
}

/// A successful rule lookup
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    /// Position of the rule in evaluation order
    pub index: usize,
    pub name: &'static str,
    pub plan: Plan,
}

/// Ordered list of pattern → plan bindings
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
}

impl RuleMatcher {
    /// The built-in question vocabulary, in evaluation order
    pub fn builtin() -> Result<Self, PlannerError> {
        debug!("RuleMatcher::builtin: called");
        let rules = vec![
            Rule::new("help", "help", r"^\s*help\s*$", Plan::decline(HELP_TEXT))?,
            Rule::new(
                "count-apps",
                "how many apps do we have?",
                r"how\s+many\s+apps\s+do\s+we\s+have\??",
                Plan::Scalar(Query::new(
                    "SELECT COUNT(DISTINCT app_name) AS app_count FROM app_metrics;",
                    "Counts distinct app names.",
                    "",
                )),
            )?,
            Rule::new(
                "count-android-apps",
                "how many android apps do we have?",
                r"how\s+many\s+android\s+apps",
                Plan::Scalar(Query::new(
                    "SELECT COUNT(DISTINCT app_name) AS app_count FROM app_metrics WHERE platform='Android';",
                    "Counts distinct Android apps.",
                    "",
                )),
            )?,
            Rule::new(
                "top-revenue-country",
                "which country generates the most revenue?",
                r"which\s+country\s+generates?\s+the\s+most\s+revenue",
                Plan::Table(Query::new(
                    "SELECT country, SUM(in_app_revenue + ads_revenue) AS total_revenue FROM app_metrics \
                     GROUP BY country ORDER BY total_revenue DESC LIMIT 20;",
                    "Ranks countries by total revenue.",
                    "Using all available data.",
                )),
            )?,
            Rule::new(
                "ios-popularity-list",
                "List all iOS apps sorted by their popularity",
                r"list\s+all\s+ios\s+apps.*popularity",
                Plan::Table(Query::new(
                    "SELECT app_name, SUM(installs) AS popularity FROM app_metrics \
                     WHERE platform='iOS' AND date >= date('now','-30 day') \
                     GROUP BY app_name ORDER BY popularity DESC LIMIT 100;",
                    "Popularity defined as installs over last 30 days.",
                    "Popularity=installs(last 30 days).",
                )),
            )?,
            Rule::new(
                "ua-spend-delta",
                "Which apps had the biggest change in UA spend comparing Jan 2025 to Dec 2024?",
                r"biggest\s+change\s+in\s+ua\s+spend.*jan\s*2025.*dec\s*2024",
                Plan::Table(Query::new(
                    UA_SPEND_DELTA_SQL,
                    "Compares monthly UA cost and ranks by absolute change.",
                    "Months fixed to Dec 2024 vs Jan 2025.",
                )),
            )?,
        ];

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Return the plan bound to the first matching pattern
    pub fn find(&self, text: &str) -> Option<RuleMatch> {
        let normalized = normalize(text);
        debug!(%normalized, "RuleMatcher::find: called");

        let (index, rule) = self.rules.iter().enumerate().find(|(_, r)| r.matches(&normalized))?;
        info!(index, rule = rule.name, "rule matched");
        Some(RuleMatch {
            index,
            name: rule.name,
            plan: rule.plan.clone(),
        })
    }
}

/// Trim and lower-case user input
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
