//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::domain::Plan;

/// The previous plan in this thread, given to the model for follow-ups
#[derive(Debug, Clone, Serialize)]
pub struct PriorContext {
    pub statement: String,
    pub answer_type: String,
    pub explanation: String,
}

impl PriorContext {
    /// Context for plans that carry a query; declines give the model nothing to build on
    pub fn from_plan(plan: &Plan) -> Option<Self> {
        let query = plan.query()?;
        Some(Self {
            statement: query.statement.clone(),
            answer_type: plan.shape().as_str().to_string(),
            explanation: query.explanation.clone(),
        })
    }
}

/// A worked question → JSON example
#[derive(Debug, Clone, Serialize)]
pub struct FewShot {
    pub user: String,
    pub json: String,
}

/// Context for rendering the planner template
#[derive(Debug, Clone, Serialize)]
pub struct PlannerPromptContext {
    /// Table description
    pub schema: String,
    /// Previous query, when this may be a follow-up
    pub prior: Option<PriorContext>,
    /// Worked examples
    pub examples: Vec<FewShot>,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.portfoliobot/prompts/`)
    user_dir: Option<PathBuf>,
    /// Repo default directory (e.g., `prompts/`)
    repo_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a new prompt loader rooted at `base`
    ///
    /// Looks for `.portfoliobot/prompts/` and `prompts/` under `base`.
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        debug!(?base, "PromptLoader::new: called");
        let user_dir = base.join(".portfoliobot/prompts");
        let repo_dir = base.join("prompts");

        Self {
            hbs: Self::engine(),
            user_dir: user_dir.is_dir().then_some(user_dir),
            repo_dir: repo_dir.is_dir().then_some(repo_dir),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
            repo_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle quotes in SQL
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `.portfoliobot/prompts/{name}.pmt`
    /// 2. Repo default: `prompts/{name}.pmt`
    /// 3. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        for dir in [&self.user_dir, &self.repo_dir].into_iter().flatten() {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found on disk");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Description of the queryable table
    pub fn schema(&self) -> Result<String> {
        self.load_template("schema").map(|s| s.trim_end().to_string())
    }

    /// Render the planner system prompt
    pub fn render_planner(&self, context: &PlannerPromptContext) -> Result<String> {
        debug!(
            has_prior = context.prior.is_some(),
            example_count = context.examples.len(),
            "PromptLoader::render_planner: called"
        );
        let template = self.load_template("planner")?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template planner: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Query;
    use tempfile::TempDir;

    fn context(prior: Option<PriorContext>) -> PlannerPromptContext {
        PlannerPromptContext {
            schema: "TABLE app_metrics".to_string(),
            prior,
            examples: vec![FewShot {
                user: "how many apps do we have?".to_string(),
                json: r#"{"sql":"SELECT COUNT(DISTINCT app_name) FROM app_metrics WHERE platform='iOS'"}"#.to_string(),
            }],
        }
    }

    #[test]
    fn test_render_planner_without_prior() {
        let rendered = PromptLoader::embedded_only().render_planner(&context(None)).unwrap();

        assert!(rendered.contains("TABLE app_metrics"));
        assert!(rendered.contains("User: how many apps do we have?"));
        // No HTML escaping of quotes
        assert!(rendered.contains("platform='iOS'"));
        assert!(rendered.contains(r#"{"sql":"#));
        assert!(!rendered.contains("Previous query context"));
    }

    #[test]
    fn test_render_planner_with_prior() {
        let plan = Plan::Table(Query::new("SELECT * FROM app_metrics LIMIT 5", "Recent rows.", ""));
        let prior = PriorContext::from_plan(&plan);
        let rendered = PromptLoader::embedded_only().render_planner(&context(prior)).unwrap();

        assert!(rendered.contains("Previous query context"));
        assert!(rendered.contains("SQL: SELECT * FROM app_metrics LIMIT 5"));
        assert!(rendered.contains("Answer type: table"));
        assert!(rendered.contains("Explanation: Recent rows."));
    }

    #[test]
    fn test_prior_context_skips_declines() {
        assert!(PriorContext::from_plan(&Plan::decline("no")).is_none());
    }

    #[test]
    fn test_user_override_wins() {
        let dir = TempDir::new().unwrap();
        let prompts = dir.path().join(".portfoliobot/prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(prompts.join("planner.pmt"), "custom {{schema}}").unwrap();

        let loader = PromptLoader::new(dir.path());
        assert_eq!(loader.render_planner(&context(None)).unwrap(), "custom TABLE app_metrics");
        // Schema still comes from the embedded copy
        assert!(loader.schema().unwrap().contains("app_metrics"));
    }

    #[test]
    fn test_missing_dirs_fall_back_to_embedded() {
        let dir = TempDir::new().unwrap();
        let loader = PromptLoader::new(dir.path());
        assert!(loader.render_planner(&context(None)).unwrap().contains("SQL planner"));
    }
}
