//! RemotePlanner - language-model planning
//!
//! The remote planner is the only strategy that can fail for reasons outside
//! the process (network, quota, malformed model output). Every such failure
//! is a typed error; the orchestrator logs it and moves on.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::domain::{AnswerShape, Plan, Query};
use crate::llm::{CompletionRequest, LlmClient, Message, StopReason};
use crate::prompts::{FewShot, PlannerPromptContext, PriorContext, PromptLoader};

use super::PlannerError;
use super::offtopic::STEERING_MESSAGE;
use super::rules::RuleMatcher;

/// Input to a remote planning call
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    /// Raw user text
    pub text: &'a str,
    /// Plan previously produced in this thread
    pub prior: Option<&'a Plan>,
}

impl<'a> PlanRequest<'a> {
    pub fn new(text: &'a str, prior: Option<&'a Plan>) -> Self {
        Self { text, prior }
    }
}

/// A planner backed by something outside the process
#[async_trait]
pub trait RemotePlanner: Send + Sync {
    /// Produce a plan, or say why it couldn't
    async fn plan(&self, request: &PlanRequest<'_>) -> Result<Plan, PlannerError>;
}

/// Plans by prompting an LLM for a JSON plan
pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    examples: Vec<FewShot>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmPlanner {
    /// Create a planner; the non-decline rules become few-shot examples
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader, rules: &RuleMatcher, config: &LlmConfig) -> Self {
        debug!(max_tokens = config.max_tokens, temperature = config.temperature, "LlmPlanner::new: called");
        Self {
            llm,
            prompts,
            examples: few_shots(rules),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    fn system_prompt(&self, prior: Option<&Plan>) -> Result<String, PlannerError> {
        let schema = self.prompts.schema().map_err(|e| PlannerError::Prompt(e.to_string()))?;
        let context = PlannerPromptContext {
            schema,
            prior: prior.and_then(PriorContext::from_plan),
            examples: self.examples.clone(),
        };
        self.prompts
            .render_planner(&context)
            .map_err(|e| PlannerError::Prompt(e.to_string()))
    }
}

#[async_trait]
impl RemotePlanner for LlmPlanner {
    async fn plan(&self, request: &PlanRequest<'_>) -> Result<Plan, PlannerError> {
        debug!(text = %request.text, has_prior = request.prior.is_some(), "LlmPlanner::plan: called");
        let completion = CompletionRequest {
            system_prompt: self.system_prompt(request.prior)?,
            messages: vec![Message::user(format!(
                "User: {}\nReturn ONLY the JSON.",
                request.text.trim()
            ))],
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        };

        let response = self.llm.complete(completion).await?;
        info!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            total_tokens = response.usage.total(),
            stop_reason = ?response.stop_reason,
            "remote planner responded"
        );
        match response.stop_reason {
            StopReason::MaxTokens => return Err(PlannerError::Truncated),
            StopReason::ContentFilter => return Err(PlannerError::Filtered),
            StopReason::EndTurn => {}
        }
        let raw = response.content.ok_or(PlannerError::EmptyResponse)?;
        parse_plan(&raw)
    }
}

fn few_shots(rules: &RuleMatcher) -> Vec<FewShot> {
    rules
        .rules()
        .iter()
        .filter_map(|rule| {
            let query = rule.plan().query()?;
            let json = serde_json::json!({
                "sql": query.statement,
                "answer_type": rule.plan().shape().as_str(),
                "explanation": query.explanation,
                "assumptions": query.assumptions,
            });
            Some(FewShot {
                user: rule.example.to_string(),
                json: json.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePlan {
    sql: Option<String>,
    answer_type: Option<String>,
    explanation: Option<String>,
    assumptions: Option<String>,
    decline_text: Option<String>,
}

/// Pull the JSON object out of a model reply
///
/// Models wrap JSON in code fences or chat around it; take the outermost
/// `{...}` when anything else is present.
pub fn extract_json(raw: &str) -> &str {
    let mut text = raw.trim().trim_matches('`').trim();
    if let Some(rest) = text.strip_prefix("json") {
        text = rest.trim_start();
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Decode a model reply into a plan
pub fn parse_plan(raw: &str) -> Result<Plan, PlannerError> {
    let json = extract_json(raw);
    if json.is_empty() {
        return Err(PlannerError::EmptyResponse);
    }
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.is_object() {
        return Err(PlannerError::NotAnObject);
    }
    let wire: WirePlan = serde_json::from_value(value)?;

    let shape = wire
        .answer_type
        .as_deref()
        .and_then(AnswerShape::parse)
        .unwrap_or(AnswerShape::Table);
    debug!(%shape, "parse_plan: decoded");

    if shape == AnswerShape::Decline {
        let message = wire
            .decline_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| STEERING_MESSAGE.to_string());
        return Ok(Plan::decline(message));
    }

    let statement = wire
        .sql
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(PlannerError::MissingStatement)?;

    Ok(Plan::with_shape(
        shape,
        Query::new(
            statement,
            wire.explanation.unwrap_or_default(),
            wire.assumptions.unwrap_or_default(),
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{CompletionResponse, Role};

    fn planner(llm: Arc<MockLlmClient>) -> LlmPlanner {
        LlmPlanner::new(
            llm,
            PromptLoader::embedded_only(),
            &RuleMatcher::builtin().unwrap(),
            &LlmConfig::default(),
        )
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"  {"sql":"SELECT 1"}  "#), r#"{"sql":"SELECT 1"}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        let raw = "```json\n{\"sql\": \"SELECT 1\"}\n```";
        assert_eq!(extract_json(raw), "{\"sql\": \"SELECT 1\"}");
    }

    #[test]
    fn test_extract_json_with_chatter() {
        let raw = "Sure! Here is the plan:\n{\"sql\": \"SELECT 1\", \"answer_type\": \"simple\"}\nHope that helps.";
        assert_eq!(extract_json(raw), "{\"sql\": \"SELECT 1\", \"answer_type\": \"simple\"}");
    }

    #[test]
    fn test_parse_plan_scalar() {
        let plan = parse_plan(
            r#"{"sql": " SELECT COUNT(*) FROM app_metrics ", "answer_type": "simple", "explanation": "Counts rows.", "assumptions": "All data."}"#,
        )
        .unwrap();
        assert_eq!(
            plan,
            Plan::Scalar(Query::new("SELECT COUNT(*) FROM app_metrics", "Counts rows.", "All data."))
        );
    }

    #[test]
    fn test_parse_plan_defaults() {
        let plan = parse_plan(r#"{"sql": "SELECT * FROM app_metrics"}"#).unwrap();
        assert_eq!(plan.shape(), AnswerShape::Table);
        assert_eq!(plan.explanation(), "");
        assert_eq!(plan.assumptions(), "");

        // Unknown shapes are presented as tables
        let plan = parse_plan(r#"{"sql": "SELECT 1", "answer_type": "chart"}"#).unwrap();
        assert_eq!(plan.shape(), AnswerShape::Table);
    }

    #[test]
    fn test_parse_plan_decline() {
        let plan = parse_plan(r#"{"answer_type": "decline", "decline_text": "Ask me about apps."}"#).unwrap();
        assert_eq!(plan, Plan::decline("Ask me about apps."));

        let plan = parse_plan(r#"{"answer_type": "decline", "decline_text": "  "}"#).unwrap();
        assert_eq!(plan, Plan::decline(STEERING_MESSAGE));
    }

    #[test]
    fn test_parse_plan_failures() {
        assert!(matches!(parse_plan(""), Err(PlannerError::EmptyResponse)));
        assert!(matches!(parse_plan("not json at all"), Err(PlannerError::Json(_))));
        assert!(matches!(parse_plan("[1, 2, 3]"), Err(PlannerError::NotAnObject)));
        assert!(matches!(
            parse_plan(r#"{"answer_type": "table"}"#),
            Err(PlannerError::MissingStatement)
        ));
        assert!(matches!(
            parse_plan(r#"{"sql": "   ", "answer_type": "simple"}"#),
            Err(PlannerError::MissingStatement)
        ));
    }

    #[test]
    fn test_few_shots_skip_help() {
        let shots = few_shots(&RuleMatcher::builtin().unwrap());
        assert_eq!(shots.len(), 5);
        assert_eq!(shots[0].user, "how many apps do we have?");
        assert!(shots[0].json.contains(r#""answer_type":"simple""#));
        assert!(shots.iter().all(|s| s.user != "help"));
    }

    #[tokio::test]
    async fn test_plan_sends_one_request() {
        let llm = Arc::new(MockLlmClient::replying(
            r#"{"sql": "SELECT SUM(installs) FROM app_metrics", "answer_type": "simple"}"#,
        ));
        let plan = planner(llm.clone())
            .plan(&PlanRequest::new("total installs?", None))
            .await
            .unwrap();

        assert_eq!(plan.statement(), Some("SELECT SUM(installs) FROM app_metrics"));
        assert_eq!(llm.call_count(), 1);

        let request = llm.last_request().unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert!(request.messages[0].content.contains("total installs?"));
        assert!(request.system_prompt.contains("app_metrics"));
        assert!(request.system_prompt.contains("how many apps do we have?"));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_plan_includes_prior_context() {
        let llm = Arc::new(MockLlmClient::replying(r#"{"sql": "SELECT 1"}"#));
        let prior = Plan::Table(Query::new("SELECT country FROM app_metrics", "Countries.", ""));
        planner(llm.clone())
            .plan(&PlanRequest::new("and by platform?", Some(&prior)))
            .await
            .unwrap();

        let request = llm.last_request().unwrap();
        assert!(request.system_prompt.contains("SQL: SELECT country FROM app_metrics"));
    }

    #[tokio::test]
    async fn test_plan_surfaces_llm_errors() {
        let llm = Arc::new(MockLlmClient::failing());
        let err = planner(llm).plan(&PlanRequest::new("anything", None)).await.unwrap_err();
        assert!(matches!(err, PlannerError::Llm(_)));
    }

    #[tokio::test]
    async fn test_plan_empty_content() {
        let mut response = CompletionResponse::text("");
        response.content = None;
        let llm = Arc::new(MockLlmClient::new(vec![response]));
        let err = planner(llm).plan(&PlanRequest::new("anything", None)).await.unwrap_err();
        assert!(matches!(err, PlannerError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_plan_rejects_cut_off_or_filtered_replies() {
        // Parseable JSON, but the model stopped early
        let mut truncated = CompletionResponse::text(r#"{"sql": "SELECT app_name FROM app_metrics"}"#);
        truncated.stop_reason = StopReason::MaxTokens;
        let llm = Arc::new(MockLlmClient::new(vec![truncated]));
        let err = planner(llm.clone()).plan(&PlanRequest::new("anything", None)).await.unwrap_err();
        assert!(matches!(err, PlannerError::Truncated));
        assert_eq!(llm.call_count(), 1);

        let mut filtered = CompletionResponse::text("");
        filtered.stop_reason = StopReason::ContentFilter;
        let llm = Arc::new(MockLlmClient::new(vec![filtered]));
        let err = planner(llm).plan(&PlanRequest::new("anything", None)).await.unwrap_err();
        assert!(matches!(err, PlannerError::Filtered));
    }
}
