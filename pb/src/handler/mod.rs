//! ConversationHandler - one message in, one reply out
//!
//! Composes the session cache, planner, execution gate, access policy,
//! rendering and export. Nothing here returns an error to the caller: every
//! failure becomes a reply.

mod actions;
mod reply;

use std::path::PathBuf;
use std::sync::Arc;

use eyre::Result;
use tracing::{debug, info, warn};

use crate::authz::AccessPolicy;
use crate::cache::{CachedResult, SessionCache, SessionKey};
use crate::config::Config;
use crate::domain::{Plan, QueryResult};
use crate::llm::create_client;
use crate::planner::{LlmPlanner, PlanOrchestrator, PlannerError, RemotePlanner, RuleMatcher};
use crate::prompts::PromptLoader;
use crate::render::{CsvExporter, markdown_table, scalar_sentence};
use crate::store::ExecutionGate;

pub use actions::{TextAction, TextActions};
pub use reply::{NO_EXPORT, NO_SQL, Reply};

/// Longest store or export error shown to the user
const MAX_ERROR_CHARS: usize = 500;

/// A message from the conversational client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub conversation_id: String,
    pub thread_id: String,
    pub user_id: String,
    pub text: String,
}

impl Inbound {
    pub fn new(
        conversation_id: impl Into<String>,
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            text: text.into(),
        }
    }
}

/// Handles messages for every conversation; share it behind an `Arc`
pub struct ConversationHandler {
    cache: Arc<SessionCache>,
    planner: PlanOrchestrator,
    gate: ExecutionGate,
    access: AccessPolicy,
    exporter: CsvExporter,
    actions: TextActions,
    max_rows: usize,
}

impl ConversationHandler {
    pub fn new(config: &Config, planner: PlanOrchestrator, cache: Arc<SessionCache>) -> Result<Self, PlannerError> {
        debug!(strategies = ?planner.strategies(), "ConversationHandler::new: called");
        Ok(Self {
            cache,
            planner,
            gate: ExecutionGate::new(&config.store.db_path),
            access: AccessPolicy::from_config(&config.access),
            exporter: CsvExporter::new(&config.store.export_dir),
            actions: TextActions::new()?,
            max_rows: config.render.max_rows,
        })
    }

    /// Wire up the full pipeline from configuration
    ///
    /// Remote planning is enabled only when an API key is present and the
    /// client can be built; otherwise the cascade runs without it.
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!("ConversationHandler::from_config: called");
        let rules = RuleMatcher::builtin()?;
        let remote = remote_planner(config, &rules);
        let planner = PlanOrchestrator::from_config(config, rules, remote)?;
        let cache = Arc::new(SessionCache::new(config.cache.ttl()));
        Ok(Self::new(config, planner, cache)?)
    }

    pub fn planner(&self) -> &PlanOrchestrator {
        &self.planner
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Answer one message
    pub async fn handle(&self, inbound: &Inbound) -> Reply {
        debug!(
            conversation = %inbound.conversation_id,
            thread = %inbound.thread_id,
            user = %inbound.user_id,
            text = %inbound.text,
            "ConversationHandler::handle: called"
        );

        match self.actions.detect(&inbound.text) {
            Some(TextAction::ExportCsv) => {
                let cached = self.lookup(&inbound.conversation_id, &inbound.thread_id, true);
                return self.export_cached(cached);
            }
            Some(TextAction::ShowSql) => {
                let cached = self.lookup(&inbound.conversation_id, &inbound.thread_id, true);
                return sql_reply(cached);
            }
            None => {}
        }

        let thread_key = SessionKey::thread(&inbound.conversation_id, &inbound.thread_id);
        let prior = self.cache.get(&thread_key).map(|c| c.plan);
        let outcome = self.planner.plan(&inbound.text, prior.as_ref()).await;

        let statement = match &outcome.plan {
            Plan::Decline { message } => return Reply::Decline(message.clone()),
            Plan::Scalar(query) | Plan::Table(query) => query.statement.clone(),
        };

        let result = match self.gate.execute_async(&statement).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, strategy = %outcome.strategy, %statement, "query failed");
                return Reply::Failed(format!("Sorry, I couldn't run that query: {}", bounded(&e.to_string())));
            }
        };
        let result = self.access.filter(&inbound.user_id, result);
        info!(
            strategy = %outcome.strategy,
            rows = result.row_count(),
            "answered"
        );

        let reply = self.render(&outcome.plan, &result);
        let cached = CachedResult {
            plan: outcome.plan,
            result,
            statement,
        };
        self.cache.set(SessionKey::last_result(&inbound.conversation_id), cached.clone());
        self.cache.set(thread_key, cached);
        reply
    }

    /// Export the result cached for this thread (button/slash equivalent)
    pub fn export(&self, conversation_id: &str, thread_id: &str) -> Reply {
        debug!(%conversation_id, %thread_id, "ConversationHandler::export: called");
        self.export_cached(self.lookup(conversation_id, thread_id, false))
    }

    /// Show the statement cached for this thread (button/slash equivalent)
    pub fn show_sql(&self, conversation_id: &str, thread_id: &str) -> Reply {
        debug!(%conversation_id, %thread_id, "ConversationHandler::show_sql: called");
        sql_reply(self.lookup(conversation_id, thread_id, false))
    }

    fn lookup(&self, conversation_id: &str, thread_id: &str, fall_back: bool) -> Option<CachedResult> {
        let hit = self.cache.get(&SessionKey::thread(conversation_id, thread_id));
        if hit.is_some() || !fall_back {
            return hit;
        }
        debug!(%conversation_id, "ConversationHandler::lookup: falling back to last result");
        self.cache.get(&SessionKey::last_result(conversation_id))
    }

    fn export_cached(&self, cached: Option<CachedResult>) -> Reply {
        let Some(cached) = cached else {
            return Reply::NothingCached(NO_EXPORT);
        };
        match self.exporter.export(&cached.result) {
            Ok(path) => Reply::Exported(path),
            Err(e) => {
                warn!(error = %e, "export failed");
                Reply::Failed(format!("Sorry, I couldn't export that result: {}", bounded(&e.to_string())))
            }
        }
    }

    fn render(&self, plan: &Plan, result: &QueryResult) -> Reply {
        if let (Plan::Scalar(_), Some(sentence)) = (plan, scalar_sentence(result)) {
            return Reply::Scalar(sentence);
        }
        Reply::Table {
            summary: plan.explanation().to_string(),
            assumptions: plan.assumptions().to_string(),
            table: markdown_table(result, self.max_rows),
        }
    }
}

fn remote_planner(config: &Config, rules: &RuleMatcher) -> Option<Arc<dyn RemotePlanner>> {
    if !config.llm.remote_enabled() {
        info!(env = %config.llm.api_key_env, "no API key; remote planning disabled");
        return None;
    }
    match create_client(&config.llm) {
        Ok(llm) => {
            let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            let planner = LlmPlanner::new(llm, PromptLoader::new(base), rules, &config.llm);
            info!(model = %config.llm.model, remote_first = config.llm.remote_first, "remote planning enabled");
            Some(Arc::new(planner))
        }
        Err(e) => {
            warn!(error = %e, "remote planning disabled");
            None
        }
    }
}

fn sql_reply(cached: Option<CachedResult>) -> Reply {
    match cached {
        Some(cached) => Reply::Sql(cached.statement),
        None => Reply::NothingCached(NO_SQL),
    }
}

/// Cap a message at `MAX_ERROR_CHARS` characters
fn bounded(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_CHARS) {
        Some((idx, _)) => format!("{}…", &message[..idx]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Query, Value};
    use crate::planner::{CascadeOptions, PlanRequest, STEERING_MESSAGE, Strategy};
    use crate::store::seed::{MetricRow, create_schema, insert_rows};
    use async_trait::async_trait;
    use tempfile::TempDir;

    const APPS: &[&str] = &["Paint Pro", "Countdown", "FitTrack", "NoteMaster", "BudgetBuddy", "QR Scaner", "TimerX"];

    struct FixedRemote(Plan);

    #[async_trait]
    impl RemotePlanner for FixedRemote {
        async fn plan(&self, _request: &PlanRequest<'_>) -> Result<Plan, PlannerError> {
            Ok(self.0.clone())
        }
    }

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.store.db_path = dir.path().join("rounds.db");
        config.store.export_dir = dir.path().join("exports");
        config.access.admin_user_ids = vec!["ADMIN".to_string()];
        config
    }

    fn seed(config: &Config) {
        let mut conn = rusqlite::Connection::open(&config.store.db_path).unwrap();
        create_schema(&conn).unwrap();
        let rows: Vec<_> = APPS
            .iter()
            .enumerate()
            .flat_map(|(i, app)| {
                [
                    MetricRow::new(app, "iOS", "2025-01-01", "US", 100 + i as i64, 10.0, 2.0, 4.0),
                    MetricRow::new(app, "Android", "2025-01-02", "DE", 200 + i as i64, 12.0, 3.0, 5.0),
                ]
            })
            .collect();
        insert_rows(&mut conn, &rows).unwrap();
    }

    fn handler_with(dir: &TempDir, remote: Option<Plan>) -> ConversationHandler {
        let config = config(dir);
        seed(&config);
        let remote = remote.map(|p| Arc::new(FixedRemote(p)) as Arc<dyn RemotePlanner>);
        let options = CascadeOptions {
            followup: true,
            rules: true,
            remote: remote.is_some(),
            remote_first: true,
        };
        let planner = PlanOrchestrator::new(options, RuleMatcher::builtin().unwrap(), remote).unwrap();
        ConversationHandler::new(&config, planner, Arc::new(SessionCache::new(config.cache.ttl()))).unwrap()
    }

    fn handler(dir: &TempDir) -> ConversationHandler {
        handler_with(dir, None)
    }

    fn ask(text: &str) -> Inbound {
        Inbound::new("C1", "T1", "ADMIN", text)
    }

    #[tokio::test]
    async fn test_count_apps_end_to_end() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir);

        let reply = h.handle(&ask("how many apps do we have?")).await;
        assert_eq!(reply, Reply::Scalar("We currently track *7* apps.".to_string()));

        let cached = h.cache().get(&SessionKey::thread("C1", "T1")).unwrap();
        assert_eq!(cached.result.rows, vec![vec![Value::Integer(7)]]);
        assert_eq!(cached.statement, "SELECT COUNT(DISTINCT app_name) AS app_count FROM app_metrics;");
        assert_eq!(h.cache().get(&SessionKey::last_result("C1")), Some(cached));
    }

    #[tokio::test]
    async fn test_generic_fallback_renders_table() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir);

        let reply = h.handle(&ask("blorp")).await;
        match reply {
            Reply::Table { summary, table, .. } => {
                assert_eq!(summary, "Generic recent rows.");
                assert!(table.starts_with("| app_name | platform | date |"));
                assert!(table.contains("_…plus 4 more rows_"));
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_decline_does_not_touch_cache() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir);

        assert_eq!(h.handle(&ask("hello")).await, Reply::Decline(STEERING_MESSAGE.to_string()));
        assert!(h.cache().is_empty());
    }

    #[tokio::test]
    async fn test_non_admin_loses_ua_cost() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir);

        h.handle(&Inbound::new("C1", "T1", "U999", "something unknown")).await;
        let cached = h.cache().get(&SessionKey::thread("C1", "T1")).unwrap();
        assert!(!cached.result.columns.iter().any(|c| c == "ua_cost"));
        assert!(cached.result.columns.iter().any(|c| c == "total_revenue"));

        h.handle(&ask("something unknown")).await;
        let cached = h.cache().get(&SessionKey::thread("C1", "T1")).unwrap();
        assert!(cached.result.columns.iter().any(|c| c == "ua_cost"));
    }

    #[tokio::test]
    async fn test_followup_uses_thread_prior() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir);

        h.handle(&ask("how many apps do we have?")).await;
        let reply = h.handle(&ask("what about android")).await;
        assert_eq!(reply, Reply::Scalar("We currently track *7* apps.".to_string()));
        let cached = h.cache().get(&SessionKey::thread("C1", "T1")).unwrap();
        assert!(cached.statement.ends_with("WHERE platform='Android'"));

        // Another thread has no prior, so the same text is not a follow-up
        h.handle(&Inbound::new("C1", "T2", "ADMIN", "what about android")).await;
        let other = h.cache().get(&SessionKey::thread("C1", "T2")).unwrap();
        assert_eq!(other.plan.explanation(), "Generic recent rows.");
    }

    #[tokio::test]
    async fn test_unsafe_remote_statement_fails_gracefully() {
        let dir = TempDir::new().unwrap();
        let bad = Plan::Table(Query::new("SELECT 1; DROP TABLE app_metrics", "", ""));
        let h = handler_with(&dir, Some(bad));

        let reply = h.handle(&ask("drop everything")).await;
        assert!(reply.is_failure());
        assert!(reply.to_string().starts_with("Sorry, I couldn't run that query: Unsafe SQL"));
        assert!(h.cache().is_empty());
    }

    #[tokio::test]
    async fn test_execution_error_is_bounded() {
        let dir = TempDir::new().unwrap();
        let long_name = "x".repeat(2000);
        let bad = Plan::Table(Query::new(format!("SELECT {} FROM app_metrics", long_name), "", ""));
        let h = handler_with(&dir, Some(bad));

        let reply = h.handle(&ask("anything")).await.to_string();
        let prefix = "Sorry, I couldn't run that query: ";
        assert!(reply.starts_with(prefix));
        assert!(reply.chars().count() <= prefix.chars().count() + MAX_ERROR_CHARS + 1);
    }

    #[tokio::test]
    async fn test_text_actions_fall_back_to_last_result() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir);

        assert_eq!(h.handle(&ask("show sql")).await, Reply::NothingCached(NO_SQL));
        assert_eq!(h.handle(&ask("export csv")).await, Reply::NothingCached(NO_EXPORT));

        h.handle(&ask("how many apps do we have?")).await;

        // A different thread in the same conversation sees the last result
        let reply = h.handle(&Inbound::new("C1", "T9", "ADMIN", "show the sql")).await;
        assert_eq!(
            reply,
            Reply::Sql("SELECT COUNT(DISTINCT app_name) AS app_count FROM app_metrics;".to_string())
        );

        match h.handle(&Inbound::new("C1", "T9", "ADMIN", "export this as csv")).await {
            Reply::Exported(path) => {
                let content = std::fs::read_to_string(path).unwrap();
                assert_eq!(content, "app_count\n7\n");
            }
            other => panic!("expected export, got {:?}", other),
        }

        // Other conversations see nothing
        let reply = h.handle(&Inbound::new("C2", "T1", "ADMIN", "sql")).await;
        assert_eq!(reply, Reply::NothingCached(NO_SQL));
    }

    #[tokio::test]
    async fn test_direct_actions_are_thread_scoped() {
        let dir = TempDir::new().unwrap();
        let h = handler(&dir);
        h.handle(&ask("how many apps do we have?")).await;

        assert!(matches!(h.show_sql("C1", "T1"), Reply::Sql(_)));
        assert!(matches!(h.export("C1", "T1"), Reply::Exported(_)));
        assert_eq!(h.show_sql("C1", "T9"), Reply::NothingCached(NO_SQL));
        assert_eq!(h.export("C1", "T9"), Reply::NothingCached(NO_EXPORT));
    }

    #[tokio::test]
    async fn test_missing_store_is_a_failed_reply() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.store.db_path = dir.path().join("missing.db");
        let h = ConversationHandler::new(
            &config,
            PlanOrchestrator::new(
                CascadeOptions {
                    followup: true,
                    rules: true,
                    remote: false,
                    remote_first: true,
                },
                RuleMatcher::builtin().unwrap(),
                None,
            )
            .unwrap(),
            Arc::new(SessionCache::new(config.cache.ttl())),
        )
        .unwrap();

        assert!(h.handle(&ask("how many apps do we have?")).await.is_failure());
    }

    #[test]
    fn test_bounded() {
        assert_eq!(bounded("short"), "short");
        let long = "é".repeat(600);
        let out = bounded(&long);
        assert_eq!(out.chars().count(), MAX_ERROR_CHARS + 1);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn test_from_config_without_key_has_no_remote() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.llm.api_key_env = "PORTFOLIOBOT_TEST_MISSING_KEY".to_string();
        let h = ConversationHandler::from_config(&config).unwrap();
        assert!(!h.planner().strategies().contains(&Strategy::Remote));
    }
}
