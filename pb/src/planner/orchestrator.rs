//! PlanOrchestrator - the strategy cascade
//!
//! Strategies run strictly in list order and the first one that produces a
//! plan commits. The list always ends with `Generic`, so planning never
//! fails.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{Plan, Query};

use super::PlannerError;
use super::followup::FollowupResolver;
use super::offtopic::{OffTopicDetector, STEERING_MESSAGE};
use super::remote::{PlanRequest, RemotePlanner};
use super::rules::RuleMatcher;

/// Fallback when nothing recognizes the question
pub const GENERIC_SQL: &str = "SELECT app_name, platform, date, country, installs, \
in_app_revenue + ads_revenue AS total_revenue, ua_cost FROM app_metrics ORDER BY date DESC LIMIT 100;";

/// One step of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Followup,
    OffTopic,
    Remote,
    Rules,
    Generic,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Followup => "followup",
            Strategy::OffTopic => "off-topic",
            Strategy::Remote => "remote",
            Strategy::Rules => "rules",
            Strategy::Generic => "generic",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which strategies run, and in which order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOptions {
    pub followup: bool,
    pub rules: bool,
    pub remote: bool,
    pub remote_first: bool,
}

impl CascadeOptions {
    pub fn strategies(&self) -> Vec<Strategy> {
        let mut list = Vec::with_capacity(5);
        if self.followup {
            list.push(Strategy::Followup);
        }
        list.push(Strategy::OffTopic);
        if self.remote && self.remote_first {
            list.push(Strategy::Remote);
        }
        if self.rules {
            list.push(Strategy::Rules);
        }
        if self.remote && !self.remote_first {
            list.push(Strategy::Remote);
        }
        list.push(Strategy::Generic);
        list
    }
}

/// A committed plan and the strategy that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub plan: Plan,
    pub strategy: Strategy,
}

/// Runs the strategy cascade for one request
pub struct PlanOrchestrator {
    strategies: Vec<Strategy>,
    followup: FollowupResolver,
    offtopic: OffTopicDetector,
    rules: RuleMatcher,
    remote: Option<Arc<dyn RemotePlanner>>,
}

impl PlanOrchestrator {
    pub fn new(
        options: CascadeOptions,
        rules: RuleMatcher,
        remote: Option<Arc<dyn RemotePlanner>>,
    ) -> Result<Self, PlannerError> {
        let options = CascadeOptions {
            remote: options.remote && remote.is_some(),
            ..options
        };
        let strategies = options.strategies();
        debug!(?strategies, "PlanOrchestrator::new: called");

        Ok(Self {
            strategies,
            followup: FollowupResolver::new()?,
            offtopic: OffTopicDetector::new()?,
            rules,
            remote,
        })
    }

    /// Build the cascade described by the configuration
    pub fn from_config(
        config: &Config,
        rules: RuleMatcher,
        remote: Option<Arc<dyn RemotePlanner>>,
    ) -> Result<Self, PlannerError> {
        let options = CascadeOptions {
            followup: config.planner.followup,
            rules: config.planner.rules,
            remote: remote.is_some(),
            remote_first: config.llm.remote_first,
        };
        Self::new(options, rules, remote)
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Turn text plus optional prior context into a plan
    pub async fn plan(&self, text: &str, prior: Option<&Plan>) -> PlanOutcome {
        debug!(%text, has_prior = prior.is_some(), "PlanOrchestrator::plan: called");

        for &strategy in &self.strategies {
            if let Some(plan) = self.attempt(strategy, text, prior).await {
                info!(%strategy, shape = %plan.shape(), "plan committed");
                return PlanOutcome { plan, strategy };
            }
            debug!(%strategy, "PlanOrchestrator::plan: strategy declined");
        }

        // Unreachable with a well-formed list, which always ends in Generic
        PlanOutcome {
            plan: generic_plan(),
            strategy: Strategy::Generic,
        }
    }

    async fn attempt(&self, strategy: Strategy, text: &str, prior: Option<&Plan>) -> Option<Plan> {
        match strategy {
            Strategy::Followup => self.try_followup(text, prior?),
            Strategy::OffTopic => self
                .offtopic
                .is_off_topic(text)
                .then(|| Plan::decline(STEERING_MESSAGE)),
            Strategy::Rules => self.rules.find(text).map(|hit| hit.plan),
            Strategy::Remote => self.try_remote(text, prior).await,
            Strategy::Generic => Some(generic_plan()),
        }
    }

    fn try_followup(&self, text: &str, prior: &Plan) -> Option<Plan> {
        let statement = prior.statement()?;
        let rewritten = self.followup.rewrite(statement, text)?;
        Some(Plan::with_shape(
            prior.shape(),
            Query::new(
                rewritten,
                "Follow-up filtered by platform.",
                "Interpreted as a platform filter follow-up.",
            ),
        ))
    }

    async fn try_remote(&self, text: &str, prior: Option<&Plan>) -> Option<Plan> {
        let remote = self.remote.as_ref()?;
        match remote.plan(&PlanRequest::new(text, prior)).await {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!(error = %e, "remote planner failed; continuing cascade");
                None
            }
        }
    }
}

/// Recent rows across the whole table
pub fn generic_plan() -> Plan {
    Plan::Table(Query::new(
        GENERIC_SQL,
        "Generic recent rows.",
        "No specific intent detected; showing recent data.",
    ))
}
