//! Column-level access control
//!
//! Admins see every column. Everyone else gets a copy of the result with
//! the restricted columns removed.

use std::collections::HashSet;

use tracing::debug;

use crate::config::AccessConfig;
use crate::domain::QueryResult;

/// Static allow-list of admins plus the columns hidden from everyone else
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admins: HashSet<String>,
    restricted: Vec<String>,
}

impl AccessPolicy {
    pub fn new(admins: impl IntoIterator<Item = String>, restricted: Vec<String>) -> Self {
        Self {
            admins: admins
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
            restricted,
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(config.admin_user_ids.clone(), config.restricted_columns.clone())
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }

    /// The result as `user_id` is allowed to see it
    pub fn filter(&self, user_id: &str, result: QueryResult) -> QueryResult {
        if self.is_admin(user_id) || self.restricted.is_empty() {
            return result;
        }
        let filtered = result.without_columns(&self.restricted);
        debug!(
            %user_id,
            dropped = result.columns.len() - filtered.columns.len(),
            "AccessPolicy::filter: applied"
        );
        filtered
    }
}
