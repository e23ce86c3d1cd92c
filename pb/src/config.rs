//! portfoliobot configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Strategy toggles for the planning cascade
    pub planner: PlannerConfig,

    /// Session cache configuration
    pub cache: CacheConfig,

    /// Analytic store and export locations
    pub store: StoreConfig,

    /// Column-level access control
    pub access: AccessConfig,

    /// Result rendering
    pub render: RenderConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env();
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .portfoliobot.yml
        let local_config = PathBuf::from(".portfoliobot.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/portfoliobot/portfoliobot.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("portfoliobot").join("portfoliobot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        debug!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Read only the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load_file_chain(config_path).ok().and_then(|c| c.log_level)
    }

    /// Apply overrides from process environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("LLM_MODEL").filter(|s| !s.trim().is_empty()) {
            self.llm.model = model.trim().to_string();
        }
        if let Some(v) = lookup("LLM_FIRST") {
            override_bool("LLM_FIRST", &v, &mut self.llm.remote_first);
        }
        if let Some(v) = lookup("LLM_TEMPERATURE") {
            match v.trim().parse::<f32>() {
                Ok(t) => self.llm.temperature = t,
                Err(_) => warn!(value = %v, "Ignoring invalid LLM_TEMPERATURE"),
            }
        }
        if let Some(v) = lookup("ENABLE_FOLLOWUP_LOGIC") {
            override_bool("ENABLE_FOLLOWUP_LOGIC", &v, &mut self.planner.followup);
        }
        if let Some(v) = lookup("ENABLE_RULE_FALLBACK") {
            override_bool("ENABLE_RULE_FALLBACK", &v, &mut self.planner.rules);
        }
        if let Some(v) = lookup("CACHE_TTL_SECS") {
            match v.trim().parse::<u64>() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => warn!(value = %v, "Ignoring invalid CACHE_TTL_SECS"),
            }
        }
        if let Some(path) = lookup("DB_PATH").filter(|s| !s.trim().is_empty()) {
            self.store.db_path = PathBuf::from(path.trim());
        }
        if let Some(path) = lookup("EXPORT_DIR").filter(|s| !s.trim().is_empty()) {
            self.store.export_dir = PathBuf::from(path.trim());
        }
        if let Some(ids) = lookup("ADMIN_USER_IDS") {
            self.access.admin_user_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Effective planner settings as reported by `pb config`
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "llm": {
                "use_remote": self.llm.remote_enabled(),
                "provider": self.llm.provider,
                "model": self.llm.model,
                "remote_first": self.llm.remote_first,
                "temperature": self.llm.temperature,
                "api_key_configured": self.llm.api_key().is_some(),
            },
            "planner": {
                "remote_first": self.llm.remote_first,
                "enable_followup": self.planner.followup,
                "enable_rule_fallback": self.planner.rules,
            },
            "cache": {
                "ttl_secs": self.cache.ttl_secs,
            },
            "store": {
                "db_path": self.store.db_path,
                "export_dir": self.store.export_dir,
            },
        })
    }
}

fn override_bool(name: &str, raw: &str, target: &mut bool) {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => *target = true,
        "false" | "0" | "no" | "off" => *target = false,
        _ => warn!(%name, value = %raw, "Ignoring invalid boolean override"),
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key; its presence enables remote planning
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Try the remote planner before the rule matcher
    #[serde(rename = "remote-first")]
    pub remote_first: bool,

    /// Retries on transient HTTP failures (the planner itself never retries)
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 1024,
            timeout_ms: 60_000,
            temperature: 0.0,
            remote_first: true,
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    /// The API key, if its environment variable is set and non-empty
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }

    /// Remote planning is enabled exactly when credentials are present
    pub fn remote_enabled(&self) -> bool {
        self.api_key().is_some()
    }
}

/// Strategy toggles for the planning cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Rewrite the previous query on platform follow-ups
    pub followup: bool,

    /// Match the built-in question vocabulary
    pub rules: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            followup: true,
            rules: true,
        }
    }
}

/// Session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for cached results in seconds
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Analytic store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database holding the app_metrics table
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,

    /// Directory for CSV exports
    #[serde(rename = "export-dir")]
    pub export_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/rounds.db"),
            export_dir: PathBuf::from("data/exports"),
        }
    }
}

/// Column-level access control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Users allowed to see every column
    #[serde(rename = "admin-user-ids")]
    pub admin_user_ids: Vec<String>,

    /// Columns hidden from everyone else
    #[serde(rename = "restricted-columns")]
    pub restricted_columns: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admin_user_ids: Vec::new(),
            restricted_columns: vec!["ua_cost".to_string()],
        }
    }
}

/// Result rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Maximum rows shown in a Markdown table
    #[serde(rename = "max-rows")]
    pub max_rows: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { max_rows: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.llm.remote_first);
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert!(config.planner.followup);
        assert!(config.planner.rules);
        assert_eq!(config.access.restricted_columns, vec!["ua_cost"]);
        assert_eq!(config.render.max_rows, 10);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  model: gpt-4o
  api-key-env: MY_API_KEY
  base-url: https://api.example.com
  max-tokens: 512
  timeout-ms: 15000
  temperature: 0.2
  remote-first: false

planner:
  followup: false

cache:
  ttl-secs: 120

store:
  db-path: /tmp/metrics.db

access:
  admin-user-ids: [U1, U2]

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.max_tokens, 512);
        assert!(!config.llm.remote_first);
        assert!(!config.planner.followup);
        assert!(config.planner.rules);
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/metrics.db"));
        assert_eq!(config.store.export_dir, PathBuf::from("data/exports"));
        assert_eq!(config.access.admin_user_ids, vec!["U1", "U2"]);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("llm:\n  model: gpt-4.1\n").unwrap();

        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("LLM_MODEL", "gpt-4o"),
            ("LLM_FIRST", "false"),
            ("LLM_TEMPERATURE", "0.7"),
            ("ENABLE_RULE_FALLBACK", "0"),
            ("CACHE_TTL_SECS", "30"),
            ("DB_PATH", "other.db"),
            ("ADMIN_USER_IDS", "U1, ,U2,"),
        ]);
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned());

        assert_eq!(config.llm.model, "gpt-4o");
        assert!(!config.llm.remote_first);
        assert_eq!(config.llm.temperature, 0.7);
        assert!(!config.planner.rules);
        assert!(config.planner.followup);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.store.db_path, PathBuf::from("other.db"));
        assert_eq!(config.access.admin_user_ids, vec!["U1", "U2"]);
    }

    #[test]
    fn test_invalid_env_overrides_are_ignored() {
        let vars = env(&[("LLM_TEMPERATURE", "warm"), ("LLM_FIRST", "maybe"), ("CACHE_TTL_SECS", "-1")]);
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).cloned());

        assert_eq!(config.llm.temperature, 0.0);
        assert!(config.llm.remote_first);
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    #[serial]
    fn test_remote_enabled_follows_key_presence() {
        let config = LlmConfig {
            api_key_env: "PB_TEST_REMOTE_KEY".to_string(),
            ..LlmConfig::default()
        };

        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::remove_var("PB_TEST_REMOTE_KEY") };
        assert!(!config.remote_enabled());

        unsafe { std::env::set_var("PB_TEST_REMOTE_KEY", "  ") };
        assert!(!config.remote_enabled());

        unsafe { std::env::set_var("PB_TEST_REMOTE_KEY", "sk-test") };
        assert!(config.remote_enabled());
        assert_eq!(config.api_key().as_deref(), Some("sk-test"));

        unsafe { std::env::remove_var("PB_TEST_REMOTE_KEY") };
    }

    #[test]
    fn test_summary_reports_flags() {
        let config = Config::default();
        let summary = config.summary();
        assert_eq!(summary["llm"]["model"], "gpt-4o-mini");
        assert_eq!(summary["planner"]["enable_followup"], true);
        assert_eq!(summary["cache"]["ttl_secs"], 3600);
    }
}
