//! RunnerConfig - TOML configuration for a background runner.
//!
//! `${VAR}` references are substituted from the environment before the
//! document is parsed. `validate()` rejects incomplete settings so that a
//! misconfigured process fails at startup rather than on first dispatch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{JobType, PriorityTable};
use crate::impls::{DEFAULT_SHARED_QUEUE, DEFAULT_WORKER_QUEUE, DuplicatePolicy};
use crate::ports::StrategyKind;

const ENV_VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Broker URL schemes `RunnerBuilder` knows how to connect.
pub const BROKER_SCHEMES: [&str; 3] = ["redis://", "rediss://", "memory://"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Strategy bound at startup.
    pub background_runner: StrategyKind,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Job type -> priority, consulted by the in-process strategy.
    #[serde(default)]
    pub priorities: PriorityTable,

    #[serde(default)]
    pub in_process: InProcessConfig,

    #[serde(default)]
    pub shared_queue: SharedQueueConfig,

    #[serde(default)]
    pub worker_queue: WorkerQueueConfig,
}

/// `Test` forces inline execution for the queue strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Development,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive. `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InProcessConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Job types dispatched without a queue item name.
    #[serde(default)]
    pub anonymous_jobs: Vec<JobType>,
}

impl Default for InProcessConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            duplicate_policy: DuplicatePolicy::default(),
            anonymous_jobs: Vec::new(),
        }
    }
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedQueueConfig {
    pub url: Option<String>,

    #[serde(default = "default_shared_queue")]
    pub queue: String,

    #[serde(default)]
    pub inline: bool,
}

impl Default for SharedQueueConfig {
    fn default() -> Self {
        Self {
            url: None,
            queue: default_shared_queue(),
            inline: false,
        }
    }
}

fn default_shared_queue() -> String {
    DEFAULT_SHARED_QUEUE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerQueueConfig {
    /// Producer side.
    pub client_url: Option<String>,

    /// Consumer side. Defaults to `client_url`.
    pub server_url: Option<String>,

    #[serde(default = "default_worker_queue")]
    pub default_queue: String,

    #[serde(default)]
    pub inline: bool,

    /// Job type -> destination queue.
    #[serde(default)]
    pub queues: HashMap<JobType, String>,
}

impl WorkerQueueConfig {
    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref().or(self.client_url.as_deref())
    }
}

impl Default for WorkerQueueConfig {
    fn default() -> Self {
        Self {
            client_url: None,
            server_url: None,
            default_queue: default_worker_queue(),
            inline: false,
            queues: HashMap::new(),
        }
    }
}

fn default_worker_queue() -> String {
    DEFAULT_WORKER_QUEUE.to_string()
}

impl RunnerConfig {
    pub fn new(background_runner: StrategyKind) -> Self {
        Self {
            background_runner,
            environment: Environment::default(),
            logging: LoggingConfig::default(),
            priorities: PriorityTable::default(),
            in_process: InProcessConfig::default(),
            shared_queue: SharedQueueConfig::default(),
            worker_queue: WorkerQueueConfig::default(),
        }
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    /// Parse and validate, substituting `${VAR}` from the process environment.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        Self::parse_toml_with(content, |name| std::env::var(name).ok())
    }

    /// Same as [`parse_toml`](Self::parse_toml) with an explicit variable lookup.
    pub fn parse_toml_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = substitute_env_vars_with(content, lookup)?;
        let config: RunnerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_test_mode(&self) -> bool {
        self.environment == Environment::Test
    }

    pub fn shared_queue_inline(&self) -> bool {
        self.is_test_mode() || self.shared_queue.inline
    }

    pub fn worker_queue_inline(&self) -> bool {
        self.is_test_mode() || self.worker_queue.inline
    }

    /// Check the settings the selected strategy needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.background_runner {
            StrategyKind::InProcess => {
                if self.in_process.workers == 0 {
                    return Err(ConfigError::Invalid(
                        "in_process.workers must be at least 1".into(),
                    ));
                }
            }
            StrategyKind::SharedQueue => {
                require_queue_name("shared_queue.queue", &self.shared_queue.queue)?;
                if !self.shared_queue_inline() {
                    require_broker_url("shared_queue.url", self.shared_queue.url.as_deref())?;
                }
            }
            StrategyKind::WorkerQueue => {
                let wq = &self.worker_queue;
                require_queue_name("worker_queue.default_queue", &wq.default_queue)?;
                for (job_type, queue) in &wq.queues {
                    require_queue_name(&format!("worker_queue.queues.{job_type}"), queue)?;
                }
                if !self.worker_queue_inline() {
                    require_broker_url("worker_queue.client_url", wq.client_url.as_deref())?;
                    require_broker_url("worker_queue.server_url", wq.server_url())?;
                }
            }
        }
        Ok(())
    }
}

fn require_queue_name(key: &str, queue: &str) -> Result<(), ConfigError> {
    if queue.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{key} must not be empty")));
    }
    Ok(())
}

fn require_broker_url(key: &str, url: Option<&str>) -> Result<(), ConfigError> {
    let Some(url) = url else {
        return Err(ConfigError::Invalid(format!("{key} is required")));
    };
    if !BROKER_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(ConfigError::Invalid(format!(
            "{key} has unsupported scheme (expected one of {})",
            BROKER_SCHEMES.join(", ")
        )));
    }
    Ok(())
}

/// Replace `${VAR}` with `lookup(VAR)`. Unknown variables are left as is.
pub fn substitute_env_vars_with<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let substituted = re.replace_all(content, |caps: &regex::Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    Ok(substituted.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn minimal_in_process_config() {
        let config = RunnerConfig::parse_toml_with(r#"background_runner = "in_process""#, no_env)
            .unwrap();
        assert_eq!(config.background_runner, StrategyKind::InProcess);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.in_process.workers, 4);
        assert_eq!(config.in_process.duplicate_policy, DuplicatePolicy::Independent);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.shared_queue.queue, "backrun");
        assert_eq!(config.worker_queue.default_queue, "default");
    }

    #[test]
    fn full_config() {
        let toml = r#"
            background_runner = "QueueB"
            environment = "production"

            [logging]
            level = "debug"
            format = "json"

            [priorities]
            deliver_notice = "high"
            rebuild_digest = -1

            [in_process]
            workers = 2
            duplicate_policy = "coalesce"
            anonymous_jobs = ["deliver_notice"]

            [worker_queue]
            client_url = "redis://127.0.0.1:6379"
            default_queue = "low"

            [worker_queue.queues]
            deliver_notice = "mailers"
        "#;

        let config = RunnerConfig::parse_toml_with(toml, no_env).unwrap();
        assert_eq!(config.background_runner, StrategyKind::WorkerQueue);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.priorities.priority_for(&JobType::new("deliver_notice")),
            Priority::HIGH
        );
        assert_eq!(
            config.priorities.priority_for(&JobType::new("rebuild_digest")),
            Priority::LOW
        );
        assert_eq!(config.in_process.anonymous_jobs, vec![JobType::new("deliver_notice")]);
        assert_eq!(
            config.worker_queue.queues.get("deliver_notice").map(String::as_str),
            Some("mailers")
        );
        assert_eq!(config.worker_queue.server_url(), Some("redis://127.0.0.1:6379"));
    }

    #[test]
    fn env_vars_are_substituted() {
        let toml = r#"
            background_runner = "shared_queue"
            [shared_queue]
            url = "${BACKRUN_TEST_REDIS}"
        "#;
        let lookup = |name: &str| (name == "BACKRUN_TEST_REDIS").then(|| "redis://cache:6379".to_string());

        let config = RunnerConfig::parse_toml_with(toml, lookup).unwrap();
        assert_eq!(config.shared_queue.url.as_deref(), Some("redis://cache:6379"));
    }

    #[test]
    fn unknown_vars_are_left_alone() {
        let out = substitute_env_vars_with("url = \"${NOPE}\"", no_env).unwrap();
        assert_eq!(out, "url = \"${NOPE}\"");
    }

    #[test]
    fn unknown_strategy_is_parse_error() {
        let err = RunnerConfig::parse_toml_with(r#"background_runner = "sidekiq""#, no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_strategy_is_parse_error() {
        let err = RunnerConfig::parse_toml_with("environment = \"test\"", no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn queue_strategy_requires_broker_url() {
        let err = RunnerConfig::parse_toml_with(r#"background_runner = "shared_queue""#, no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("shared_queue.url")));

        let err = RunnerConfig::parse_toml_with(r#"background_runner = "worker_queue""#, no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("worker_queue.client_url")));
    }

    #[test]
    fn test_environment_needs_no_broker() {
        let toml = r#"
            background_runner = "worker_queue"
            environment = "test"
        "#;
        let config = RunnerConfig::parse_toml_with(toml, no_env).unwrap();
        assert!(config.is_test_mode());
        assert!(config.worker_queue_inline());
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let toml = r#"
            background_runner = "shared_queue"
            [shared_queue]
            url = "amqp://localhost"
        "#;
        let err = RunnerConfig::parse_toml_with(toml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("unsupported scheme")));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let toml = r#"
            background_runner = "in_process"
            [in_process]
            workers = 0
        "#;
        let err = RunnerConfig::parse_toml_with(toml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = RunnerConfig::from_file("/nonexistent/backrun.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
