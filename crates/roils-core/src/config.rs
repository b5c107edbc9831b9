//! Pipeline configuration.
//!
//! One explicit [`PipelineConfig`] is built at startup and handed to every
//! component constructor. It can be loaded from:
//! - A TOML file (default: `./roils.toml`), with `${VAR}` placeholders
//!   substituted from the environment before parsing
//! - Environment variables (`ROILS_*` prefixed), which override file values
//!
//! # Example
//!
//! ```rust,no_run
//! use roils_core::config::PipelineConfig;
//!
//! let config = PipelineConfig::load(Some(std::path::Path::new("roils.toml")))
//!     .expect("Failed to load config");
//! println!("summaries by {}", config.summary.model);
//! ```

use std::env;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::defaults;
use crate::models::{GenerationOptions, ModelId};
use crate::text::PromptTemplate;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// SECTIONS
// =============================================================================

/// Record store (Redis) connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "StoreConfig::default_host")]
    pub host: String,
    #[serde(default = "StoreConfig::default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
    /// SCAN `COUNT` hint.
    #[serde(default = "StoreConfig::default_scan_count")]
    pub scan_count: usize,
}

impl StoreConfig {
    fn default_host() -> String {
        defaults::REDIS_HOST.to_string()
    }
    fn default_port() -> u16 {
        defaults::REDIS_PORT
    }
    fn default_scan_count() -> usize {
        defaults::SCAN_COUNT
    }

    /// Connection URL with the password percent-encoded.
    pub fn url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(pw) => format!(
                "redis://:{}@{}:{}/{}",
                urlencoding::encode(pw),
                self.host,
                self.port,
                self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Connection URL safe for logs.
    pub fn redacted_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(_) => format!("redis://:***@{}:{}/{}", self.host, self.port, self.db),
            None => self.url(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            password: None,
            db: defaults::REDIS_DB,
            scan_count: Self::default_scan_count(),
        }
    }
}

/// Generation backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL; the client posts to `{endpoint}/api/generate`.
    #[serde(default = "BackendConfig::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "BackendConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    fn default_endpoint() -> String {
        defaults::OLLAMA_URL.to_string()
    }
    fn default_timeout_secs() -> u64 {
        defaults::GEN_TIMEOUT_SECS
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// Summary Stage model, prompt, and decoding options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "SummaryConfig::default_model")]
    pub model: ModelId,
    #[serde(default = "SummaryConfig::default_prompt")]
    pub prompt: PromptTemplate,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl SummaryConfig {
    fn default_model() -> ModelId {
        ModelId::from_default(defaults::SUMMARY_MODEL)
    }
    fn default_prompt() -> PromptTemplate {
        PromptTemplate::new(defaults::SUMMARY_PROMPT)
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            prompt: Self::default_prompt(),
            options: GenerationOptions::default(),
        }
    }
}

/// Evaluation Stage model, prompt, decoding options, and pass bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "EvaluationConfig::default_model")]
    pub model: ModelId,
    #[serde(default = "EvaluationConfig::default_prompt")]
    pub prompt: PromptTemplate,
    /// Model whose summary is evaluated; defaults to `summary.model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<ModelId>,
    #[serde(default = "EvaluationConfig::default_max_passes")]
    pub max_passes: u32,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl EvaluationConfig {
    fn default_model() -> ModelId {
        ModelId::from_default(defaults::EVAL_MODEL)
    }
    fn default_prompt() -> PromptTemplate {
        PromptTemplate::new(defaults::EVAL_PROMPT)
    }
    fn default_max_passes() -> u32 {
        defaults::EVAL_MAX_PASSES
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            prompt: Self::default_prompt(),
            summary_model: None,
            max_passes: Self::default_max_passes(),
            options: GenerationOptions::default(),
        }
    }
}

/// Remote host running the backend container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    pub host: String,
    #[serde(default = "LifecycleConfig::default_username")]
    pub username: String,
    /// Password auth goes through `sshpass`; prefer `identity_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
    #[serde(default = "LifecycleConfig::default_container")]
    pub container: String,
    #[serde(default = "LifecycleConfig::default_settle_secs")]
    pub settle_secs: u64,
}

impl LifecycleConfig {
    fn default_username() -> String {
        defaults::SSH_USER.to_string()
    }
    fn default_container() -> String {
        defaults::CONTAINER_NAME.to_string()
    }
    fn default_settle_secs() -> u64 {
        defaults::RESTART_SETTLE_SECS
    }

    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: Self::default_username(),
            password: None,
            identity_file: None,
            container: Self::default_container(),
            settle_secs: Self::default_settle_secs(),
        }
    }
}

/// Export Stage output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "ExportConfig::default_path")]
    pub path: PathBuf,
}

impl ExportConfig {
    fn default_path() -> PathBuf {
        PathBuf::from(defaults::EXPORT_PATH)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

// =============================================================================
// ROOT
// =============================================================================

/// Main pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Absent means timeouts are logged but the backend is never restarted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<LifecycleConfig>,
    #[serde(default)]
    pub export: ExportConfig,
}

impl PipelineConfig {
    /// Resolve the config path: explicit argument, then `ROILS_CONFIG`, then `./roils.toml`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var("ROILS_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(defaults::CONFIG_PATH))
    }

    /// Load from the resolved path if it exists (defaults otherwise), then
    /// apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let path = Self::resolve_path(explicit);

        let mut config = if path.exists() {
            info!("Loading pipeline config from: {}", path.display());
            Self::from_file(&path)?
        } else if explicit.is_some() {
            return Err(ConfigError::FileRead(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        } else {
            debug!(
                "Config file not found at {}, using defaults and environment variables",
                path.display()
            );
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without env overrides or validation.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML content after `${VAR}` substitution.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let content = Self::substitute_env_vars(content);
        Ok(toml::from_str(&content)?)
    }

    /// Apply `ROILS_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(host) = env::var("ROILS_REDIS_HOST") {
            self.store.host = host;
        }
        if let Ok(port) = env::var("ROILS_REDIS_PORT") {
            self.store.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "ROILS_REDIS_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Ok(password) = env::var("ROILS_REDIS_PASSWORD") {
            self.store.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Ok(url) = env::var("ROILS_OLLAMA_URL") {
            self.backend.endpoint = url;
        }
        if let Ok(model) = env::var("ROILS_SUMMARY_MODEL") {
            self.summary.model = parse_model_env("ROILS_SUMMARY_MODEL", model)?;
        }
        if let Ok(model) = env::var("ROILS_EVAL_MODEL") {
            self.evaluation.model = parse_model_env("ROILS_EVAL_MODEL", model)?;
        }
        Ok(())
    }

    /// Model whose summaries the Evaluation Stage reads.
    pub fn evaluation_summary_model(&self) -> &ModelId {
        self.evaluation
            .summary_model
            .as_ref()
            .unwrap_or(&self.summary.model)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let endpoint = &self.backend.endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "backend endpoint must start with http:// or https://, got: {}",
                endpoint
            )));
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "backend timeout_secs must be positive".to_string(),
            ));
        }
        if self.store.host.is_empty() {
            return Err(ConfigError::Validation(
                "store host cannot be empty".to_string(),
            ));
        }
        if self.store.scan_count == 0 {
            return Err(ConfigError::Validation(
                "store scan_count must be positive".to_string(),
            ));
        }
        self.summary
            .prompt
            .require(&["narrative"])
            .map_err(|e| ConfigError::Validation(format!("summary: {}", e)))?;
        self.evaluation
            .prompt
            .require(&["narrative", "summary"])
            .map_err(|e| ConfigError::Validation(format!("evaluation: {}", e)))?;
        self.summary
            .options
            .validate()
            .map_err(|e| ConfigError::Validation(format!("summary options: {}", e)))?;
        self.evaluation
            .options
            .validate()
            .map_err(|e| ConfigError::Validation(format!("evaluation options: {}", e)))?;
        if self.evaluation.max_passes == 0 {
            return Err(ConfigError::Validation(
                "evaluation max_passes must be at least 1".to_string(),
            ));
        }
        if let Some(ref lifecycle) = self.lifecycle {
            if lifecycle.host.is_empty() || lifecycle.container.is_empty() {
                return Err(ConfigError::Validation(
                    "lifecycle host and container cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Substitute environment variables in the format ${VAR_NAME}.
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }
}

fn parse_model_env(name: &str, value: String) -> ConfigResult<ModelId> {
    ModelId::new(value.clone()).map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value,
    })
}
