//! Configuration loading, validation, and management for Tellerbot.
//!
//! Loads configuration from `~/.tellerbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tellerbot_core::provider::GenerationParams;

/// Upper bound for the completion timeout. The gateway call is the only
/// suspending step of a chat request, so it must stay in the seconds range.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 30;

/// The root configuration structure.
///
/// Maps directly to `~/.tellerbot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider label used in logs and health output
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for normal traffic
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Cheaper model forced once the daily budget is exhausted
    #[serde(default = "default_model")]
    pub budget_model: String,

    /// Per-request completion timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Fixed advisor instructions prepended to every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Generation knobs passed through to the endpoint
    #[serde(default)]
    pub generation: GenerationParams,

    /// Context budget
    #[serde(default)]
    pub context: ContextConfig,

    /// History summarization
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Conversation persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Cost tracking and alerting
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Caller-side retry policy for transient upstream failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_system_prompt() -> String {
    "You are a friendly, careful banking advisor. Help customers understand \
     savings accounts, credit, budgeting, loans and investing in plain language. \
     Never ask for account numbers, passwords or other credentials, and remind \
     customers to confirm decisions with a licensed professional."
        .into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("budget_model", &self.budget_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("generation", &self.generation)
            .field("context", &self.context)
            .field("summarizer", &self.summarizer)
            .field("cache", &self.cache)
            .field("store", &self.store)
            .field("telemetry", &self.telemetry)
            .field("retry", &self.retry)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total context window in tokens; the response reservation
    /// (`generation.max_tokens`) is subtracted from it.
    #[serde(default = "default_context_tokens")]
    pub total_tokens: usize,
}

fn default_context_tokens() -> usize {
    4096
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_context_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Turns kept verbatim after summarization
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    /// Summarize once a conversation has more turns than this
    #[serde(default = "default_trigger_turns")]
    pub trigger_turns: usize,

    /// Topic keyword sets; empty means the built-in banking topics
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<TopicConfig>,
}

fn default_keep_recent() -> usize {
    2
}
fn default_trigger_turns() -> usize {
    20
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            keep_recent: default_keep_recent(),
            trigger_turns: default_trigger_turns(),
            topics: vec![],
        }
    }
}

/// One recognizable topic and the keywords that signal it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Freshness window for cached responses
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// LRU capacity of the in-memory backend
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,

    /// Bound on a single cache read or write
    #[serde(default = "default_cache_timeout")]
    pub timeout_ms: u64,
}

fn default_cache_ttl() -> u64 {
    3600
}
fn default_cache_entries() -> usize {
    10_000
}
fn default_cache_timeout() -> u64 {
    250
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
            timeout_ms: default_cache_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite", "memory" or "none"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path (defaults to `~/.tellerbot/conversations.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Bound on a single load or append
    #[serde(default = "default_store_timeout")]
    pub timeout_ms: u64,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_timeout() -> u64 {
    500
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
            timeout_ms: default_store_timeout(),
        }
    }
}

/// Cost tracking, alerting and pricing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Daily spending budget in USD (0 disables alerts and degradation)
    #[serde(default = "default_daily_budget")]
    pub daily_budget_usd: f64,

    /// Alert thresholds as percentages of the daily budget
    #[serde(default = "default_thresholds")]
    pub alert_thresholds: Vec<u8>,

    /// Offset from UTC, in minutes, of the midnight that resets daily totals
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Response token cap while the budget is exhausted
    #[serde(default = "default_degraded_max_tokens")]
    pub degraded_max_tokens: u32,

    /// Custom model pricing overrides (model name → pricing)
    #[serde(default)]
    pub pricing: HashMap<String, PricingOverrideConfig>,
}

fn default_daily_budget() -> f64 {
    10.0
}
fn default_thresholds() -> Vec<u8> {
    vec![50, 75, 90, 100]
}
fn default_degraded_max_tokens() -> u32 {
    150
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            daily_budget_usd: default_daily_budget(),
            alert_thresholds: default_thresholds(),
            utc_offset_minutes: 0,
            degraded_max_tokens: default_degraded_max_tokens(),
            pricing: HashMap::new(),
        }
    }
}

/// Custom per-1000-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1K input tokens in USD
    pub input_per_1k: f64,
    /// Price per 1K output tokens in USD
    pub output_per_1k: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Static reply served when retries are exhausted
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

fn default_max_retries() -> usize {
    2
}
fn default_initial_delay() -> u64 {
    200
}
fn default_max_delay() -> u64 {
    2000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_fallback_reply() -> String {
    "I'm having trouble reaching our advisor service right now. \
     Please try again in a few minutes."
        .into()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Inbound message length limit, in characters
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Requests per minute per client key (0 disables limiting)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: usize,

    /// CORS origins allowed to call the API
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_message_chars() -> usize {
    1000
}
fn default_rate_limit() -> usize {
    30
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_message_chars: default_max_message_chars(),
            rate_limit_per_minute: default_rate_limit(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tellerbot/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `TELLERBOT_API_KEY`, then `OPENAI_API_KEY`
    /// - `TELLERBOT_MODEL`
    /// - `TELLERBOT_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("TELLERBOT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(model) = std::env::var("TELLERBOT_MODEL") {
            self.default_model = model;
        }
        if let Ok(url) = std::env::var("TELLERBOT_BASE_URL") {
            self.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tellerbot")
    }

    /// Resolved SQLite path for the conversation store.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("conversations.db"))
    }

    /// Token budget available to system prompt + history + user message.
    pub fn history_budget(&self) -> usize {
        self.context
            .total_tokens
            .saturating_sub(self.generation.max_tokens as usize)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.into()));

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return invalid("generation.temperature must be between 0.0 and 2.0");
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            return Err(ConfigError::ValidationError(format!(
                "request_timeout_secs must be between 1 and {MAX_REQUEST_TIMEOUT_SECS}"
            )));
        }
        if self.generation.max_tokens as usize >= self.context.total_tokens {
            return invalid("generation.max_tokens must be smaller than context.total_tokens");
        }
        if self.summarizer.keep_recent >= self.summarizer.trigger_turns {
            return invalid("summarizer.keep_recent must be smaller than summarizer.trigger_turns");
        }
        if self.telemetry.daily_budget_usd < 0.0 {
            return invalid("telemetry.daily_budget_usd must not be negative");
        }
        if self.telemetry.alert_thresholds.windows(2).any(|w| w[0] >= w[1])
            || self.telemetry.alert_thresholds.iter().any(|t| *t == 0 || *t > 100)
        {
            return invalid("telemetry.alert_thresholds must be strictly increasing within 1..=100");
        }
        if self.telemetry.utc_offset_minutes.abs() >= 24 * 60 {
            return invalid("telemetry.utc_offset_minutes must be within ±1439");
        }
        if self.gateway.max_message_chars == 0 {
            return invalid("gateway.max_message_chars must be > 0");
        }
        if self.retry.multiplier < 1.0 {
            return invalid("retry.multiplier must be >= 1.0");
        }
        if !matches!(self.store.backend.as_str(), "sqlite" | "memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "unknown store.backend '{}' (expected sqlite, memory or none)",
                self.store.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: default_base_url(),
            default_model: default_model(),
            budget_model: default_model(),
            request_timeout_secs: default_request_timeout(),
            system_prompt: default_system_prompt(),
            generation: GenerationParams::default(),
            context: ContextConfig::default(),
            summarizer: SummarizerConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            telemetry: TelemetryConfig::default(),
            retry: RetryConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
