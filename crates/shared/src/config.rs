use thiserror::Error;

use crate::config_env::{
    optional_trimmed_env, parse_f32_env, parse_u32_env, parse_u64_env, parse_usize_env,
    require_env,
};

const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_NON_STREAM_TIMEOUT_MS: u64 = 15_000;

const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 1_800;

const DEFAULT_SUGGESTION_TIMEOUT_MS: u64 = 8_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid number in env var {0}")]
    ParseFloat(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Loads a local `.env` file when one exists. Missing files are fine;
/// malformed files are not.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::InvalidConfiguration(format!(
            "failed to load .env: {err}"
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Base URL of this application, used for internal suggestion calls.
    pub app_base_url: String,
    pub suggestion_timeout_ms: u64,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 10)?,
            app_base_url: optional_trimmed_env("APP_BASE_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8080".to_string()),
            suggestion_timeout_ms: parse_u64_env(
                "SUGGESTION_TIMEOUT_MS",
                DEFAULT_SUGGESTION_TIMEOUT_MS,
            )?,
        })
    }
}

/// Completion backend settings. The API key is optional at load time so the
/// rest of the application can boot without it; the orchestrator refuses to
/// build until a key is present.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub non_stream_timeout_ms: u64,
}

impl CompletionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = optional_trimmed_env("COMPLETION_BASE_URL")
            .unwrap_or_else(|| DEFAULT_COMPLETION_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidConfiguration(
                "COMPLETION_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_key: optional_trimmed_env("COMPLETION_API_KEY"),
            model: optional_trimmed_env("COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            max_tokens: parse_u32_env("COMPLETION_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            temperature: parse_f32_env("COMPLETION_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            non_stream_timeout_ms: parse_u64_env(
                "COMPLETION_NON_STREAM_TIMEOUT_MS",
                DEFAULT_NON_STREAM_TIMEOUT_MS,
            )?,
        })
    }

    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    pub max_context_chars: usize,
    pub fetch_timeout_ms: u64,
    pub cache_ttl_seconds: u64,
}

impl KnowledgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_context_chars: parse_usize_env(
                "KNOWLEDGE_MAX_CONTEXT_CHARS",
                DEFAULT_MAX_CONTEXT_CHARS,
            )?,
            fetch_timeout_ms: parse_u64_env("KNOWLEDGE_FETCH_TIMEOUT_MS", DEFAULT_FETCH_TIMEOUT_MS)?,
            cache_ttl_seconds: parse_u64_env("KNOWLEDGE_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS)?,
        })
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}
