use anyhow::Result;
use tokio::time::Duration;

use crate::environment::{get_env_var, get_env_var_as_vec};

/// LLM provider credentials. Which providers are configured determines the
/// failover chain: OpenAI primary, Ollama fallback, either alone if only
/// one is present.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub openai_model: String,
    pub ollama_host: Option<String>,
    pub ollama_port: u16,
    pub ollama_model: String,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        ProviderConfig {
            openai_api_key: get_env_var("OPENAI_API_KEY"),
            openai_api_base: get_env_var("OPENAI_API_BASE"),
            openai_model: get_env_var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ollama_host: get_env_var("OLLAMA_HOST"),
            ollama_port: get_env_var("OLLAMA_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            ollama_model: get_env_var("OLLAMA_MODEL").unwrap_or_else(|| "llama3.1".to_string()),
        }
    }
}

/// Immutable process configuration, loaded once at startup and passed
/// explicitly into the pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    /// Admin secret for the write endpoints; serve mode refuses to start
    /// without one.
    pub admin_token: Option<String>,
    pub port: u16,
    pub digest_interval: Duration,
    /// Source ids excluded from this deployment without a registry edit.
    pub disabled_sources: Vec<String>,
    pub providers: ProviderConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let digest_interval_minutes: u64 = get_env_var("DIGEST_INTERVAL_MINUTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Ok(AppConfig {
            database_path: get_env_var("DATABASE_PATH").unwrap_or_else(|| "herald.db".to_string()),
            admin_token: get_env_var("ADMIN_TOKEN"),
            port: get_env_var("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080),
            digest_interval: Duration::from_secs(digest_interval_minutes * 60),
            disabled_sources: get_env_var_as_vec("DISABLED_SOURCES", ','),
            providers: ProviderConfig::from_env(),
        })
    }
}
