//! LLM provider clients behind one uniform completion interface.
//!
//! Providers are tried in chain order by the summarization engine; the
//! chain is built once from whichever credentials are configured.

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client as OpenAIClient;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use ollama_rs::Ollama;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::{Completion, LlmError};
use crate::config::ProviderConfig;
use crate::TARGET_LLM_REQUEST;

const LLM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub enum LlmProvider {
    OpenAi {
        client: OpenAIClient<OpenAIConfig>,
        model: String,
    },
    Ollama {
        client: Ollama,
        model: String,
    },
}

impl LlmProvider {
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi { .. } => "openai",
            LlmProvider::Ollama { .. } => "ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmProvider::OpenAi { model, .. } => model,
            LlmProvider::Ollama { model, .. } => model,
        }
    }

    /// Run one completion. Rate-limit failures are distinguished from other
    /// errors so the usage audit can classify them.
    pub async fn complete(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Completion, LlmError> {
        debug!(target: TARGET_LLM_REQUEST, "Sending completion request to {} ({})", self.name(), self.model());
        let started = Instant::now();

        match self {
            LlmProvider::OpenAi { client, model } => {
                let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
                if let Some(system) = system_prompt {
                    messages.push(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(system)
                            .build()
                            .map_err(|e| LlmError::Other(e.to_string()))?
                            .into(),
                    );
                }
                messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(user_prompt)
                        .build()
                        .map_err(|e| LlmError::Other(e.to_string()))?
                        .into(),
                );

                let request = CreateChatCompletionRequestArgs::default()
                    .model(model)
                    .messages(messages)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build()
                    .map_err(|e| LlmError::Other(e.to_string()))?;

                let response = timeout(LLM_TIMEOUT, client.chat().create(request))
                    .await
                    .map_err(|_| {
                        LlmError::Other(format!(
                            "OpenAI request timed out after {}s",
                            LLM_TIMEOUT.as_secs()
                        ))
                    })?
                    .map_err(classify_openai_error)?;

                let text = response
                    .choices
                    .first()
                    .and_then(|choice| choice.message.content.clone())
                    .unwrap_or_default();
                if text.is_empty() {
                    return Err(LlmError::Other("Empty completion from OpenAI".to_string()));
                }

                Ok(Completion {
                    text,
                    input_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
                    output_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
                    latency_ms: started.elapsed().as_millis() as u64,
                })
            }
            LlmProvider::Ollama { client, model } => {
                // Ollama's generate endpoint takes a single prompt; fold the
                // system instruction into it.
                let prompt = match system_prompt {
                    Some(system) => format!("{}\n\n{}", system, user_prompt),
                    None => user_prompt.to_string(),
                };

                let mut request = GenerationRequest::new(model.to_string(), prompt);
                request.options = Some(GenerationOptions::default().temperature(temperature));

                let response = timeout(LLM_TIMEOUT, client.generate(request))
                    .await
                    .map_err(|_| {
                        LlmError::Other(format!(
                            "Ollama request timed out after {}s",
                            LLM_TIMEOUT.as_secs()
                        ))
                    })?
                    .map_err(|e| LlmError::Other(e.to_string()))?;

                if response.response.is_empty() {
                    return Err(LlmError::Other("Empty completion from Ollama".to_string()));
                }

                Ok(Completion {
                    text: response.response,
                    input_tokens: None,
                    output_tokens: None,
                    latency_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }
}

fn classify_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::ApiError(api) => {
            let message = api.message.clone();
            let rate_limited = api.r#type.as_deref() == Some("rate_limit_exceeded")
                || message.to_lowercase().contains("rate limit");
            if rate_limited {
                LlmError::RateLimited(message)
            } else {
                LlmError::Other(message)
            }
        }
        other => LlmError::Other(other.to_string()),
    }
}

/// Try the provider chain in order until one attempt succeeds, recording
/// one usage entry per attempt. Used by the single-completion callers
/// (comment summaries, assistant); the summarization engine runs its own
/// loop because parse failures also advance the chain there.
pub async fn complete_with_failover(
    db: &crate::db::Database,
    providers: &[LlmProvider],
    prompt: &str,
    max_tokens: u32,
    temperature: f32,
) -> Option<String> {
    let mut usage: Vec<super::UsageRecord> = Vec::new();
    let mut text = None;

    for (attempt, provider) in providers.iter().enumerate() {
        match provider.complete(None, prompt, max_tokens, temperature).await {
            Ok(completion) => {
                usage.push(super::UsageRecord {
                    model: provider.model().to_string(),
                    provider: provider.name().to_string(),
                    input_tokens: completion.input_tokens,
                    output_tokens: completion.output_tokens,
                    total_tokens: match (completion.input_tokens, completion.output_tokens) {
                        (Some(i), Some(o)) => Some(i + o),
                        _ => None,
                    },
                    latency_ms: Some(completion.latency_ms),
                    was_fallback: attempt > 0,
                    error: None,
                    status: super::UsageStatus::Success,
                });
                text = Some(completion.text);
                break;
            }
            Err(err) => {
                warn!(target: TARGET_LLM_REQUEST, "Completion via {} failed: {}", provider.name(), err);
                usage.push(super::UsageRecord {
                    model: provider.model().to_string(),
                    provider: provider.name().to_string(),
                    input_tokens: None,
                    output_tokens: None,
                    total_tokens: None,
                    latency_ms: None,
                    was_fallback: attempt > 0,
                    error: Some(err.message().to_string()),
                    status: err.status(),
                });
            }
        }
    }

    db.record_ai_usage_best_effort(&usage).await;
    text
}

/// Build the ordered provider chain from configured credentials: OpenAI is
/// primary when configured, Ollama the fallback. A single credential
/// yields a one-element chain (that provider is both primary and sole
/// attempt).
pub fn build_provider_chain(config: &ProviderConfig) -> Vec<LlmProvider> {
    let mut chain = Vec::new();

    if let Some(api_key) = &config.openai_api_key {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = &config.openai_api_base {
            openai_config = openai_config.with_api_base(base);
        }
        chain.push(LlmProvider::OpenAi {
            client: OpenAIClient::with_config(openai_config),
            model: config.openai_model.clone(),
        });
    }

    if let Some(host) = &config.ollama_host {
        chain.push(LlmProvider::Ollama {
            client: Ollama::new(host.clone(), config.ollama_port),
            model: config.ollama_model.clone(),
        });
    }

    if chain.is_empty() {
        warn!(target: TARGET_LLM_REQUEST, "No LLM credentials configured; summarization will fail");
    }

    chain
}
