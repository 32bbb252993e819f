pub mod provider;

pub use provider::{build_provider_chain, complete_with_failover, LlmProvider};

use std::fmt;

/// Outcome classification for an AI usage audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageStatus {
    Success,
    RateLimited,
    Error,
}

impl UsageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageStatus::Success => "success",
            UsageStatus::RateLimited => "rate_limited",
            UsageStatus::Error => "error",
        }
    }
}

/// Append-only audit record of one LLM call attempt.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub model: String,
    pub provider: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub latency_ms: Option<u64>,
    pub was_fallback: bool,
    pub error: Option<String>,
    pub status: UsageStatus,
}

/// A successful completion from a provider.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub latency_ms: u64,
}

/// Provider failure, with rate limiting kept distinct so callers can
/// account for it separately.
#[derive(Debug)]
pub enum LlmError {
    RateLimited(String),
    Other(String),
}

impl LlmError {
    pub fn message(&self) -> &str {
        match self {
            LlmError::RateLimited(msg) | LlmError::Other(msg) => msg,
        }
    }

    pub fn status(&self) -> UsageStatus {
        match self {
            LlmError::RateLimited(_) => UsageStatus::RateLimited,
            LlmError::Other(_) => UsageStatus::Error,
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::RateLimited(msg) => write!(f, "rate limited: {}", msg),
            LlmError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for LlmError {}
