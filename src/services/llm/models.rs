//! Provider settings and text-generation errors

use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Settings
// ============================================================================

/// Provider family. The core dispatches on this value and interprets
/// nothing else about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    ChatCompletions,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatCompletions => "chat_completions",
            Self::Gemini => "gemini",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "chat_completions" | "openai" | "deepseek" | "openrouter" => {
                Some(Self::ChatCompletions)
            },
            "gemini" | "google" => Some(Self::Gemini),
            _ => None,
        }
    }
}

/// Connection settings for one text-generation provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

// ============================================================================
// Errors
// ============================================================================

/// Text-generation backend errors
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("no text-generation provider configured")]
    NoProviderConfigured,

    #[error("backend API error: {0}")]
    Api(String),

    #[error("backend timeout after {0}s")]
    Timeout(u64),

    #[error("backend rate limited, retry after {0}s")]
    RateLimited(u64),

    #[error("backend response unusable: {0}")]
    Parse(String),
}

impl GenerateError {
    /// Transport-level failures (the backend was unreachable or refused
    /// us). These gain nothing from a prompt-hint retry, unlike
    /// response-shape failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Api(_) | Self::Timeout(_) | Self::RateLimited(_))
    }
}
