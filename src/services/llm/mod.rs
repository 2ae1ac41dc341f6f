//! Text-Generation Backend Module
//!
//! One narrow interface over the configured text-generation provider.
//! Everything upstream (compiler, repair loop, strategy selection) speaks
//! through [`TextGenerator`] and stays identical regardless of which
//! provider family is configured.
//!
//! Two provider families are supported:
//! - OpenAI-compatible `/chat/completions` HTTP APIs (OpenAI, DeepSeek,
//!   OpenRouter, Azure, local gateways)
//! - Google Gemini `generateContent` REST API

mod client;
mod models;

pub use client::{ChatCompletionsBackend, GeminiBackend, TextGenerator, backend_from_settings};
pub use models::{GenerateError, ProviderKind, ProviderSettings};
