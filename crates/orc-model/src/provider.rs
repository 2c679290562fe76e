// Copyright (c) 2024-2026 The orc Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// Failure taxonomy a provider must be able to surface to its caller
/// (Agent Driver). Every other failure is an opaque `anyhow::Error`.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("cancelled")]
    Cancelled,
    #[error("context too long")]
    ContextTooLong,
    #[error("rate limited")]
    RateLimited,
    #[error("authentication failed")]
    Auth,
    #[error("transient provider error: {0}")]
    Transient(String),
    #[error("malformed history: {0}")]
    MalformedHistory(String),
}

/// Classify a non-2xx HTTP response into the failure taxonomy callers need
/// to react to (§4.1): 401/403 are auth failures, 429 is rate-limiting, a
/// 400 whose body complains about length/token-count is context-too-long,
/// any other 400 is a malformed-history complaint from the provider, and
/// 5xx/other statuses are treated as transient. Shared by every
/// [`ModelProvider`] implementation that talks HTTP so the classification
/// stays consistent across providers.
pub fn classify_http_error(status: u16, body: &str) -> ProviderError {
    let lower = body.to_ascii_lowercase();
    match status {
        401 | 403 => ProviderError::Auth,
        429 => ProviderError::RateLimited,
        400 if is_context_length_complaint(&lower) => ProviderError::ContextTooLong,
        400 => ProviderError::MalformedHistory(body.to_string()),
        500..=599 => ProviderError::Transient(format!("{status}: {body}")),
        _ => ProviderError::Transient(format!("{status}: {body}")),
    }
}

fn is_context_length_complaint(lower_body: &str) -> bool {
    const MARKERS: &[&str] = &[
        "context length",
        "context_length",
        "maximum context",
        "too many tokens",
        "prompt is too long",
        "exceeds the model's maximum",
        "input is too long",
    ];
    MARKERS.iter().any(|m| lower_body.contains(m))
}

#[cfg(test)]
mod classify_tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_auth_error() {
        assert!(matches!(classify_http_error(401, ""), ProviderError::Auth));
        assert!(matches!(classify_http_error(403, ""), ProviderError::Auth));
    }

    #[test]
    fn rate_limit_status_maps_to_rate_limited() {
        assert!(matches!(classify_http_error(429, ""), ProviderError::RateLimited));
    }

    #[test]
    fn context_length_complaint_in_a_400_maps_to_context_too_long() {
        let body = r#"{"error": {"message": "This model's maximum context length is 200000 tokens"}}"#;
        assert!(matches!(classify_http_error(400, body), ProviderError::ContextTooLong));
    }

    #[test]
    fn other_400_maps_to_malformed_history() {
        assert!(matches!(classify_http_error(400, "invalid role"), ProviderError::MalformedHistory(_)));
    }

    #[test]
    fn server_error_maps_to_transient() {
        assert!(matches!(classify_http_error(503, "overloaded"), ProviderError::Transient(_)));
    }
}

/// A streaming LLM completion backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name (used for status display and the
    /// per-provider client cache key).
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response. Each
    /// `ResponseEvent` is surfaced to the caller as it arrives; the caller
    /// is responsible for reconstructing tool_use blocks from the
    /// per-index `ToolCall` deltas.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}
