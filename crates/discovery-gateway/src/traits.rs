use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::Message;

/// Errors that can occur while talking to a chat-completion provider
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request failed: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Stream failed: {0}")]
    StreamFailed(String),
}

impl GatewayError {
    /// Whether a fresh attempt of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout(_) => true,
            GatewayError::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Map a non-success HTTP status to a gateway error
pub fn error_for_status(status: u16, body: &str) -> GatewayError {
    match status {
        401 => GatewayError::AuthenticationFailed("Invalid API key".to_string()),
        403 => GatewayError::AuthenticationFailed("Access denied".to_string()),
        _ => GatewayError::Http {
            status,
            body: body.to_string(),
        },
    }
}

/// Reasoning effort hint passed through to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortHint {
    Low,
    Medium,
    High,
}

/// A chat-completion request: model plus the full role-tagged message list
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub effort: Option<EffortHint>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            effort: None,
        }
    }

    pub fn with_effort(mut self, effort: EffortHint) -> Self {
        self.effort = Some(effort);
        self
    }

    /// Total characters across all message contents
    pub fn prompt_len(&self) -> usize {
        self.messages.iter().map(|m| m.content.len()).sum()
    }
}

/// Lazy, finite, forward-only sequence of text deltas
pub type DeltaStream = BoxStream<'static, Result<String, GatewayError>>;

/// Observer for progressive rendering of streamed text
pub type DeltaCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// The seam between the session controller and an LLM provider
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Human-readable provider name (e.g., "OpenAI", "Gemini")
    fn name(&self) -> &str;

    /// Request a single, complete response
    async fn complete(&self, request: &ChatRequest) -> Result<String, GatewayError>;

    /// Request a streamed response
    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status_auth() {
        assert!(matches!(
            error_for_status(401, ""),
            GatewayError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            error_for_status(403, ""),
            GatewayError::AuthenticationFailed(_)
        ));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(error_for_status(429, "slow down").is_retryable());
        assert!(error_for_status(503, "unavailable").is_retryable());
        assert!(!error_for_status(400, "bad request").is_retryable());
        assert!(!error_for_status(401, "").is_retryable());
        assert!(!GatewayError::MalformedResponse("x".into()).is_retryable());
    }

    #[test]
    fn test_prompt_len() {
        let request = ChatRequest::new(
            "m",
            vec![Message::system("abc"), Message::user("de")],
        );
        assert_eq!(request.prompt_len(), 5);
        assert!(request.effort.is_none());
        assert_eq!(
            request.with_effort(EffortHint::Low).effort,
            Some(EffortHint::Low)
        );
    }
}
