//! The assistant as seen by the pipeline: one remote call that turns a
//! transcript into the next assistant message.

use crate::error::GatewayError;
use crate::transcript::Message;
use async_trait::async_trait;
use reqwest::StatusCode;

#[async_trait]
pub trait AssistantGateway: Send + Sync {
    /// Produce the next assistant message for `transcript`.
    ///
    /// The transcript is always complete, system message included. Any
    /// context-window management belongs to the implementation.
    async fn complete(&self, transcript: &[Message]) -> Result<String, GatewayError>;

    /// Short human-readable name, e.g. "OpenAI: gpt-4o"
    fn describe(&self) -> String;
}

/// Map a non-success HTTP status to a gateway error
pub(crate) fn status_error(provider: &str, status: StatusCode, body: String) -> GatewayError {
    let detail = format!("{} API error {}: {}", provider, status, body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::RateLimited(detail)
    } else {
        GatewayError::RemoteUnavailable(detail)
    }
}

/// Reject empty completions
pub(crate) fn non_empty(provider: &str, text: Option<String>) -> Result<String, GatewayError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(GatewayError::InvalidResponse(format!(
            "{} returned an empty reply",
            provider
        ))),
    }
}
