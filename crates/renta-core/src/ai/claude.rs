use crate::error::GatewayError;
use crate::gateway::{non_empty, status_error, AssistantGateway};
use crate::transcript::{Message, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: super::http_client(timeout),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "claude-sonnet-4-20250514".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
            "claude-3-5-haiku-20241022".to_string(),
        ]
    }
}

/// The messages API takes system text separately from the turns, and the
/// turns must open with a user message. Assistant messages before the first
/// user message (the seeded welcome) are folded into the system text.
fn split_system(transcript: &[Message]) -> (Option<String>, Vec<ClaudeMessage<'_>>) {
    let first_user = transcript
        .iter()
        .position(|m| m.role == Role::User)
        .unwrap_or(transcript.len());

    let system: Vec<&str> = transcript
        .iter()
        .enumerate()
        .filter(|(i, m)| m.role == Role::System || *i < first_user)
        .map(|(_, m)| m.content.as_str())
        .collect();
    let turns = transcript[first_user..]
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| ClaudeMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, turns)
}

#[async_trait]
impl AssistantGateway for ClaudeClient {
    async fn complete(&self, transcript: &[Message]) -> Result<String, GatewayError> {
        let (system, messages) = split_system(transcript);
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens: 1000,
            system,
            messages,
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error("Claude", status, text));
        }

        let claude_response: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        non_empty(
            "Claude",
            claude_response.content.into_iter().next().map(|c| c.text),
        )
    }

    fn describe(&self) -> String {
        format!("Claude: {}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_is_lifted_out() {
        let transcript = vec![
            Message { role: Role::System, content: "eres un asesor".into(), sequence: 0 },
            Message { role: Role::Assistant, content: "hola".into(), sequence: 1 },
            Message { role: Role::User, content: "buenas".into(), sequence: 2 },
            Message { role: Role::Assistant, content: "dime".into(), sequence: 3 },
        ];
        let (system, turns) = split_system(&transcript);
        assert_eq!(system.as_deref(), Some("eres un asesor\n\nhola"));
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].content, "dime");
    }
}
