use crate::error::GatewayError;
use crate::gateway::{non_empty, status_error, AssistantGateway};
use crate::transcript::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: super::http_client(timeout),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4-turbo".to_string(),
            "gpt-4".to_string(),
        ]
    }
}

#[async_trait]
impl AssistantGateway for OpenAIClient {
    async fn complete(&self, transcript: &[Message]) -> Result<String, GatewayError> {
        let request = OpenAIRequest {
            model: &self.model,
            messages: transcript
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: 0.7,
            max_tokens: 1000,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", BASE_URL))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error("OpenAI", status, text));
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        non_empty(
            "OpenAI",
            openai_response
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content),
        )
    }

    fn describe(&self) -> String {
        format!("OpenAI: {}", self.model)
    }
}
