pub mod claude;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use crate::config::Config;
use crate::gateway::AssistantGateway;
use crate::provider::Provider;
use anyhow::{anyhow, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
}

/// Build the gateway for the configured provider and model
pub fn build_gateway(config: &Config) -> Result<Arc<dyn AssistantGateway>> {
    let provider = config.provider()?;
    let model = config.model()?;
    let timeout = config.request_timeout();

    let missing_key = || {
        anyhow!(
            "{} API key not configured. Set {} or add it to {:?}",
            provider.display_name(),
            provider.api_key_env().unwrap_or("the API key"),
            Config::get_config_path().unwrap_or_default()
        )
    };

    let gateway: Arc<dyn AssistantGateway> = match provider {
        Provider::Ollama => Arc::new(OllamaClient::new(config.ollama_url(), &model, timeout)),
        Provider::Claude => {
            let key = config.api_key(provider).ok_or_else(missing_key)?;
            Arc::new(ClaudeClient::new(&key, &model, timeout))
        }
        Provider::OpenAI => {
            let key = config.api_key(provider).ok_or_else(missing_key)?;
            Arc::new(OpenAIClient::new(&key, &model, timeout))
        }
    };
    tracing::info!("Using {}", gateway.describe());
    Ok(gateway)
}
