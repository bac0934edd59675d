use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    Claude,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Provider::Ollama),
            "claude" => Some(Provider::Claude),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::OpenAI, Provider::Claude, Provider::Ollama]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama (Local)",
            Provider::Claude => "Claude (Anthropic)",
            Provider::OpenAI => "ChatGPT (OpenAI)",
        }
    }

    /// Model used when the configuration does not name one
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Ollama => "llama3.2:latest",
            Provider::Claude => "claude-sonnet-4-20250514",
            Provider::OpenAI => "gpt-4",
        }
    }

    /// Environment variable that overrides the stored API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::Ollama => None,
            Provider::Claude => Some("ANTHROPIC_API_KEY"),
            Provider::OpenAI => Some("OPENAI_API_KEY"),
        }
    }
}
