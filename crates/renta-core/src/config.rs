use crate::merge::MergePolicy;
use crate::provider::Provider;
use crate::store::SqliteStore;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TAX_FORM: &str = "Modelo 100";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub ollama_url: Option<String>,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub tax_form: Option<String>,
    /// Keep values typed on the review screen when the chat extracts a new one
    #[serde(default)]
    pub protect_manual_edits: bool,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::OpenAI.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config {:?}: {}", config_path, e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("renta").join("config.json"))
    }

    pub fn provider(&self) -> Result<Provider> {
        match &self.provider {
            None => Ok(Provider::OpenAI),
            Some(name) => Provider::from_str(name)
                .ok_or_else(|| anyhow!("Unknown provider {:?} (expected ollama, claude or openai)", name)),
        }
    }

    pub fn model(&self) -> Result<String> {
        match &self.default_model {
            Some(model) => Ok(model.clone()),
            None => Ok(self.provider()?.default_model().to_string()),
        }
    }

    /// API key for `provider`. The environment variable wins over the stored key.
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        self.api_key_with(provider, |var| std::env::var(var).ok())
    }

    fn api_key_with(
        &self,
        provider: Provider,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        let from_env = provider.api_key_env().and_then(|var| env(var));
        let stored = match provider {
            Provider::Claude => self.claude_api_key.clone(),
            Provider::OpenAI => self.openai_api_key.clone(),
            Provider::Ollama => None,
        };
        from_env.or(stored).filter(|k| !k.trim().is_empty())
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url
            .as_deref()
            .unwrap_or(crate::ai::ollama::DEFAULT_BASE_URL)
    }

    pub fn tax_form(&self) -> &str {
        self.tax_form.as_deref().unwrap_or(DEFAULT_TAX_FORM)
    }

    pub fn merge_policy(&self) -> MergePolicy {
        if self.protect_manual_edits {
            MergePolicy::PreserveManual
        } else {
            MergePolicy::LastWriteWins
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => SqliteStore::default_path(),
        }
    }
}
