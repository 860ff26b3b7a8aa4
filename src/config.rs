//! Translator configuration
//!
//! Settings start from environment variables and can be overridden by a JSON
//! file. Config files are written atomically via a temp file and a rename.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::mapper::BlockMap;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4.1-mini";
const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_MODEL: &str = "openai/gpt-4.1-mini";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Chat-completions provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// api.openai.com or a compatible server
    #[default]
    OpenAi,
    /// openrouter.ai
    OpenRouter,
}

impl Provider {
    /// Provider named by `AI_PROVIDER`; anything but `openrouter` means OpenAI.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("openrouter") {
            Provider::OpenRouter
        } else {
            Provider::OpenAi
        }
    }

    /// Environment variable holding the API key
    pub fn key_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    fn base_url_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_BASE_URL",
            Provider::OpenRouter => "OPENROUTER_BASE_URL",
        }
    }

    fn default_endpoint(self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_ENDPOINT,
            Provider::OpenRouter => OPENROUTER_ENDPOINT,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_MODEL,
            Provider::OpenRouter => OPENROUTER_MODEL,
        }
    }
}

/// Connection settings for the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerSettings {
    /// Which provider conventions to follow
    pub provider: Provider,
    /// Base URL; `/chat/completions` is appended
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// Bearer token, never written back to disk
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion length limit
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// `HTTP-Referer` header sent to OpenRouter
    pub site_url: Option<String>,
    /// `X-Title` header sent to OpenRouter
    pub app_name: Option<String>,
}

impl ReasonerSettings {
    /// Built-in defaults for a provider, ignoring the environment.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            endpoint: provider.default_endpoint().to_string(),
            model: provider.default_model().to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            site_url: None,
            app_name: None,
        }
    }

    /// Settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Settings from an arbitrary variable lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let provider = var("AI_PROVIDER")
            .map(|name| Provider::from_name(&name))
            .unwrap_or_default();
        let mut settings = Self::for_provider(provider);

        if let Some(endpoint) = var(provider.base_url_var()) {
            settings.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(model) = var("AI_MODEL") {
            settings.model = model;
        }
        settings.api_key = var(provider.key_var());
        if let Some(temperature) = var("EMMI_AI_TEMPERATURE").and_then(|v| v.parse::<f32>().ok()) {
            settings.temperature = temperature;
        }
        settings.max_tokens = var("EMMI_AI_MAX_TOKENS").and_then(|v| v.parse::<u32>().ok());
        if let Some(secs) = var("EMMI_AI_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            settings.timeout_secs = secs;
        }
        if provider == Provider::OpenRouter {
            settings.site_url = var("OPENROUTER_SITE_URL");
            settings.app_name = var("OPENROUTER_APP_NAME");
        }
        settings
    }

    /// Full chat-completions URL
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

impl Default for ReasonerSettings {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Top-level translator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Reasoning-service connection
    pub reasoner: ReasonerSettings,
    /// Skip the reasoning service entirely
    pub offline: bool,
    /// Try the keyword translator when the service gives nothing usable
    pub heuristic_fallback: bool,
    /// JSON file overriding the built-in block map
    pub block_map: Option<PathBuf>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            reasoner: ReasonerSettings::default(),
            offline: false,
            heuristic_fallback: true,
            block_map: None,
        }
    }
}

impl TranslatorConfig {
    /// Block map named by the config, or the built-in one
    pub fn load_block_map(&self) -> Result<BlockMap> {
        match &self.block_map {
            Some(path) => BlockMap::from_json_file(path),
            None => Ok(BlockMap::default()),
        }
    }
}

/// Load translator configuration from a JSON file
pub fn load_config(path: &Path) -> Result<TranslatorConfig> {
    let data = fs::read(path).with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: TranslatorConfig =
        serde_json::from_slice(&data).context("Failed to deserialize config")?;
    Ok(config)
}

/// Write translator configuration to a JSON file
pub fn write_config(path: &Path, config: &TranslatorConfig) -> Result<()> {
    let json = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;
    write_atomic(path, &json)
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
    file.write_all(data).context("Failed to write data")?;
    file.sync_all().context("Failed to sync file")?;
    drop(file);

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;
    Ok(())
}
