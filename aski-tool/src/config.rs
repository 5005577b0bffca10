use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use aski_core::{DEFAULT_MODEL, FailurePolicy, RequestParams, Role};
use serde::Deserialize;
use tracing::warn;

use crate::error::AskiError;
use crate::provider::Provider;
use crate::store::default_store_path;

const DEFAULT_SYSTEM_CONTEXT: &str =
    "You are a helpful assistant. Answer as concisely as possible.";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    /// Model used to title sessions; each provider has its own default.
    pub summary_model: Option<String>,
    pub default_profile: Option<String>,
    pub on_stream_error: FailurePolicy,
    pub store: StoreConfig,
    pub profiles: Vec<Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            base_url: None,
            anthropic_api_key: None,
            anthropic_base_url: None,
            summary_model: None,
            default_profile: None,
            on_stream_error: FailurePolicy::default(),
            store: StoreConfig::default(),
            profiles: vec![Profile::default()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

/// A turn replayed into every fresh conversation of a profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InitialMessage {
    pub role: Role,
    pub content: String,
}

/// A named bundle of model, system context and generation parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub model: String,
    pub provider: Option<Provider>,
    pub system_context: String,
    pub messages: Vec<InitialMessage>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub logit_bias: Option<BTreeMap<String, i32>>,
    pub json_mode: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            system_context: DEFAULT_SYSTEM_CONTEXT.to_string(),
            messages: Vec::new(),
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            logit_bias: None,
            json_mode: false,
        }
    }
}

impl Profile {
    /// The configured provider, else Anthropic for `claude` models.
    pub fn provider(&self) -> Provider {
        self.provider.unwrap_or_else(|| Provider::infer(&self.model))
    }

    pub fn params(&self) -> RequestParams {
        RequestParams {
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stop: self.stop.clone(),
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            logit_bias: self.logit_bias.clone(),
            json_mode: self.json_mode,
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        if config.profiles.is_empty() {
            config.profiles.push(Profile::default());
        }
        Ok(config)
    }

    /// Picks the named profile, else the configured default, else the first.
    pub fn profile(&self, name: Option<&str>) -> Result<&Profile, AskiError> {
        match name.or(self.default_profile.as_deref()) {
            Some(name) => self
                .profiles
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| AskiError::UnknownProfile(name.to_string())),
            None => self
                .profiles
                .first()
                .ok_or_else(|| AskiError::UnknownProfile(String::new())),
        }
    }

    pub fn base_url(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAi => self
                .base_url
                .as_deref()
                .unwrap_or(aski_api::openai::DEFAULT_BASE_URL),
            Provider::Anthropic => self
                .anthropic_base_url
                .as_deref()
                .unwrap_or(aski_api::anthropic::DEFAULT_BASE_URL),
        }
    }

    pub fn store_path(&self, cli_path: Option<PathBuf>) -> PathBuf {
        cli_path
            .or_else(|| self.store.path.clone())
            .unwrap_or_else(default_store_path)
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("aski"))
}

fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };

    let Ok(content) = std::fs::read_to_string(&path) else {
        return Config::default();
    };

    Config::parse(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring unparsable config");
        Config::default()
    })
}

/// Opens `dir` in the platform file manager, creating it first.
pub fn open_config_dir(dir: &Path) -> Result<(), AskiError> {
    std::fs::create_dir_all(dir)?;
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    };
    Command::new(opener).arg(dir).spawn()?;
    Ok(())
}

/// Reads the provider's key from its environment variable, else the config.
pub fn load_api_key(config: &Config, provider: Provider) -> Result<String, AskiError> {
    let env_var = provider.key_env_var();
    if let Ok(key) = std::env::var(env_var) {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    let configured = match provider {
        Provider::OpenAi => &config.openai_api_key,
        Provider::Anthropic => &config.anthropic_api_key,
    };
    if let Some(key) = configured {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }

    Err(AskiError::ApiKeyNotFound(env_var))
}
