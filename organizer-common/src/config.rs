//! Resolved organizer configuration
//!
//! The configuration arrives fully resolved from an external loader (CLI,
//! config file, environment). The organizer only parses and validates it; it
//! never reads the environment or configuration files on its own.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Classification backend selected at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local model server (Ollama-compatible `/generate` API)
    #[default]
    Ollama,
    /// Hosted chat-completions API
    #[serde(alias = "openai")]
    Chatgpt,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Chatgpt => "chatgpt",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "mistral:7b",
            ProviderKind::Chatgpt => "gpt-4o-mini",
        }
    }

    fn default_timeout_secs(&self) -> u64 {
        match self {
            ProviderKind::Ollama => 180,
            ProviderKind::Chatgpt => 120,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which recipes a categorization run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CategorizeMode {
    /// Recipes without tags; only tags are requested
    MissingTags,
    /// Recipes without categories
    MissingCategories,
    /// Recipes missing either categories or tags
    #[default]
    MissingEither,
    /// Every recipe; results replace existing assignments
    Recat,
}

impl CategorizeMode {
    /// Derive the mode from the `--missing-tags` / `--missing-categories` /
    /// `--recat` style switches an entrypoint exposes.
    pub fn from_flags(recat: bool, missing_tags: bool, missing_categories: bool) -> Self {
        if recat {
            return CategorizeMode::Recat;
        }
        match (missing_tags, missing_categories) {
            (true, false) => CategorizeMode::MissingTags,
            (false, true) => CategorizeMode::MissingCategories,
            _ => CategorizeMode::MissingEither,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CategorizeMode::MissingTags => "missing-tags",
            CategorizeMode::MissingCategories => "missing-categories",
            CategorizeMode::MissingEither => "missing-either",
            CategorizeMode::Recat => "recat",
        }
    }

    /// Whether categories are requested from the provider in this mode
    pub fn requests_categories(&self) -> bool {
        !matches!(self, CategorizeMode::MissingTags)
    }
}

impl fmt::Display for CategorizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local model server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub url: String,
    pub options: OllamaOptions,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api".to_string(),
            options: OllamaOptions::default(),
        }
    }
}

/// Generation options forwarded verbatim to the local model server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaOptions {
    pub num_ctx: u32,
    pub temperature: f32,
    pub num_predict: u32,
    pub top_p: f32,
    pub num_thread: u32,
}

impl Default for OllamaOptions {
    fn default() -> Self {
        Self {
            num_ctx: 1024,
            temperature: 0.1,
            num_predict: 96,
            top_p: 0.8,
            num_thread: 8,
        }
    }
}

/// Hosted chat-completions settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub base_url: String,
    /// Bearer token; handed over by the entrypoint's secret resolution
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Outgoing request ceiling; `None` disables client-side throttling
    pub requests_per_second: Option<u32>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            requests_per_second: None,
        }
    }
}

/// Tag cleanup heuristics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// Names longer than this are noisy when `delete_noisy` is set
    pub max_name_length: usize,
    /// Tags used by at most this many recipes are candidates
    pub min_usage: u32,
    pub delete_noisy: bool,
    pub only_unused: bool,
    /// Allow deleting items that are still in use
    pub force: bool,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            max_name_length: 24,
            min_usage: 0,
            delete_noisy: false,
            only_unused: false,
            force: false,
        }
    }
}

/// Fully resolved organizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    pub provider: ProviderKind,
    /// Model identifier; empty selects the provider's default
    pub model: String,
    pub batch_size: usize,
    pub max_workers: usize,
    /// Maximum attempts for a transient provider or store failure
    pub retry_ceiling: u32,
    /// First backoff delay; doubles on every retry
    pub retry_base_ms: u64,
    pub tag_max_name_length: usize,
    pub tag_min_usage: u32,
    pub dry_run: bool,
    pub mode: CategorizeMode,
    /// Result cache location; `None` selects `cache/results_<provider>.json`
    pub cache_path: Option<PathBuf>,
    /// Provider request timeout; `None` selects the provider default
    pub request_timeout_secs: Option<u64>,
    pub ollama: OllamaSettings,
    pub chat: ChatSettings,
    pub cleanup: CleanupSettings,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: String::new(),
            batch_size: 2,
            max_workers: 3,
            retry_ceiling: 3,
            retry_base_ms: 1250,
            tag_max_name_length: 24,
            tag_min_usage: 0,
            dry_run: false,
            mode: CategorizeMode::default(),
            cache_path: None,
            request_timeout_secs: None,
            ollama: OllamaSettings::default(),
            chat: ChatSettings::default(),
            cleanup: CleanupSettings::default(),
        }
    }
}

impl OrganizerConfig {
    /// Parse a resolved TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: OrganizerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Model identifier, falling back to the provider default
    pub fn model_id(&self) -> &str {
        if self.model.trim().is_empty() {
            self.provider.default_model()
        } else {
            self.model.trim()
        }
    }

    pub fn resolved_cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(|| {
            PathBuf::from("cache").join(format!("results_{}.json", self.provider.as_str()))
        })
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .unwrap_or_else(|| self.provider.default_timeout_secs())
    }

    /// Reject invalid option combinations before any remote call is made
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".to_string()));
        }
        if self.retry_ceiling == 0 {
            return Err(Error::Config("retry_ceiling must be at least 1".to_string()));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.cleanup.max_name_length == 0 {
            return Err(Error::Config(
                "cleanup.max_name_length must be greater than zero".to_string(),
            ));
        }

        match self.provider {
            ProviderKind::Ollama => {
                if self.ollama.url.trim().is_empty() {
                    return Err(Error::Config("ollama.url is empty".to_string()));
                }
            }
            ProviderKind::Chatgpt => {
                let has_key = self
                    .chat
                    .api_key
                    .as_deref()
                    .map(|k| !k.trim().is_empty())
                    .unwrap_or(false);
                if !has_key {
                    return Err(Error::Config(
                        "chat.api_key is empty; the hosted provider requires an API key"
                            .to_string(),
                    ));
                }
                if self.chat.base_url.trim().is_empty() {
                    return Err(Error::Config("chat.base_url is empty".to_string()));
                }
                if self.chat.requests_per_second == Some(0) {
                    return Err(Error::Config(
                        "chat.requests_per_second must be greater than zero".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}
