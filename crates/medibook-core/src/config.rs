use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MedibookError, Result};

/// Top-level configuration for the booking assistant.
///
/// Loaded from `~/.medibook/config.toml` by default. Every section falls back
/// to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedibookConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub faq: FaqConfig,
    #[serde(default)]
    pub generative: GenerativeConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
}

impl MedibookConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MedibookConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MedibookError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.medibook/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of recent messages handed to the generative backend.
    pub memory_window: usize,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            memory_window: 8,
            max_message_length: 2000,
        }
    }
}

/// FAQ matching and routing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaqConfig {
    /// Minimum cosine similarity for an authoritative FAQ answer.
    pub threshold: f32,
    /// Largest n-gram indexed: 1 for unigrams, 2 for unigrams + bigrams.
    pub max_ngram: usize,
    /// Consult the FAQ before booking-intent keywords.
    pub faq_before_booking: bool,
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            max_ngram: 1,
            faq_before_booking: false,
        }
    }
}

/// Optional text-generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerativeConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    /// Upper bound for one generation call.
    pub timeout_secs: u64,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://127.0.0.1:8080".to_string(),
            model: String::new(),
            api_key_env: "MEDIBOOK_LLM_API_KEY".to_string(),
            timeout_secs: 15,
        }
    }
}

impl GenerativeConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Content filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Terms that block a message outright (case-insensitive substring match).
    pub denylist: Vec<String>,
    /// Fixed reply sent when a message is blocked.
    pub refusal_message: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            denylist: [
                "idiot", "stupid", "kill", "bomb", "idiota", "estupido", "estúpido", "matar",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            refusal_message:
                "I can't help with that kind of message. Please keep the conversation respectful."
                    .to_string(),
        }
    }
}
