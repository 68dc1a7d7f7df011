use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngageError, Result};

/// Top-level configuration for the Engage service.
///
/// Loaded from `~/.engage/config.toml` by default. Every section falls back
/// to its defaults when omitted, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngageConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub clinic: ClinicConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl EngageConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngageConfig = toml::from_str(&content)?;
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
            toml::to_string_pretty(self).map_err(|e| EngageError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.chat.max_message_length == 0 {
            return Err(EngageError::Config(
                "chat.max_message_length must be greater than zero".to_string(),
            ));
        }
        if self.backend.timeout_secs == 0 {
            return Err(EngageError::Config(
                "backend.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.backend.temperature) {
            return Err(EngageError::Config(format!(
                "backend.temperature must be within 0.0..=2.0, got {}",
                self.backend.temperature
            )));
        }
        if self.backend.kind == BackendKind::Remote && self.backend.base_url.trim().is_empty() {
            return Err(EngageError::Config(
                "backend.base_url is required for the remote backend".to_string(),
            ));
        }
        Ok(())
    }
}

/// General server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// HTTP server port.
    pub port: u16,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3030,
            log_level: "info".to_string(),
        }
    }
}

/// Which chat backend the conversation controller talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Call the Generative Language API directly.
    Gemini,
    /// Proxy every turn through a host chat service (`/chat/start`, `/chat/send`).
    Remote,
}

impl std::str::FromStr for BackendKind {
    type Err = EngageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(BackendKind::Gemini),
            "remote" => Ok(BackendKind::Remote),
            other => Err(EngageError::Config(format!(
                "unknown backend '{}', expected 'gemini' or 'remote'",
                other
            ))),
        }
    }
}

/// Chat backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Model used for conversations.
    pub model: String,
    /// Model used to generate example prompts.
    pub prompt_model: String,
    /// API credential. Falls back to `GEMINI_API_KEY`, then `API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Generative Language API root.
    pub gemini_url: String,
    /// Host chat service root for the remote backend.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub temperature: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Gemini,
            model: "gemini-2.5-flash".to_string(),
            prompt_model: "gemini-2.5-flash".to_string(),
            api_key: None,
            gemini_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            base_url: "http://127.0.0.1:8080/api".to_string(),
            timeout_secs: 120,
            temperature: 0.7,
        }
    }
}

impl BackendConfig {
    /// Resolve the API credential: config value, then `GEMINI_API_KEY`, then `API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Clinic-facing settings baked into the assistant briefing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicConfig {
    /// Online scheduling portal. Clicking it counts as a conversion.
    pub scheduling_url: String,
    /// Patient used by scripted demo chats.
    pub demo_patient: String,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            scheduling_url: crate::directory::SCHEDULING_URL.to_string(),
            demo_patient: "James Washington".to_string(),
        }
    }
}

/// Conversation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum user message length in characters.
    pub max_message_length: usize,
    /// Requests per second accepted by the conversation routes.
    pub requests_per_second: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 2000,
            requests_per_second: 20,
        }
    }
}
