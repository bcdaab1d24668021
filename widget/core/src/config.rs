//! TOML Configuration File Support
//!
//! Local settings for a widget instance (where the API lives, how often to
//! poll, where local storage is kept). These are distinct from the
//! server-supplied [`WidgetConfig`](crate::models::WidgetConfig).
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! The file lives at `$XDG_CONFIG_HOME/chatbot-widget/widget.toml`.
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "https://bot.example.com/"
//! request_timeout_secs = 30
//!
//! [widget]
//! title = "Support"
//! poll_interval_secs = 30
//! form_submit_timeout_ms = 5000
//!
//! [storage]
//! path = "/home/me/.local/share/chatbot-widget/storage.json"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default API base
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/";
/// Default config poll interval while the panel is open
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Default client-side form submission deadline
pub const DEFAULT_FORM_TIMEOUT: Duration = Duration::from_millis(5000);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {}: {source}", .path.display())]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where the effective configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Structures
// =============================================================================

/// `[api]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiToml {
    /// Base URL of the widget API
    pub base_url: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// `[widget]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetToml {
    /// Fallback panel title when the server sends no bot name
    pub title: Option<String>,
    /// Config poll interval while the panel is open
    pub poll_interval_secs: Option<u64>,
    /// Client-side form submission deadline
    pub form_submit_timeout_ms: Option<u64>,
}

/// `[storage]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Local store file
    pub path: Option<PathBuf>,
}

/// Root of the TOML file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSettingsToml {
    /// API settings
    pub api: ApiToml,
    /// Widget behaviour settings
    pub widget: WidgetToml,
    /// Storage settings
    pub storage: StorageToml,
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Fully resolved widget settings
#[derive(Clone, Debug)]
pub struct WidgetSettings {
    /// API base URL, always ending in `/`
    pub api_base: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Fallback panel title
    pub title: String,
    /// Config poll interval while the panel is open
    pub poll_interval: Duration,
    /// Client-side form submission deadline
    pub form_submit_timeout: Duration,
    /// Local store file (`None` = keep storage in memory)
    pub storage_path: Option<PathBuf>,
    /// File the settings were loaded from, if any
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            title: "ChatBot".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            form_submit_timeout: DEFAULT_FORM_TIMEOUT,
            storage_path: default_storage_path(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl WidgetSettings {
    /// Primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check value constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a zero poll interval,
    /// a zero form timeout, or an API base without an http(s) scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.form_submit_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "form_submit_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api base must be an http(s) URL, got {:?}",
                self.api_base
            )));
        }
        Ok(())
    }
}

/// Ensure an API base ends with exactly one trailing slash
#[must_use]
pub fn normalize_api_base(base: &str) -> String {
    let trimmed = base.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Default settings file path
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatbot-widget").join("widget.toml"))
}

/// Default local store path
#[must_use]
pub fn default_storage_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("chatbot-widget").join("storage.json"))
}

/// Load settings from the default path, env, and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resolved settings are invalid. A missing file is not an error.
pub fn load_settings() -> Result<WidgetSettings, ConfigError> {
    load_settings_from_path(default_config_path())
}

/// Load settings from a specific path, env, and defaults
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the resolved
/// settings fail validation.
pub fn load_settings_from_path(path: Option<PathBuf>) -> Result<WidgetSettings, ConfigError> {
    let mut settings = WidgetSettings::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let raw = std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                path: config_path.clone(),
                source: e,
            })?;

            let toml_settings: WidgetSettingsToml = toml::from_str(&raw)?;
            apply_toml(&mut settings, &toml_settings);
            settings.config_file_path = Some(config_path.clone());
            settings.source = ConfigSource::File;

            tracing::info!(path = %config_path.display(), "Loaded widget settings from file");
        } else {
            tracing::debug!(path = %config_path.display(), "Settings file not found, using defaults");
        }
    }

    apply_env(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn apply_toml(settings: &mut WidgetSettings, toml: &WidgetSettingsToml) {
    if let Some(ref base) = toml.api.base_url {
        settings.api_base = normalize_api_base(base);
    }
    if let Some(secs) = toml.api.request_timeout_secs {
        settings.request_timeout = Duration::from_secs(secs);
    }
    if let Some(ref title) = toml.widget.title {
        settings.title = title.clone();
    }
    if let Some(secs) = toml.widget.poll_interval_secs {
        settings.poll_interval = Duration::from_secs(secs);
    }
    if let Some(ms) = toml.widget.form_submit_timeout_ms {
        settings.form_submit_timeout = Duration::from_millis(ms);
    }
    if let Some(ref path) = toml.storage.path {
        settings.storage_path = Some(path.clone());
    }
}

fn apply_env(settings: &mut WidgetSettings) {
    let mut touched = false;

    if let Ok(base) = std::env::var("CHATBOT_API_BASE") {
        settings.api_base = normalize_api_base(&base);
        touched = true;
    }
    if let Some(secs) = env_u64("CHATBOT_REQUEST_TIMEOUT") {
        settings.request_timeout = Duration::from_secs(secs);
        touched = true;
    }
    if let Some(secs) = env_u64("CHATBOT_POLL_INTERVAL") {
        settings.poll_interval = Duration::from_secs(secs);
        touched = true;
    }
    if let Some(ms) = env_u64("CHATBOT_FORM_TIMEOUT_MS") {
        settings.form_submit_timeout = Duration::from_millis(ms);
        touched = true;
    }
    if let Ok(path) = std::env::var("CHATBOT_STORAGE_PATH") {
        settings.storage_path = Some(PathBuf::from(path));
        touched = true;
    }

    if touched {
        settings.source = ConfigSource::Env;
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring non-numeric environment value");
            None
        }
    }
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Overrides applied on top of file/env settings (highest priority)
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// API base override
    pub api_base: Option<String>,
    /// Storage path override
    pub storage_path: Option<PathBuf>,
    /// Poll interval override
    pub poll_interval_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create an empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set API base override
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Set storage path override
    #[must_use]
    pub fn with_storage_path(mut self, path: PathBuf) -> Self {
        self.storage_path = Some(path);
        self
    }

    /// Set poll interval override
    #[must_use]
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = Some(secs);
        self
    }

    /// Apply overrides, then re-validate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override produces an
    /// invalid configuration.
    pub fn apply(&self, settings: &mut WidgetSettings) -> Result<(), ConfigError> {
        if self.api_base.is_some() || self.storage_path.is_some() || self.poll_interval_secs.is_some()
        {
            settings.source = ConfigSource::Cli;
        }
        if let Some(ref base) = self.api_base {
            settings.api_base = normalize_api_base(base);
        }
        if let Some(ref path) = self.storage_path {
            settings.storage_path = Some(path.clone());
        }
        if let Some(secs) = self.poll_interval_secs {
            settings.poll_interval = Duration::from_secs(secs);
        }
        settings.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
