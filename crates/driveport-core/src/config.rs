//! Configuration module for Driveport.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::token::DEFAULT_REFRESH_FRACTION;

/// Default Microsoft identity platform authorization endpoint (common tenant)
pub const DEFAULT_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";

/// Default Microsoft identity platform token endpoint (common tenant)
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Default drive API root for the signed-in user
pub const DEFAULT_API_BASE_URL: &str = "https://graph.microsoft.com/v1.0/me/drive";

/// Default private-scheme redirect URI handed back to the application
pub const DEFAULT_REDIRECT_URI: &str = "driveport://auth";

/// Default OAuth scopes for drive access
pub const DEFAULT_SCOPES: &[&str] = &["user.read", "files.readwrite", "offline_access"];

/// Client id registered for the standard edition
pub const STANDARD_CLIENT_ID: &str = "7f3c6a2e-1b54-4d0f-9a8e-52c1d7e4b913";

/// Client id registered for the pro edition
pub const PRO_CLIENT_ID: &str = "c2e9b4d1-6a37-48f5-8b0c-9e1f3a7d5c24";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Driveport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub tokens: TokenConfig,
    pub logging: LoggingConfig,
}

/// Licensing mode of the host application.
///
/// Each edition is registered with the identity platform under its own
/// client id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEdition {
    #[default]
    Standard,
    Pro,
}

impl AppEdition {
    /// The fixed client id registered for this edition.
    pub fn client_id(self) -> &'static str {
        match self {
            AppEdition::Standard => STANDARD_CLIENT_ID,
            AppEdition::Pro => PRO_CLIENT_ID,
        }
    }
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Licensing mode that selects the registered client id.
    pub edition: AppEdition,
    /// Explicit client id. Overrides the edition's id when set.
    pub client_id: Option<String>,
    /// Private-scheme redirect URI registered with the identity platform.
    pub redirect_uri: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
    /// Authorization endpoint opened in the browser.
    pub authorize_url: String,
    /// Token endpoint used for code and refresh exchanges.
    pub token_url: String,
}

/// Drive API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Root of the drive API, e.g. `https://graph.microsoft.com/v1.0/me/drive`.
    pub base_url: String,
    /// Maximum number of HTTP exchanges in flight at once.
    pub max_concurrent_requests: usize,
    /// Per-request transport timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Token freshness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Fraction of the declared lifespan after which a token is refreshed.
    pub refresh_fraction: f64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON-formatted log lines instead of human-readable ones.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "Using default configuration");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/driveport/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("driveport")
            .join("config.yaml")
    }
}

impl AuthConfig {
    /// The client id sent to the identity platform.
    pub fn effective_client_id(&self) -> &str {
        self.client_id
            .as_deref()
            .unwrap_or_else(|| self.edition.client_id())
    }

    /// Scopes joined into the space-separated form the token endpoint expects.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// The URI scheme of the redirect URI, e.g. `driveport`.
    pub fn callback_scheme(&self) -> Option<String> {
        url::Url::parse(&self.redirect_uri)
            .ok()
            .map(|u| u.scheme().to_string())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            edition: AppEdition::default(),
            client_id: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            max_concurrent_requests: 4,
            request_timeout_secs: 60,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_fraction: DEFAULT_REFRESH_FRACTION,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"api.base_url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- auth ---
        if self.auth.effective_client_id().trim().is_empty() {
            errors.push(ValidationError {
                field: "auth.client_id".into(),
                message: "must not be empty".into(),
            });
        }
        if self.auth.callback_scheme().is_none() {
            errors.push(ValidationError {
                field: "auth.redirect_uri".into(),
                message: format!("not a valid URI: {}", self.auth.redirect_uri),
            });
        }
        if self.auth.scopes.is_empty() {
            errors.push(ValidationError {
                field: "auth.scopes".into(),
                message: "at least one scope is required".into(),
            });
        }
        for (field, value) in [
            ("auth.authorize_url", &self.auth.authorize_url),
            ("auth.token_url", &self.auth.token_url),
            ("api.base_url", &self.api.base_url),
        ] {
            if url::Url::parse(value).is_err() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("not a valid URL: {value}"),
                });
            }
        }

        // --- api ---
        if self.api.max_concurrent_requests == 0 {
            errors.push(ValidationError {
                field: "api.max_concurrent_requests".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.api.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "api.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- tokens ---
        let fraction = self.tokens.refresh_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            errors.push(ValidationError {
                field: "tokens.refresh_fraction".into(),
                message: format!("must be in range (0, 1], got {fraction}"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use driveport_core::config::{AppEdition, ConfigBuilder};
///
/// let config = ConfigBuilder::new()
///     .auth_edition(AppEdition::Pro)
///     .api_max_concurrent_requests(2)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- auth ---

    pub fn auth_edition(mut self, edition: AppEdition) -> Self {
        self.config.auth.edition = edition;
        self
    }

    pub fn auth_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(client_id.into());
        self
    }

    pub fn auth_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.auth.redirect_uri = uri.into();
        self
    }

    pub fn auth_scopes(mut self, scopes: Vec<String>) -> Self {
        self.config.auth.scopes = scopes;
        self
    }

    pub fn auth_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth.authorize_url = url.into();
        self
    }

    pub fn auth_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth.token_url = url.into();
        self
    }

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_max_concurrent_requests(mut self, n: usize) -> Self {
        self.config.api.max_concurrent_requests = n;
        self
    }

    pub fn api_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.api.request_timeout_secs = seconds;
        self
    }

    // --- tokens ---

    pub fn tokens_refresh_fraction(mut self, fraction: f64) -> Self {
        self.config.tokens.refresh_fraction = fraction;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
