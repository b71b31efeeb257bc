use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

pub const ENV_API_BASE_URL: &str = "TODO_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TODO_REQUEST_TIMEOUT_SECS";
pub const ENV_LOG_LEVEL: &str = "TODO_LOG_LEVEL";
pub const ENV_TOKEN_DIR: &str = "TODO_TOKEN_DIR";

/// Errors raised while resolving a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported configuration format. Use 'yaml' or 'json'.")]
    UnsupportedFormat,

    #[error("Invalid {name} value: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// The resolved client configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the todo REST API
    pub api_base_url: Url,

    /// Overall deadline for a single request, in seconds
    pub request_timeout_secs: u64,

    /// Default log filter directive
    pub log_level: String,

    /// Directory holding the persisted session token (platform config
    /// directory when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn fallback_base_url() -> Url {
    Url::parse(DEFAULT_API_BASE_URL).expect("default API base URL is valid")
}

fn parse_base_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidValue {
        name,
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            name,
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }
    Ok(url)
}

impl ClientConfig {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            api_base_url: fallback_base_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            token_dir: None,
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// File values win over environment variables, which only fill in values
    /// still at their defaults. `api_override` (from the command line) wins
    /// over both.
    pub fn load_config(
        config_path: Option<PathBuf>,
        api_override: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::with_defaults();
        let mut config = defaults.clone();

        if let Some(path) = config_path {
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            config = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => serde_yml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                _ => return Err(ConfigError::UnsupportedFormat),
            };
        }

        if config.api_base_url == defaults.api_base_url {
            if let Ok(raw) = env::var(ENV_API_BASE_URL) {
                config.api_base_url = parse_base_url(ENV_API_BASE_URL, &raw)?;
            }
        }
        if config.request_timeout_secs == defaults.request_timeout_secs {
            if let Ok(raw) = env::var(ENV_REQUEST_TIMEOUT_SECS) {
                config.request_timeout_secs =
                    raw.trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue {
                            name: ENV_REQUEST_TIMEOUT_SECS,
                            reason: "must be a whole number of seconds".to_string(),
                        })?;
            }
        }
        if config.log_level == defaults.log_level {
            if let Ok(level) = env::var(ENV_LOG_LEVEL) {
                config.log_level = level;
            }
        }
        if config.token_dir.is_none() {
            if let Ok(dir) = env::var(ENV_TOKEN_DIR) {
                config.token_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(raw) = api_override {
            config.api_base_url = parse_base_url("api base URL", raw)?;
        }

        config.validate().map_err(|errors| ConfigError::InvalidValue {
            name: "configuration",
            reason: errors.join("; "),
        })?;

        Ok(config)
    }

    /// Overall request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory holding the persisted token.
    #[must_use]
    pub fn resolved_token_dir(&self) -> PathBuf {
        self.token_dir.clone().unwrap_or_else(|| {
            BaseDirs::new()
                .map(|dirs| dirs.config_dir().join("todo"))
                .unwrap_or_else(|| PathBuf::from("./.todo"))
        })
    }

    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.request_timeout_secs == 0 {
            errors.push("Invalid request timeout. Must be greater than 0.".to_string());
        }

        if !matches!(self.api_base_url.scheme(), "http" | "https") {
            errors.push(format!(
                "Invalid API base URL {}: scheme must be http or https",
                self.api_base_url
            ));
        }

        if self.api_base_url.cannot_be_a_base() {
            errors.push(format!(
                "Invalid API base URL {}: cannot be used as a base",
                self.api_base_url
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
