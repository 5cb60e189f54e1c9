//! Application configuration
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Every field has a default, so an empty file is valid.
//!
//! ```toml
//! [resolver]
//! kind = "remote"
//!
//! [remote]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o"
//! timeout_secs = 60
//! max_attempts = 3
//! base_delay_ms = 1000
//! max_tokens = 2000
//!
//! [cache]
//! enabled = true
//! capacity = 1024
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use chirality_remote::{RetryPolicy, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub(crate) const ENV_RESOLVER: &str = "CHIRALITY_RESOLVER";
pub(crate) const ENV_MODEL: &str = "CHIRALITY_MODEL";
pub(crate) const ENV_BASE_URL: &str = "CHIRALITY_BASE_URL";
pub(crate) const ENV_API_KEY: &str = "CHIRALITY_API_KEY";
pub(crate) const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub(crate) const ENV_LOG: &str = "CHIRALITY_LOG";

/// Configuration failures
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Which resolver backs the algebra
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ResolverKind {
    #[default]
    Synthetic,
    Remote,
}

impl FromStr for ResolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" => Ok(Self::Synthetic),
            "remote" => Ok(Self::Remote),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ResolverSection {
    pub(crate) kind: ResolverKind,
}

/// Chat-completions endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RemoteSection {
    pub(crate) base_url: String,
    pub(crate) model: String,
    /// Only ever taken from the environment
    #[serde(skip)]
    pub(crate) api_key: Option<String>,
    pub(crate) timeout_secs: u64,
    pub(crate) max_attempts: u32,
    pub(crate) base_delay_ms: u64,
    pub(crate) max_tokens: u32,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_attempts: 3,
            base_delay_ms: 1000,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl RemoteSection {
    #[must_use]
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.timeout(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CacheSection {
    pub(crate) enabled: bool,
    pub(crate) capacity: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LoggingSection {
    /// Default filter directive when `RUST_LOG` is unset
    pub(crate) level: String,
    pub(crate) json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) resolver: ResolverSection,
    pub(crate) remote: RemoteSection,
    pub(crate) cache: CacheSection,
    pub(crate) logging: LoggingSection,
}

impl AppConfig {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) fn with_resolver(mut self, kind: ResolverKind) -> Self {
        self.resolver.kind = kind;
        self
    }

    #[must_use]
    pub(crate) fn with_cache(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    #[must_use]
    pub(crate) fn with_json_logs(mut self, json: bool) -> Self {
        self.logging.json = json;
        self
    }

    /// Parse a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] or [`ConfigError::Parse`]
    pub(crate) fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// File (when given) then process environment
    ///
    /// # Errors
    /// See [`from_file`](Self::from_file) and [`apply_env`](Self::apply_env)
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`
    ///
    /// # Errors
    /// [`ConfigError::InvalidEnv`] for an unknown resolver kind
    pub(crate) fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_RESOLVER) {
            self.resolver.kind = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_RESOLVER,
                value,
            })?;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.remote.model = model;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.remote.base_url = base_url;
        }
        if let Some(key) = lookup(ENV_API_KEY).or_else(|| lookup(ENV_OPENAI_API_KEY)) {
            self.remote.api_key = Some(key);
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.logging.level = level;
        }
        Ok(self)
    }
}
