//! Client configuration
//!
//! Loaded from `DOCSIGN_*` environment variables or a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for talking to the persistence API and storing local state
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the persistence API, e.g. `https://sign.example.com/api`
    pub api_base_url: String,
    /// Bearer credential sent with every call
    pub token: String,
    /// Identifier (email) of the person acting through this client
    #[serde(default)]
    pub actor_email: String,
    #[serde(default)]
    pub actor_name: String,
    /// Directory for the signature vault and placement drafts
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Base path page raster URLs are derived from
    #[serde(default)]
    pub page_image_base: Option<String>,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".docsign")
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Expected variables:
    /// - DOCSIGN_API_URL (required)
    /// - DOCSIGN_TOKEN (required)
    /// - DOCSIGN_ACTOR_EMAIL, DOCSIGN_ACTOR_NAME
    /// - DOCSIGN_STORAGE_DIR (default: ".docsign")
    /// - DOCSIGN_TIMEOUT_SECS (default: 30)
    /// - DOCSIGN_PAGE_IMAGE_BASE
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = non_empty("DOCSIGN_API_URL").ok_or(ConfigError::Missing("DOCSIGN_API_URL"))?;
        let token = non_empty("DOCSIGN_TOKEN").ok_or(ConfigError::Missing("DOCSIGN_TOKEN"))?;

        let request_timeout_secs = match non_empty("DOCSIGN_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "DOCSIGN_TIMEOUT_SECS",
                message: format!("expected whole seconds, got {:?}", raw),
            })?,
            None => default_timeout_secs(),
        };

        let config = Self {
            api_base_url,
            token,
            actor_email: non_empty("DOCSIGN_ACTOR_EMAIL").unwrap_or_default(),
            actor_name: non_empty("DOCSIGN_ACTOR_NAME").unwrap_or_default(),
            storage_dir: non_empty("DOCSIGN_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_storage_dir),
            request_timeout_secs,
            page_image_base: non_empty("DOCSIGN_PAGE_IMAGE_BASE"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Missing("api_base_url"));
        }
        if self.token.trim().is_empty() {
            return Err(ConfigError::Missing("token"));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                key: "api_base_url",
                message: format!("expected an http(s) URL, got {:?}", self.api_base_url),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
