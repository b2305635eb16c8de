//! `annforest` Configuration Module
//!
//! Provides configuration file support via `annforest.toml`, environment
//! variables, and defaults.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`ANNFOREST_*`, sections split on `__`)
//! 2. Configuration file (`annforest.toml`)
//! 3. Default values

use crate::storage::StorageMode;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Index loading section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// How index bytes are held: `mmap` or `memory`.
    pub storage_mode: StorageMode,
    /// Stop root discovery after this many trees.
    /// `None` = scan until the descendant count changes.
    pub expected_trees: Option<usize>,
}

/// Search section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Multiplier applied to the default candidate budget
    /// (`n_results × n_trees`) when a query passes `search_k = -1`.
    pub search_k_multiplier: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_k_multiplier: 1,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main `annforest` configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnnforestConfig {
    /// Index loading configuration.
    pub index: IndexConfig,
    /// Search configuration.
    pub search: SearchConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl AnnforestConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < `annforest.toml` < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("annforest.toml")
    }

    /// Loads configuration from a specific file path. A missing file is
    /// not an error; defaults and environment variables still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ANNFOREST_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.expected_trees == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "index.expected_trees".to_string(),
                message: "value must be >= 1 when set".to_string(),
            });
        }

        let multiplier = self.search.search_k_multiplier;
        if !(1..=1024).contains(&multiplier) {
            return Err(ConfigError::InvalidValue {
                key: "search.search_k_multiplier".to_string(),
                message: format!("value {multiplier} is out of range [1, 1024]"),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
