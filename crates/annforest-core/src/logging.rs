//! Tracing subscriber setup for applications embedding the engine.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the host process. This helper covers the common case.

use crate::config::{ConfigError, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global `fmt` subscriber configured from `config`.
///
/// `RUST_LOG` takes precedence over `config.level` when set. Returns `false`
/// if a global subscriber was already installed (the existing one is kept).
///
/// # Errors
///
/// Returns an error if the level or format is not recognized.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::InvalidValue {
            key: "logging.level".to_string(),
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format.as_str() {
        "text" => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok(),
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok(),
        other => {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                message: format!("value '{other}' is invalid, expected one of: text, json"),
            })
        }
    };

    Ok(installed)
}
