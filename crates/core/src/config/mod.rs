//! Configuration loading, validation, and types.

mod loader;
mod types;
mod validate;

use thiserror::Error;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    CacheConfig, Config, FetchConfig, PipelineConfig, SanitizedConfig, SanitizedPipelineConfig,
    ServerConfig,
};
pub use validate::validate_config;

/// Errors that can occur during configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    ValidationError(String),
}
