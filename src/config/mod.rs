//! Configuration management for tagmill
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `TAGMILL__<section>__<key>`
//!
//! Examples:
//! - `TAGMILL__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `TAGMILL__LIMITS__RATE_LIMIT=120`
//! - `TAGMILL__SERVER__MAX_UPLOAD_BYTES=20MB`
//!
//! The model API key is only ever read from the environment
//! (`TAGMILL_API_KEY` or `OPENAI_API_KEY`), never from the TOML file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/tagmill.toml`.
//! This can be overridden using the `TAGMILL_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    CacheConfig, Config, ImageConfig, LimitsConfig, ModelConfig, ProfilesConfig, ServerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or
    /// validation fails (zero workers, out-of-range JPEG quality, etc.)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let mut config = sources::load_from_sources(path)?;
        sources::load_secrets(&mut config);
        validation::validate(&config)?;
        Ok(config)
    }
}
