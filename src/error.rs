//! Error types.
//!
//! Only configuration loading and validation can fail. Simulation ticks
//! degrade gracefully and never return errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for fallible locomotion operations.
pub type Result<T> = std::result::Result<T, LocomotionError>;

/// Errors from configuring the locomotion engine.
#[derive(Debug, Error)]
pub enum LocomotionError {
    /// A tunable is outside its valid range.
    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`LocomotionConfig`](crate::config::LocomotionConfig).
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl LocomotionError {
    /// Create an invalid config error.
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// Create a config I/O error.
    pub fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigIo {
            path: path.into(),
            source,
        }
    }
}
