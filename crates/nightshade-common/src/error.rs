//! Error types for Project Nightshade.
//!
//! Only programmer errors (bad configuration, unreadable files) are errors.
//! Runtime conditions such as a missing target or a blocked path are handled
//! by the behaviors themselves and never surface here.

use thiserror::Error;

/// Top-level error type for Nightshade operations.
#[derive(Debug, Error)]
pub enum NightshadeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config text is not valid TOML for the expected schema
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A value is outside its allowed range
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// A behavior name is not known
    #[error("Unknown behavior `{0}`")]
    UnknownBehavior(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for Nightshade operations.
pub type NightshadeResult<T> = Result<T, NightshadeError>;
