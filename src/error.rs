//! Error types for the downloader.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use thiserror::Error;

/// Error type for indexing and chapter page scraping.
#[derive(Error, Debug)]
pub enum ScraperError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// URL parsing or validation failed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The chapter index never populated within the wait bound
    #[error("Timed out after {0}s waiting for the chapter index")]
    IndexingTimeout(u64),
}

/// Error type for the user's selection expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    /// Expression is not one of `N`, `N:M` or `N::`
    #[error("Unrecognized selection '{0}' (expected N, N:M or N::)")]
    InvalidFormat(String),

    /// A token could not be parsed as a number
    #[error("'{0}' is not a valid chapter number")]
    InvalidNumber(String),
}

/// Error type for turning page images into a persisted document.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// PDF encoding failed
    #[error("Failed to encode document: {0}")]
    Encode(String),

    /// Writing the artifact failed
    #[error("Failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for AssemblyError {
    fn from(err: lopdf::Error) -> Self {
        AssemblyError::Encode(err.to_string())
    }
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
