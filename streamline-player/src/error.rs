//! Error types for streamline-player
//!
//! Defines crate-specific error types using thiserror for clear error propagation.
//! Segment sink capacity errors stay inside the segment buffer and never appear here.

use thiserror::Error;

/// Main error type for streamline-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from streamline-common
    #[error("Common error: {0}")]
    Common(#[from] streamline_common::Error),

    /// Malformed asset or endpoint URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client errors (probe, segment fetch)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream URL rejected by the URL-safety gate
    #[error("Unsafe upstream URL {url}: {reason}")]
    UnsafeUrl { url: String, reason: String },

    /// Operation not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using streamline-player Error
pub type Result<T> = std::result::Result<T, Error>;
