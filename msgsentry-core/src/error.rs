//! Error types for msgsentry-core

use thiserror::Error;

/// Main error type for the msgsentry-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Classification backend error
    #[error("backend error: {0}")]
    Backend(String),

    /// Overlay collaborator error
    #[error("overlay error: {0}")]
    Overlay(String),

    /// Image decoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for msgsentry-core
pub type Result<T> = std::result::Result<T, Error>;
