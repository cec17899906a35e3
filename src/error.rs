//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a screenshot
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem failure (output directory, temporary files, persisting the PNG)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize the UI tree to a standalone document
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Failed to launch or configure the rendering engine
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load the document
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Failed to produce the image
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The rasterization worker thread panicked
    #[error("Rasterization worker panicked: {0}")]
    WorkerPanicked(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A value handed to a widget or operation is out of its domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
