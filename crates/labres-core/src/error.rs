//! Error types for `labres` core library.

use thiserror::Error;

/// Result type alias using `labres` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `labres` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
