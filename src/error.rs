//! Error types for Spark.
//!
//! Library code returns [`SparkError`]; the binary wraps it in `anyhow`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SparkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SparkError>;
