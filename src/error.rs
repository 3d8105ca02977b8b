//! Error types for the front-end.

use thiserror::Error;

/// Front-end error type.
#[derive(Error, Debug)]
pub enum FrontEndError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Observation conversion failed: {0}")]
    Conversion(String),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Back-end rejected request: {0}")]
    Backend(String),
}

impl From<toml::de::Error> for FrontEndError {
    fn from(e: toml::de::Error) -> Self {
        FrontEndError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FrontEndError>;
