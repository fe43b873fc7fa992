//! Error types for GazeSync
//!
//! None of these terminate a monitoring session: transport failures recover
//! via backoff, malformed messages and unknown references are dropped with a
//! warning, and everything else degrades to visibly stale data.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("unknown reference: section '{section}' on page '{page}'")]
    UnknownReference { page: String, section: String },

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::TransportFailure(reason.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage(reason.into())
    }

    pub fn unknown_reference(page: impl Into<String>, section: impl Into<String>) -> Self {
        Self::UnknownReference {
            page: page.into(),
            section: section.into(),
        }
    }
}
