//! Error types for Bindery
//!
//! Validation errors raised while parsing domain values and configuration.

use thiserror::Error;

/// Common result type for Bindery domain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Bindery
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported image type: {0}")]
    UnknownImageType(String),

    #[error("unsupported archive type: {0}")]
    UnknownArchiveType(String),

    #[error("unknown user role: {0}")]
    UnknownRole(String),

    #[error("unknown download status: {0}")]
    UnknownDownloadStatus(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this error came from parsing a domain value
    #[must_use]
    pub const fn is_invalid_value(&self) -> bool {
        matches!(
            self,
            Self::UnknownImageType(_)
                | Self::UnknownArchiveType(_)
                | Self::UnknownRole(_)
                | Self::UnknownDownloadStatus(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Configuration(e.to_string())
    }
}
