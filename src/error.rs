//! Error handling and custom error types
//!
//! Provides unified error handling across the service using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unable to decode image: {0}")]
    Decode(String),

    #[error("Unable to determine image dimensions: {0}")]
    SizeUnknown(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Upload to {bucket}/{key} failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable identifier for logs and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::InvalidDimensions { .. } => "invalid_dimensions",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Decode(_) => "decode",
            Error::SizeUnknown(_) => "size_unknown",
            Error::Encode(_) => "encode",
            Error::Upload { .. } => "upload",
            Error::Cancelled => "cancelled",
            Error::Internal(_) => "internal",
        }
    }

    /// True for failures caused by the uploaded bytes rather than by this
    /// service or its storage.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::SizeUnknown(_) | Error::InvalidDimensions { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
