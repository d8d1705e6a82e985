//! Error types shared by every save/load operation

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the AES/base64 layer.
///
/// All variants describe input that cannot be decrypted (or a key that cannot
/// be used at all). None of them are transient.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext length {0} is not a non-zero multiple of the AES block size")]
    BlockLength(usize),

    #[error("key must be 16, 24 or 32 bytes, got {0}")]
    KeyLength(usize),

    #[error("padding check failed (wrong key or corrupt ciphertext)")]
    Padding,

    #[error("decrypted payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Unified error type for profile persistence.
#[derive(Debug, Error)]
pub enum Error {
    #[error("save file {name} not found; save it first or check the profile name")]
    NotFound { name: String },

    #[error("save file {name} already exists, use a different profile name or overwrite")]
    AlreadyExists { name: String },

    #[error("invalid profile name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("crypto format error: {0}")]
    CryptoFormat(#[from] CryptoError),

    #[error("failed to serialize profile: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("failed to deserialize profile: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed: {0}")]
    Task(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "async")]
impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
