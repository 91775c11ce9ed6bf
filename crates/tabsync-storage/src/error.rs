//! Storage and codec error types.

use std::fmt;

use crate::area::StorageArea;

/// Errors raised by a [`StorageBackend`](crate::StorageBackend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend cannot be used in this execution context.
    Unavailable(StorageArea),
    /// Writing would exceed the store's byte quota.
    QuotaExceeded {
        key: String,
        requested: usize,
        quota: usize,
    },
    /// Filesystem failure while reading or writing a snapshot.
    Io(String),
    /// A snapshot file did not contain a valid store image.
    Corrupt(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(area) => write!(f, "{area} storage is unavailable"),
            Self::QuotaExceeded {
                key,
                requested,
                quota,
            } => write!(
                f,
                "quota exceeded writing '{key}': {requested} bytes requested, quota is {quota}"
            ),
            Self::Io(msg) => write!(f, "storage i/o error: {msg}"),
            Self::Corrupt(msg) => write!(f, "corrupt storage snapshot: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors raised by a [`Codec`](crate::Codec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value could not be turned into text.
    Serialize(String),
    /// The stored text could not be turned back into a value.
    Parse(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(msg) => write!(f, "serialize failed: {msg}"),
            Self::Parse(msg) => write!(f, "parse failed: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}
