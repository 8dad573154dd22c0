use std::path::PathBuf;
use thiserror::Error;

/// Storage-specific error types for the credential store.
///
/// A [`StorageError::Persistence`] means the mutation was not applied: the
/// in-memory credentials still hold the last state that reached the disk.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The data directory could not be created
    #[error("Failed to create data directory {path}: {source}")]
    DataDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A credential file exists but could not be read
    #[error("Failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A credential file could not be rewritten
    #[error("Failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Returns `true` if the error left the durable state untouched.
    pub fn is_persistence(&self) -> bool {
        matches!(self, StorageError::Persistence { .. })
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
