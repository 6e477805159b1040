//! Error types for the file-backed queue store.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::dao::{models::PersonId, storage::StorageError};

/// Convenient result alias returning [`FileStoreError`] failures.
pub type FileStoreResult<T> = Result<T, FileStoreError>;

/// Failures that can occur while reading or writing queue files.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The queue directory could not be created.
    #[error("failed to create queue directory `{path}`")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Reading a judge record failed for a reason other than absence.
    #[error("failed to read queue file `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing the temporary file failed (disk full, permissions).
    #[error("failed to write queue file `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Moving the temporary file over the record failed.
    #[error("failed to replace queue file `{path}`")]
    Rename {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file exists but does not hold a readable record.
    #[error("failed to decode queue file `{path}`")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The record could not be serialized.
    #[error("failed to encode queue record for judge {judge}")]
    Encode {
        judge: PersonId,
        #[source]
        source: serde_json::Error,
    },
}

impl From<FileStoreError> for StorageError {
    fn from(err: FileStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
