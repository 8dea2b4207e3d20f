//! Error types for identity persistence.

use std::path::PathBuf;

/// Failures loading or flushing the link file.
///
/// None of these are fatal: the store always keeps serving its in-memory
/// state, and callers log the error and carry on.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Reading, writing, or renaming the file failed.
    #[error("identity file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but isn't a valid link file.
    #[error("identity file {path} is malformed: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the in-memory table failed.
    #[error("could not encode identity links: {0}")]
    Encode(serde_json::Error),
}
