use std::path::PathBuf;
use thiserror::Error;

/// Failures at the persistence boundary. Parsing and merging never produce these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize '{}': {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write '{}': {message}", path.display())]
    Write { path: PathBuf, message: String },
}
