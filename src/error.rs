use std::path::PathBuf;

use thiserror::Error;

use crate::format::MediaType;

/// Main error type for an adaptive-bitrate export
#[derive(Error, Debug)]
pub enum ExportError {
    /// `save` was called before any representation was registered
    #[error("No representation has been added to the export")]
    EmptyExport,

    /// The export already issued its encoder invocation
    #[error("Export already committed; no further changes are accepted")]
    AlreadyCommitted,

    /// Invalid streaming parameters or segment template
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The external encoder failed; propagated as-is
    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// A sub-manifest written by the encoder is missing or unparsable
    #[error("Failed to read sub-manifest {path:?}: {reason}")]
    ManifestRead { path: PathBuf, reason: String },

    /// Representations inside one adaptation set disagree on segment duration
    #[error(
        "Inconsistent timeline in {media_type} adaptation set: representation {expected_id} \
         uses {expected} segments, representation {found_id} uses {found}"
    )]
    InconsistentTimeline {
        media_type: MediaType,
        expected_id: usize,
        expected: String,
        found_id: usize,
        found: String,
    },

    /// Reading or writing through the storage collaborator failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The source media could not be inspected
    #[error("Probe error: {0}")]
    Probe(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the encoder invocation collaborator
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Encoder binary not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to spawn encoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Errors raised by the storage collaborator
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0:?}")]
    NotFound(PathBuf),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        ExportError::Configuration(message.into())
    }

    pub(crate) fn manifest_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ExportError::ManifestRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
