use thiserror::Error;

/// Structured error type for download operations.
///
/// Cancellation is its own variant so callers can report a user-initiated
/// stop differently from genuine failures.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The user's cancel flag was observed set during a progress callback
    #[error("download cancelled by user")]
    Cancelled,

    /// yt-dlp returned no usable metadata or exited with an error
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Extraction reported success but no file of the expected type exists in scratch
    #[error("no downloaded file found: {0}")]
    FileNotFound(String),

    /// Relocation to the final directory did not leave a file at the expected path
    #[error("failed to move downloaded file: {0}")]
    MoveFailed(String),

    /// The extractor binary could not be started at all
    #[error("failed to run {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem errors around the scratch and output directories
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether this error is a user-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }

    /// Returns subcategory for logging
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::Cancelled => "cancelled",
            DownloadError::Extraction(_) => "extraction",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::MoveFailed(_) => "move_failed",
            DownloadError::Spawn { .. } => "spawn",
            DownloadError::Io(_) => "io",
        }
    }
}
