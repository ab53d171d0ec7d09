//! Download session tracking and the yt-dlp fetch pipeline

pub mod error;
pub mod fetch;
pub mod filename;
pub mod session;

// Re-exports for convenience
pub use error::DownloadError;
pub use fetch::{fetch, FetchOptions, FetchResult, Mode};
pub use filename::sanitize_filename;
pub use session::{CancelFlag, SessionTracker};
