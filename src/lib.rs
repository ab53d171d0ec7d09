//! Tubefetch - Telegram bot for downloading audio and video from YouTube
//!
//! This library provides the core functionality for the bot:
//! per-user cancellable download sessions, the yt-dlp fetch pipeline,
//! and the Telegram integration.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors and logging
//! - `download`: Session tracking and the yt-dlp fetch operation
//! - `telegram`: Bot commands, message routing and replies

pub mod core;
pub mod download;
pub mod telegram;

// Re-export commonly used types for convenience
pub use self::core::{config, AppError, AppResult};
pub use download::{
    fetch, sanitize_filename, CancelFlag, DownloadError, FetchOptions, FetchResult, Mode, SessionTracker,
};
pub use telegram::{create_bot, schema, Command, HandlerDeps};
