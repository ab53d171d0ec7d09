use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Final download folder path
/// Read from DOWNLOAD_DIR environment variable, defaults to ~/downloads
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_DIR: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "~/downloads".to_string()));

/// Parent directory for per-fetch scratch directories
/// Read from TEMP_FILES_DIR environment variable, defaults to the system temp dir
pub static TEMP_FILES_DIR: Lazy<String> = Lazy::new(|| {
    env::var("TEMP_FILES_DIR").unwrap_or_else(|_| env::temp_dir().to_string_lossy().into_owned())
});

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Path to a Netscape-format cookies file passed to yt-dlp when it exists on disk
/// Read from YTDL_COOKIES_FILE environment variable, defaults to cookies.txt
/// in the working directory
pub static YTDL_COOKIES_FILE: Lazy<String> =
    Lazy::new(|| env::var("YTDL_COOKIES_FILE").unwrap_or_else(|_| "cookies.txt".to_string()));

/// Optional proxy URL forwarded to yt-dlp via --proxy
pub static YTDL_PROXY: Lazy<Option<String>> = Lazy::new(|| env::var("YTDL_PROXY").ok());

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: bot.log
pub static LOG_FILE_PATH: Lazy<String> = Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "bot.log".to_string()));

/// Download configuration
pub mod download {
    /// Rate ceiling handed to yt-dlp via --limit-rate.
    /// Matches the extractor's bytes-per-second notation (1 MB/s).
    pub const LIMIT_RATE: &str = "1M";

    /// Height cap for video downloads, baked into the format selector.
    pub const MAX_VIDEO_HEIGHT: u32 = 720;

    /// Preferred audio quality passed to the mp3 extraction postprocessor.
    pub const AUDIO_QUALITY: &str = "192K";
}

/// Tilde-expanded final download directory.
pub fn download_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde(&*DOWNLOAD_DIR).into_owned())
}

/// Parent directory under which per-fetch scratch directories are created.
pub fn scratch_parent() -> PathBuf {
    PathBuf::from(shellexpand::tilde(&*TEMP_FILES_DIR).into_owned())
}
