//! The fetch operation: one yt-dlp invocation per request
//!
//! Each fetch downloads into a fresh scratch directory, watches the
//! extractor's line-buffered progress output for cancellation, then moves
//! the produced file into the final download directory under a sanitized
//! name. The scratch directory is removed on every exit path via its RAII
//! guard.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use rand::seq::SliceRandom;
use serde::Deserialize;
use url::Url;

use crate::core::config;
use crate::download::error::DownloadError;
use crate::download::filename::sanitize_filename;
use crate::download::session::CancelFlag;

/// User agents rotated per request, mirroring common desktop browsers.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/115.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:116.0) Firefox/116.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) Chrome/115.0.0.0 Safari/537.36",
];

/// How many trailing extractor stderr lines to keep for error reporting.
const STDERR_TAIL_LINES: usize = 200;

/// What kind of output the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Audio,
    Video,
}

impl Mode {
    /// Extension of the final output file.
    pub fn ext(&self) -> &'static str {
        match self {
            Mode::Audio => "mp3",
            Mode::Video => "mp4",
        }
    }

    /// Extensions accepted in the scratch directory when no file with the
    /// preferred extension exists. The audio postprocessor can be skipped by
    /// yt-dlp when the source is already usable, so raw container formats
    /// are accepted too.
    pub fn fallback_exts(&self) -> &'static [&'static str] {
        match self {
            Mode::Audio => &["mp4", "webm", "m4a", "opus"],
            Mode::Video => &["webm", "mkv"],
        }
    }

    /// Title used when the extractor reports none.
    pub fn default_title(&self) -> &'static str {
        match self {
            Mode::Audio => "audio",
            Mode::Video => "video",
        }
    }
}

/// Options for a single fetch, defaulting from the process configuration.
///
/// # Example
///
/// ```ignore
/// let options = FetchOptions::new(Mode::Audio)
///     .output_dir("/srv/downloads")
///     .proxy("socks5://127.0.0.1:9050");
/// ```
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub mode: Mode,
    pub ytdl_bin: String,
    pub output_dir: PathBuf,
    pub scratch_parent: PathBuf,
    pub cookies_file: PathBuf,
    pub proxy: Option<String>,
    pub limit_rate: String,
}

impl FetchOptions {
    /// Options for `mode` with everything else taken from the environment
    /// configuration.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ytdl_bin: config::YTDL_BIN.clone(),
            output_dir: config::download_dir(),
            scratch_parent: config::scratch_parent(),
            cookies_file: PathBuf::from(config::YTDL_COOKIES_FILE.clone()),
            proxy: config::YTDL_PROXY.clone(),
            limit_rate: config::download::LIMIT_RATE.to_string(),
        }
    }

    /// Override the extractor binary.
    pub fn ytdl_bin(mut self, bin: impl Into<String>) -> Self {
        self.ytdl_bin = bin.into();
        self
    }

    /// Override the final output directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Override the parent directory for scratch directories.
    pub fn scratch_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_parent = dir.into();
        self
    }

    /// Override the cookies file path.
    pub fn cookies_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_file = path.into();
        self
    }

    /// Route the extractor through a proxy.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Final file path inside the configured download directory.
    pub path: PathBuf,
    /// Title as reported by the extractor, before sanitization.
    pub title: String,
    /// Wall-clock seconds spent in the extractor.
    pub elapsed_secs: f64,
}

/// Subset of the yt-dlp `--print-json` info dict we care about.
#[derive(Debug, Deserialize)]
struct ExtractorMetadata {
    title: Option<String>,
}

/// Download `url` in the requested mode, honoring `cancel`.
///
/// Runs the blocking extractor on the blocking pool. The cancel flag is
/// polled once per extractor output line (`--newline` keeps those coming
/// during data transfer); when observed set, the child is killed and
/// [`DownloadError::Cancelled`] is returned. An extractor that emits no
/// output cannot be interrupted until it does - cancellation is cooperative,
/// not preemptive.
pub async fn fetch(url: Url, cancel: CancelFlag, options: FetchOptions) -> Result<FetchResult, DownloadError> {
    tokio::task::spawn_blocking(move || run_fetch(&url, &cancel, &options))
        .await
        .map_err(|e| DownloadError::Extraction(format!("fetch task failed: {}", e)))?
}

fn run_fetch(url: &Url, cancel: &CancelFlag, options: &FetchOptions) -> Result<FetchResult, DownloadError> {
    fs_err::create_dir_all(&options.output_dir)?;
    fs_err::create_dir_all(&options.scratch_parent)?;

    // Fresh scratch directory per fetch so concurrent downloads never see
    // each other's files. The guard removes it on every exit path.
    let scratch = tempfile::Builder::new()
        .prefix("tubefetch-")
        .tempdir_in(&options.scratch_parent)?;

    let user_agent = USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);
    let args = build_args(options, scratch.path(), url, user_agent);

    log::debug!("yt-dlp command: {} {}", options.ytdl_bin, args.join(" "));

    let started = Instant::now();
    let mut child = Command::new(&options.ytdl_bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DownloadError::Spawn {
            bin: options.ytdl_bin.clone(),
            source,
        })?;

    // Drain stderr on its own thread so a chatty extractor cannot block on a
    // full pipe; keep a tail for error reporting.
    let stderr_tail = Arc::new(Mutex::new(VecDeque::<String>::new()));
    let stderr_thread = child.stderr.take().map(|stream| {
        let tail = Arc::clone(&stderr_tail);
        thread::spawn(move || {
            let reader = BufReader::new(stream);
            for line in reader.lines().map_while(Result::ok) {
                log::debug!("yt-dlp stderr: {}", line);
                if let Ok(mut lines) = tail.lock() {
                    lines.push_back(line);
                    if lines.len() > STDERR_TAIL_LINES {
                        lines.pop_front();
                    }
                }
            }
        })
    });

    // Every stdout line is a progress-callback point: poll the cancel flag,
    // and capture the single info-dict JSON line emitted by --print-json.
    let mut metadata_line: Option<String> = None;
    if let Some(stream) = child.stdout.take() {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(Result::ok) {
            if cancel.is_cancelled() {
                log::info!("Cancel flag observed, killing extractor for {}", url);
                let _ = child.kill();
                let _ = child.wait();
                if let Some(handle) = stderr_thread {
                    let _ = handle.join();
                }
                return Err(DownloadError::Cancelled);
            }
            if line.starts_with('{') {
                metadata_line = Some(line);
            } else {
                log::debug!("yt-dlp: {}", line);
            }
        }
    }

    let status = child
        .wait()
        .map_err(|e| DownloadError::Extraction(format!("extractor process failed: {}", e)))?;
    if let Some(handle) = stderr_thread {
        let _ = handle.join();
    }
    let elapsed_secs = started.elapsed().as_secs_f64();

    if !status.success() {
        // A kill or an extractor error after a stop request still reports
        // cancellation, not a generic failure.
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let tail = stderr_tail
            .lock()
            .map(|mut lines| lines.make_contiguous().join("\n"))
            .unwrap_or_default();
        return Err(DownloadError::Extraction(format!(
            "extractor exited with {}: {}",
            status,
            tail.chars().take(500).collect::<String>()
        )));
    }

    let metadata: ExtractorMetadata = match metadata_line {
        Some(line) => serde_json::from_str(&line)
            .map_err(|e| DownloadError::Extraction(format!("unparseable extractor metadata: {}", e)))?,
        None => return Err(DownloadError::Extraction("extractor produced no metadata".to_string())),
    };
    let title = metadata
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| options.mode.default_title().to_string());

    let produced = find_output_file(scratch.path(), options.mode)?;
    let stem = sanitize_filename(Some(&title));
    let final_path = options.output_dir.join(format!("{}.{}", stem, options.mode.ext()));
    move_file(&produced, &final_path)?;

    log::info!(
        "Downloaded \"{}\" to {} in {:.2}s",
        title,
        final_path.display(),
        elapsed_secs
    );

    // Scratch cleanup on the happy path; error paths rely on the guard.
    if let Err(e) = scratch.close() {
        log::warn!("Failed to remove scratch directory: {}", e);
    }

    Ok(FetchResult {
        path: final_path,
        title,
        elapsed_secs,
    })
}

/// Assemble the yt-dlp argument list for one fetch.
fn build_args(options: &FetchOptions, scratch: &Path, url: &Url, user_agent: &str) -> Vec<String> {
    let output_template = scratch.join("%(title)s.%(ext)s").to_string_lossy().into_owned();

    let mut args: Vec<String> = vec![
        "-o".into(),
        output_template,
        "--newline".into(),
        "--no-playlist".into(),
        // Resume and .part artifacts are disabled: every fetch starts clean
        // in its own scratch directory.
        "--no-continue".into(),
        "--no-part".into(),
        "--no-overwrites".into(),
        "--no-check-certificate".into(),
        "--force-ipv4".into(),
        "--limit-rate".into(),
        options.limit_rate.clone(),
        "--user-agent".into(),
        user_agent.into(),
        "--print-json".into(),
    ];

    match options.mode {
        Mode::Audio => {
            args.extend([
                "-f".into(),
                "bestaudio/best".into(),
                "--extract-audio".into(),
                "--audio-format".into(),
                "mp3".into(),
                "--audio-quality".into(),
                config::download::AUDIO_QUALITY.into(),
            ]);
        }
        Mode::Video => {
            args.extend([
                "-f".into(),
                format!("best[height<={}]", config::download::MAX_VIDEO_HEIGHT),
            ]);
        }
    }

    if options.cookies_file.exists() {
        args.push("--cookies".into());
        args.push(options.cookies_file.to_string_lossy().into_owned());
    }
    if let Some(proxy) = &options.proxy {
        args.push("--proxy".into());
        args.push(proxy.clone());
    }

    args.push(url.to_string());
    args
}

/// Locate the file the extractor produced, preferring the mode extension.
fn find_output_file(scratch: &Path, mode: Mode) -> Result<PathBuf, DownloadError> {
    let entries: Vec<PathBuf> = fs_err::read_dir(scratch)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();

    let with_ext = |ext: &str| {
        entries
            .iter()
            .find(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)))
            .cloned()
    };

    if let Some(path) = with_ext(mode.ext()) {
        return Ok(path);
    }
    for ext in mode.fallback_exts() {
        if let Some(path) = with_ext(ext) {
            return Ok(path);
        }
    }

    Err(DownloadError::FileNotFound(format!(
        "no {} output in scratch directory ({} entries)",
        mode.ext(),
        entries.len()
    )))
}

/// Move `src` to `dest`, falling back to copy+remove for cross-device moves.
fn move_file(src: &Path, dest: &Path) -> Result<(), DownloadError> {
    if fs_err::rename(src, dest).is_err() {
        fs_err::copy(src, dest).map_err(|e| DownloadError::MoveFailed(e.to_string()))?;
        let _ = fs_err::remove_file(src);
    }
    if !dest.exists() {
        return Err(DownloadError::MoveFailed(format!(
            "no file at {} after move",
            dest.display()
        )));
    }
    Ok(())
}
