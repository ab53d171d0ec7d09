//! Telegram handler tree
//!
//! The handlers are organized as a testable `schema()` function, the same
//! tree production uses. One dispatcher task runs per inbound update, so a
//! `/stop` is handled while the same user's download is still in flight.

use std::sync::Arc;

use lazy_regex::regex;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InputFile, Message};
use url::Url;

use crate::core::AppResult;
use crate::download::{fetch, FetchOptions, Mode, SessionTracker};
use crate::telegram::bot::Command;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies shared by all handlers
#[derive(Clone, Default)]
pub struct HandlerDeps {
    pub sessions: Arc<SessionTracker>,
}

impl HandlerDeps {
    pub fn new() -> Self {
        Self::default()
    }
}

const WELCOME_TEXT: &str = "👋 Welcome to the YouTube Downloader Bot!\n\n\
    Send a YouTube link, or use:\n\
    🎧 /audio <link> — download audio (mp3)\n\
    🎥 /video <link> — download video (mp4, up to 720p)\n\
    ⏹️ /stop — cancel your active download";

const HELP_TEXT: &str = "📌 Commands:\n\
    /start - show the welcome message\n\
    /audio <link> - download audio\n\
    /video <link> - download video\n\
    /stop - cancel your active download";

/// Creates the main dispatcher schema for the bot.
///
/// The same handler tree is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
}

/// Handler for the Command enum
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => {
                        bot.send_message(msg.chat.id, WELCOME_TEXT).await?;
                    }
                    Command::Help => {
                        bot.send_message(msg.chat.id, HELP_TEXT).await?;
                    }
                    Command::Audio(arg) => {
                        if arg.trim().is_empty() {
                            bot.send_message(msg.chat.id, "Usage: /audio <YouTube URL>").await?;
                        } else {
                            handle_download_request(&bot, &msg, &deps, &arg, Mode::Audio).await?;
                        }
                    }
                    Command::Video(arg) => {
                        if arg.trim().is_empty() {
                            bot.send_message(msg.chat.id, "Usage: /video <YouTube URL>").await?;
                        } else {
                            handle_download_request(&bot, &msg, &deps, &arg, Mode::Video).await?;
                        }
                    }
                    Command::Stop => {
                        handle_stop(&bot, &msg, &deps).await?;
                    }
                }
                Ok(())
            }
        },
    ))
}

/// Handler for free-text messages carrying a YouTube link
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let deps = deps.clone();
        async move {
            let Some(text) = msg.text().map(str::trim) else {
                return Ok(());
            };

            if matches!(text.to_lowercase().as_str(), "hi" | "hello") {
                bot.send_message(msg.chat.id, "👋 Hi! Send a YouTube link to get started.")
                    .await?;
                return Ok(());
            }

            if extract_video_url(text).is_some() {
                handle_download_request(&bot, &msg, &deps, text, mode_for_text(text)).await?;
            } else {
                bot.send_message(msg.chat.id, "❌ Please send a valid YouTube link.")
                    .await?;
            }
            Ok(())
        }
    })
}

/// Full download flow for one request: register, fetch, release, reply.
async fn handle_download_request(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    mode: Mode,
) -> AppResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0;

    let Some(url) = parse_request_url(text) else {
        bot.send_message(msg.chat.id, "❌ Please send a valid YouTube link.")
            .await?;
        return Ok(());
    };

    let Some(cancel) = deps.sessions.register(user_id) else {
        bot.send_message(msg.chat.id, "⚠️ Download already in progress. Use /stop to cancel it first.")
            .await?;
        return Ok(());
    };

    let ack = match mode {
        Mode::Audio => "⏳ Downloading audio...",
        Mode::Video => "⏳ Downloading video...",
    };
    bot.send_message(msg.chat.id, ack).await?;

    let result = fetch(url, cancel, FetchOptions::new(mode)).await;
    // The session ends with the fetch, whatever the outcome.
    deps.sessions.release(user_id);

    match result {
        Ok(fetched) => {
            let send_result = match mode {
                Mode::Audio => bot
                    .send_audio(msg.chat.id, InputFile::file(fetched.path.clone()))
                    .caption(format!("🎧 {}", fetched.title))
                    .await
                    .map(|_| ()),
                Mode::Video => bot
                    .send_video(msg.chat.id, InputFile::file(fetched.path.clone()))
                    .caption(format!("🎥 {}", fetched.title))
                    .await
                    .map(|_| ()),
            };

            match send_result {
                Ok(()) => {
                    if let Err(e) = fs_err::remove_file(&fetched.path) {
                        log::warn!("Failed to delete sent file {}: {}", fetched.path.display(), e);
                    }
                    bot.send_message(msg.chat.id, format!("⏱️ Done in {:.2} seconds.", fetched.elapsed_secs))
                        .await?;
                }
                Err(e) => {
                    log::error!("Failed to send file to chat {}: {}", msg.chat.id, e);
                    bot.send_message(msg.chat.id, "❌ Downloaded, but failed to send the file.")
                        .await?;
                }
            }
        }
        Err(e) if e.is_cancelled() => {
            log::info!("Download cancelled by user {}", user_id);
            bot.send_message(msg.chat.id, "⏹️ Download cancelled.").await?;
        }
        Err(e) => {
            log::error!("Download failed for user {} ({}): {}", user_id, e.subcategory(), e);
            let notice = match mode {
                Mode::Audio => "❌ Failed to download audio.",
                Mode::Video => "❌ Failed to download video.",
            };
            bot.send_message(msg.chat.id, notice).await?;
        }
    }

    Ok(())
}

/// Handle /stop: set the user's cancel flag if a download is active.
async fn handle_stop(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    if deps.sessions.cancel(user.id.0) {
        bot.send_message(msg.chat.id, "⏹️ Stopping your download.").await?;
    } else {
        bot.send_message(msg.chat.id, "ℹ️ No active download to stop.").await?;
    }
    Ok(())
}

/// Find a YouTube URL inside free text.
pub fn extract_video_url(text: &str) -> Option<&str> {
    regex!(r"(https?://)?(www\.)?(youtube\.com|youtu\.?be)/\S+")
        .find(text)
        .map(|m| m.as_str())
}

/// Extract and parse the request URL, defaulting to https for bare links.
fn parse_request_url(text: &str) -> Option<Url> {
    let candidate = extract_video_url(text)?;
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        Url::parse(candidate).ok()
    } else {
        Url::parse(&format!("https://{}", candidate)).ok()
    }
}

/// Free-text routing: mentioning "video" requests video, everything else audio.
fn mode_for_text(text: &str) -> Mode {
    if text.to_lowercase().contains("video") {
        Mode::Video
    } else {
        Mode::Audio
    }
}
