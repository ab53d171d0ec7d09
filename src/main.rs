use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;

use tubefetch::core::{config, init_logger};
use tubefetch::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (logging, token, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    // Final output directory must exist before the first download
    let download_dir = config::download_dir();
    std::fs::create_dir_all(&download_dir)?;
    log::info!("Download directory: {}", download_dir.display());

    let cookies = std::path::Path::new(config::YTDL_COOKIES_FILE.as_str());
    if cookies.exists() {
        log::info!("Cookies file found: {}", cookies.display());
    } else {
        log::info!("No cookies file at {}, downloading without cookies", cookies.display());
    }

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let deps = HandlerDeps::new();

    log::info!("✅ Bot is running...");
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
