//! Bot instance creation and the command enum

use anyhow::bail;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "download audio: /audio <YouTube URL>")]
    Audio(String),
    #[command(description = "download video: /video <YouTube URL>")]
    Video(String),
    #[command(description = "cancel your active download")]
    Stop,
    #[command(description = "list available commands")]
    Help,
}

/// Creates a Bot instance from the configured token
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - No token configured
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.clone();
    if token.is_empty() {
        bail!("BOT_TOKEN (or TELOXIDE_TOKEN) environment variable not set");
    }
    Ok(Bot::new(token))
}

/// Sets up bot commands in the Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "show the welcome message"),
        BotCommand::new("audio", "download audio: /audio <link>"),
        BotCommand::new("video", "download video: /video <link>"),
        BotCommand::new("stop", "cancel your active download"),
        BotCommand::new("help", "list available commands"),
    ])
    .await?;

    Ok(())
}
