//! Telegram bot client.

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::Update;

use crate::config::Settings;
use crate::core::CommandDispatcher;
use crate::error::Error;

use super::handler;

/// Build the bot and complete the startup handshake.
pub async fn connect(settings: &Settings) -> Result<Bot, Error> {
    tracing::info!("Starting Telegram bot...");

    let bot = build_bot(settings)?;
    let me = bot
        .get_me()
        .await
        .map_err(|e| Error::Telegram(format!("Handshake failed: {}", e)))?;

    tracing::info!("Bot instance created {} (@{})", me.id.0, me.username());
    Ok(bot)
}

fn build_bot(settings: &Settings) -> Result<Bot, Error> {
    let token = settings
        .auth
        .clone()
        .ok_or_else(|| Error::Telegram("No bot token configured".to_string()))?;

    let (Some(key), Some(cert)) = (&settings.key, &settings.cert) else {
        return Ok(Bot::new(token));
    };

    let mut pem = std::fs::read(cert)?;
    pem.extend(std::fs::read(key)?);
    let identity = reqwest::Identity::from_pem(&pem)
        .map_err(|e| Error::Config(format!("Invalid client certificate: {}", e)))?;

    let client = teloxide::net::default_reqwest_settings()
        .identity(identity)
        .build()
        .map_err(|e| Error::Telegram(e.to_string()))?;

    tracing::debug!("Using client identity from {}", cert.display());
    Ok(Bot::with_client(token, client))
}

/// Dispatch updates to the command dispatcher until Ctrl-C.
pub async fn serve(bot: Bot, service: Arc<CommandDispatcher>) {
    let handler = Update::filter_message().endpoint(handler::handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
