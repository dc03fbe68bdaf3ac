//! Telegram message handling.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::core::{CommandDispatcher, ReplySink};

/// Replies into one Telegram chat.
#[derive(Clone)]
pub struct ChatSink {
    bot: Bot,
    chat_id: ChatId,
}

impl ChatSink {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ReplySink for ChatSink {
    async fn send(&self, text: String) {
        if let Err(e) = self.bot.send_message(self.chat_id, text).await {
            tracing::debug!("Failed to send reply to chat {}: {}", self.chat_id.0, e);
        }
    }
}

/// Handle incoming messages.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    service: Arc<CommandDispatcher>,
) -> Result<(), teloxide::RequestError> {
    let chat = msg.chat.id.0;

    if let Some(members) = msg.new_chat_members() {
        let names: Vec<String> = members.iter().map(|u| u.full_name()).collect();
        tracing::info!("New members {} joined conversation {}", names.join(", "), chat);
        return Ok(());
    }

    if let Some(member) = msg.left_chat_member() {
        tracing::info!("Members {} have left conversation {}", member.full_name(), chat);
        return Ok(());
    }

    if let Some(title) = msg.new_chat_title() {
        tracing::info!("Conversation {} renamed to {}", chat, title);
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    let sender = msg
        .from
        .as_ref()
        .map(|u| u.full_name())
        .unwrap_or_else(|| "Unknown".to_string());
    tracing::debug!("Message from {} in {}", sender, chat);

    // Collaborator calls may take a while; the reply is sent on completion.
    let text = text.to_string();
    let sink: Arc<dyn ReplySink> = Arc::new(ChatSink::new(bot, msg.chat.id));
    tokio::spawn(async move {
        service.handle_message(&text, sink).await;
    });

    Ok(())
}
