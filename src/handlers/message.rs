use std::sync::Arc;

use poise::serenity_prelude::{Message, MessageUpdateEvent};
use tracing::{debug, error};

use crate::bot::data::Data;
use crate::services::moderation::{IncomingMessage, MessageVerdict};

/// Scan a newly posted guild message
pub async fn handle_message(data: &Arc<Data>, message: &Message) {
    let Some(incoming) = incoming_from_message(message) else {
        return;
    };
    scan(data, incoming).await;
}

/// Rescan an edited message if its text changed
pub async fn handle_message_update(
    data: &Arc<Data>,
    old: Option<&Message>,
    new: Option<&Message>,
    event: &MessageUpdateEvent,
) {
    let Some(content) = changed_content(old.map(|m| m.content.as_str()), event.content.as_deref())
    else {
        return;
    };

    let incoming = match new {
        Some(message) => incoming_from_message(message),
        None => incoming_from_update(event, content),
    };

    if let Some(incoming) = incoming {
        debug!("Rescanning edited message {}", incoming.message_id);
        scan(data, incoming).await;
    }
}

async fn scan(data: &Arc<Data>, incoming: IncomingMessage) {
    let user_id = incoming.user_id;

    match data.moderation.on_message(incoming).await {
        Ok(MessageVerdict::Infraction {
            proposed: Some(kind),
            ..
        }) => {
            debug!("Proposed {} for user {}", kind, user_id);
        }
        Ok(_) => {}
        Err(e) => {
            error!("Failed to moderate message from user {}: {:?}", user_id, e);
        }
    }
}

/// New text of an edit, if it should be rescanned.
///
/// Only edits of cached messages count. Pins and link previews of older messages
/// arrive as updates carrying the full content, and the original text is unknown.
fn changed_content<'a>(old: Option<&str>, new: Option<&'a str>) -> Option<&'a str> {
    match (old, new) {
        (Some(old), Some(new)) if old != new => Some(new),
        _ => None,
    }
}

/// Bots and webhooks are never moderated
fn is_automated(bot: bool, webhook: bool) -> bool {
    bot || webhook
}

fn incoming_from_message(message: &Message) -> Option<IncomingMessage> {
    let guild_id = message.guild_id?;

    Some(IncomingMessage {
        user_id: message.author.id.get(),
        guild_id: guild_id.get(),
        channel_id: message.channel_id.get(),
        message_id: message.id.get(),
        text: message.content.clone(),
        is_automated: is_automated(message.author.bot, message.webhook_id.is_some()),
    })
}

fn incoming_from_update(event: &MessageUpdateEvent, content: &str) -> Option<IncomingMessage> {
    let guild_id = event.guild_id?;
    let author = event.author.as_ref()?;

    Some(IncomingMessage {
        user_id: author.id.get(),
        guild_id: guild_id.get(),
        channel_id: event.channel_id.get(),
        message_id: event.id.get(),
        text: content.to_string(),
        is_automated: is_automated(author.bot, matches!(event.webhook_id, Some(Some(_)))),
    })
}
