use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, FullEvent};
use tracing::{debug, error, info};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::handlers::{interaction, message};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Arc<Data>, Error>,
    data: &Arc<Data>,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot, .. } => {
            info!("Bot ready as {}", data_about_bot.user.name);
        }

        FullEvent::Message { new_message } => {
            message::handle_message(data, new_message).await;
        }

        FullEvent::MessageUpdate {
            old_if_available,
            new,
            event,
        } => {
            message::handle_message_update(data, old_if_available.as_ref(), new.as_ref(), event)
                .await;
        }

        FullEvent::InteractionCreate { interaction } => {
            // Slash commands are dispatched by poise
            if let serenity::Interaction::Component(_) = interaction {
                if let Err(e) = interaction::handle_interaction(ctx, data, interaction).await {
                    error!("Component interaction handler error: {:?}", e);
                }
            }
        }

        FullEvent::GuildDelete { incomplete, .. } => {
            debug!("Guild {} removed", incomplete.id);
        }

        _ => {}
    }

    Ok(())
}
