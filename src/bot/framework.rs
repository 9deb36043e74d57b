use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, GatewayIntents, GuildId};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::commands;
use crate::config::Settings;
use crate::db::store::PgStore;
use crate::handlers::event_handler::event_handler;
use crate::services::audit::AuditLog;
use crate::services::moderation::platform::DiscordPlatform;
use crate::services::moderation::Moderation;

/// Messages kept per channel so edits can be compared with the original
const CACHED_MESSAGES_PER_CHANNEL: usize = 200;

pub async fn run(settings: Settings, pool: PgPool) -> Result<(), Error> {
    let framework_settings = settings.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::infractions::infractions(),
                commands::infractions::clear_infractions(),
                commands::banned_words::banned_words(),
                commands::moderation::moderation(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: None, // Disable prefix commands - only use slash commands
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error: {:?}", error);
                            let _ = ctx.say(format!("Error: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
                            let _ = ctx.say(format!("Invalid argument: {}", error)).await;
                        }
                        poise::FrameworkError::MissingUserPermissions { ctx, .. } => {
                            let _ = ctx
                                .say("You don't have permission to use this command")
                                .await;
                        }
                        poise::FrameworkError::UnknownCommand { .. } => {
                            // Slash commands only; pings and prefixes are ignored
                        }
                        err => {
                            error!("Framework error: {:?}", err);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as {}", ready.user.name);

                let settings = framework_settings;
                let store = Arc::new(PgStore::new(
                    pool.clone(),
                    settings.default_timeout_minutes,
                    settings.default_ban_days,
                ));
                let platform = Arc::new(DiscordPlatform::new(ctx.http.clone(), ctx.cache.clone()));
                let audit = Arc::new(AuditLog::new(settings.audit_log_path.clone()));

                let moderation = Arc::new(Moderation::new(
                    store.clone(),
                    store.clone(),
                    store.clone(),
                    store,
                    platform,
                    audit,
                    settings.approval_timeout,
                ));

                // Bans that expired while offline are lifted right away
                match moderation.restore_reversals().await {
                    Ok(handles) => info!("Restored {} scheduled unban(s)", handles.len()),
                    Err(e) => warn!("Failed to restore scheduled unbans: {:?}", e),
                }

                // Proposals left open by the previous run
                match moderation.restore_proposals().await {
                    Ok(handles) => info!("Restored {} open proposal(s)", handles.len()),
                    Err(e) => warn!("Failed to restore open proposals: {:?}", e),
                }

                register_commands(ctx, framework, settings.guild_id).await?;

                Ok(Arc::new(Data::new(pool, settings, moderation)))
            })
        })
        .build();

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut cache_settings = ::serenity::cache::Settings::default();
    cache_settings.max_messages = CACHED_MESSAGES_PER_CHANNEL;

    let mut client = serenity::ClientBuilder::new(&settings.discord_token, intents)
        .cache_settings(cache_settings)
        .framework(framework)
        .await
        .map_err(Error::Serenity)?;

    info!("Starting Discord client...");
    client.start().await.map_err(Error::Serenity)
}

/// Register commands in one guild (GUILD_ID) or globally
async fn register_commands(
    ctx: &serenity::Context,
    framework: &poise::Framework<Arc<Data>, Error>,
    guild_id: Option<u64>,
) -> Result<(), Error> {
    let commands = &framework.options().commands;

    match guild_id {
        Some(guild_id) => {
            let guild_id = GuildId::new(guild_id);
            info!("Registering {} commands in guild {}", commands.len(), guild_id);

            // Remove global commands so they don't show up twice
            match ctx.http.get_global_commands().await {
                Ok(global_commands) => {
                    for cmd in &global_commands {
                        if let Err(e) = ctx.http.delete_global_command(cmd.id).await {
                            warn!("Failed to delete global command {}: {:?}", cmd.name, e);
                        }
                    }
                }
                Err(e) => {
                    warn!("Could not check for global commands: {:?}", e);
                }
            }

            poise::builtins::register_in_guild(ctx, commands, guild_id)
                .await
                .map_err(|e| {
                    error!("Failed to register guild commands: {:?}", e);
                    Error::Serenity(e)
                })?;
        }
        None => {
            info!("Registering {} commands globally", commands.len());

            poise::builtins::register_globally(ctx, commands)
                .await
                .map_err(|e| {
                    error!("Failed to register commands globally: {:?}", e);
                    Error::Serenity(e)
                })?;
        }
    }

    info!("Commands registered");
    Ok(())
}
