use std::sync::Arc;
use std::time::Duration;

use serenity::all::{
    Cache, ChannelId, ChannelType, CreateMessage, EditMember, EditMessage, GuildId, Http,
    HttpError, MessageId, Timestamp, UserId,
};
use serenity::async_trait;
use tracing::{debug, warn};

use crate::bot::error::Error;
use crate::components::sanction_prompt;
use crate::constants::embeds;
use crate::constants::moderation::{BAN_DELETE_MESSAGE_DAYS, REVIEW_CHANNEL_FALLBACK_NAME};
use crate::services::moderation::approval::Proposal;

/// Handle to a published review request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewMessage {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Everything the engine needs from the chat platform
#[async_trait]
pub trait ModerationPlatform: Send + Sync {
    /// Configured channel if it resolves to a text channel, else the fallback channel
    async fn resolve_review_destination(&self, guild_id: u64, configured: Option<u64>)
        -> Option<u64>;

    async fn publish_proposal(
        &self,
        destination: u64,
        proposal: &Proposal,
    ) -> Result<ReviewMessage, Error>;

    /// Show the terminal outcome and remove the buttons
    async fn update_proposal(
        &self,
        message: ReviewMessage,
        proposal: &Proposal,
        result: &str,
    ) -> Result<(), Error>;

    async fn apply_timeout(&self, guild_id: u64, user_id: u64, duration: Duration)
        -> Result<(), Error>;

    async fn kick(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), Error>;

    async fn ban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), Error>;

    /// Lift a ban. A user who is not banned is not an error.
    async fn unban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), Error>;

    /// Tell the offender their message was logged
    async fn warn_user(&self, user_id: u64, word: &str, message: &str) -> Result<(), Error>;
}

/// serenity-backed platform
pub struct DiscordPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    fn http(&self) -> &Http {
        &self.http
    }

    /// Look up a text channel of the guild by id or by name
    async fn find_text_channel(
        &self,
        guild_id: GuildId,
        by_id: Option<u64>,
        by_name: &str,
    ) -> Option<ChannelId> {
        // Clone out of the cache so no guard is held across the await
        let cached = self.cache.guild(guild_id).map(|g| g.channels.clone());
        let channels = match cached {
            Some(channels) => channels,
            None => match guild_id.channels(self.http()).await {
                Ok(channels) => channels,
                Err(e) => {
                    warn!("Failed to fetch channels for guild {}: {:?}", guild_id, e);
                    return None;
                }
            },
        };

        if let Some(id) = by_id {
            if let Some(channel) = channels.get(&ChannelId::new(id)) {
                if channel.kind == ChannelType::Text {
                    return Some(channel.id);
                }
            }
            debug!(
                "Configured review channel {} not usable in guild {}, falling back",
                id, guild_id
            );
        }

        channels
            .values()
            .find(|c| c.kind == ChannelType::Text && c.name == by_name)
            .map(|c| c.id)
    }
}

#[async_trait]
impl ModerationPlatform for DiscordPlatform {
    async fn resolve_review_destination(
        &self,
        guild_id: u64,
        configured: Option<u64>,
    ) -> Option<u64> {
        self.find_text_channel(GuildId::new(guild_id), configured, REVIEW_CHANNEL_FALLBACK_NAME)
            .await
            .map(|c| c.get())
    }

    async fn publish_proposal(
        &self,
        destination: u64,
        proposal: &Proposal,
    ) -> Result<ReviewMessage, Error> {
        let message = CreateMessage::new()
            .embed(sanction_prompt::proposal_embed(proposal))
            .components(vec![sanction_prompt::decision_buttons(proposal.id)]);

        let sent = ChannelId::new(destination)
            .send_message(self.http(), message)
            .await?;

        Ok(ReviewMessage {
            channel_id: sent.channel_id.get(),
            message_id: sent.id.get(),
        })
    }

    async fn update_proposal(
        &self,
        message: ReviewMessage,
        proposal: &Proposal,
        result: &str,
    ) -> Result<(), Error> {
        let embed = sanction_prompt::proposal_embed(proposal).field("Result", result, false);

        ChannelId::new(message.channel_id)
            .edit_message(
                self.http(),
                MessageId::new(message.message_id),
                EditMessage::new().embed(embed).components(vec![]),
            )
            .await?;

        Ok(())
    }

    async fn apply_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        duration: Duration,
    ) -> Result<(), Error> {
        let until = chrono::Utc::now()
            + chrono::Duration::from_std(duration).map_err(Error::execution)?;
        let until = Timestamp::from_unix_timestamp(until.timestamp()).map_err(Error::execution)?;

        GuildId::new(guild_id)
            .edit_member(
                self.http(),
                UserId::new(user_id),
                EditMember::new().disable_communication_until_datetime(until),
            )
            .await
            .map_err(Error::execution)?;

        Ok(())
    }

    async fn kick(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), Error> {
        GuildId::new(guild_id)
            .kick_with_reason(self.http(), UserId::new(user_id), reason)
            .await
            .map_err(Error::execution)
    }

    async fn ban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), Error> {
        GuildId::new(guild_id)
            .ban_with_reason(
                self.http(),
                UserId::new(user_id),
                BAN_DELETE_MESSAGE_DAYS,
                reason,
            )
            .await
            .map_err(Error::execution)
    }

    async fn unban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), Error> {
        match self
            .http
            .remove_ban(GuildId::new(guild_id), UserId::new(user_id), Some(reason))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("User {} was not banned in guild {}", user_id, guild_id);
                Ok(())
            }
            Err(e) => Err(Error::execution(e)),
        }
    }

    async fn warn_user(&self, user_id: u64, word: &str, message: &str) -> Result<(), Error> {
        let embed = embeds::warning_embed()
            .title("Warning - Inappropriate Language")
            .description("Your message contained inappropriate language and has been logged.")
            .field("Message", format!("```{}```", message), false)
            .field("Banned Word", format!("||{}||", word), false);

        let dm = UserId::new(user_id).create_dm_channel(self.http()).await?;
        dm.send_message(self.http(), CreateMessage::new().embed(embed))
            .await?;

        Ok(())
    }
}

/// Unknown ban / unknown user responses
fn is_not_found(source: &serenity::Error) -> bool {
    matches!(
        source,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
                || response.error.code == 10026
                || response.error.code == 10013
    )
}
