use std::sync::Arc;

use serenity::all::{
    ButtonStyle, ComponentInteraction, Context, CreateActionRow, CreateButton, CreateEmbed,
    CreateInteractionResponse, UserId,
};
use tracing::debug;
use uuid::Uuid;

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::db::models::SanctionKind;
use crate::handlers::interaction::send_component_error;
use crate::services::moderation::approval::{Decision, Proposal, ProposalOutcome};
use crate::utils::formatting::mention_user;
use crate::utils::permissions;

const ACCEPT_PREFIX: &str = "sanction_accept_";
const REJECT_PREFIX: &str = "sanction_reject_";

/// Review embed for a proposal
pub fn proposal_embed(proposal: &Proposal) -> CreateEmbed {
    let embed = match proposal.outcome {
        ProposalOutcome::Pending => embeds::severity_embed(proposal.kind),
        ProposalOutcome::Accepted => embeds::success_embed(),
        ProposalOutcome::Rejected | ProposalOutcome::Expired => embeds::info_embed(),
    };

    let action = match proposal.kind {
        SanctionKind::Timeout => "Timeout",
        SanctionKind::Kick => "Kick",
        SanctionKind::Ban => "Ban",
    };

    let mut embed = embed
        .title(format!("Sanction Proposal: {}", action))
        .description(format!(
            "{} has reached the threshold for a **{}**.",
            mention_user(UserId::new(proposal.target_user_id)),
            proposal.kind
        ))
        .field("Reason", &proposal.reason_summary, false)
        .field("Status", proposal.outcome.as_str(), true)
        .timestamp(serenity::all::Timestamp::from(proposal.created_at));

    if let Some(reviewer) = proposal.resolved_by {
        embed = embed.field("Reviewed by", mention_user(UserId::new(reviewer)), true);
    }

    embed
}

/// Accept / reject buttons for a proposal
pub fn decision_buttons(proposal_id: Uuid) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(format!("{}{}", ACCEPT_PREFIX, proposal_id))
            .label("Accept")
            .style(ButtonStyle::Danger),
        CreateButton::new(format!("{}{}", REJECT_PREFIX, proposal_id))
            .label("Reject")
            .style(ButtonStyle::Secondary),
    ])
}

/// Button id to (accept?, proposal id)
pub fn parse_custom_id(custom_id: &str) -> Option<(bool, Uuid)> {
    let (accept, id) = if let Some(id) = custom_id.strip_prefix(ACCEPT_PREFIX) {
        (true, id)
    } else if let Some(id) = custom_id.strip_prefix(REJECT_PREFIX) {
        (false, id)
    } else {
        return None;
    };

    Uuid::parse_str(id).ok().map(|id| (accept, id))
}

/// Handle a reviewer clicking accept or reject
pub async fn handle_response(
    ctx: &Context,
    data: &Arc<Data>,
    component: &ComponentInteraction,
) -> Result<(), Error> {
    let Some((accept, proposal_id)) = parse_custom_id(&component.data.custom_id) else {
        send_component_error(ctx, component, "Invalid button state").await?;
        return Ok(());
    };

    let Some(guild_id) = component.guild_id else {
        send_component_error(ctx, component, "This only works in a server").await?;
        return Ok(());
    };

    let reviewer = component.user.id;
    let allowed = match component.member.as_ref().and_then(|m| m.permissions) {
        Some(perms) => permissions::is_moderator(perms),
        None => permissions::can_moderate(ctx, guild_id, reviewer).await,
    };
    if !allowed {
        send_component_error(
            ctx,
            component,
            "Only moderators with kick or ban permission can review sanctions",
        )
        .await?;
        return Ok(());
    }

    let reviewer_id = reviewer.get();
    let decision = if accept {
        Decision::Accept { reviewer_id }
    } else {
        Decision::Reject { reviewer_id }
    };

    debug!(
        "Sanction review: proposal={}, reviewer={}, accept={}",
        proposal_id, reviewer_id, accept
    );

    if !data.moderation.resolve(proposal_id, decision) {
        send_component_error(ctx, component, "This proposal is no longer active").await?;
        return Ok(());
    }

    // The review task edits the message once the decision is acted on
    component
        .create_response(ctx, CreateInteractionResponse::Acknowledge)
        .await?;

    Ok(())
}
