use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::moderation::BANNED_WORDS_PAGE_SIZE;

/// Manage the banned word list
#[poise::command(
    slash_command,
    rename = "banned-words",
    subcommands("add", "remove", "list"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn banned_words(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Use one of the subcommands: `/banned-words add`, `/banned-words remove`, `/banned-words list`").await?;
    Ok(())
}

/// Ban one or more words (comma separated)
#[poise::command(slash_command, guild_only)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Words to ban, separated by commas"] words: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let moderation = &ctx.data().moderation;

    let terms = parse_terms(&words);
    if terms.is_empty() {
        return Err(Error::InvalidOperation("No words given".to_string()));
    }

    let mut added = Vec::new();
    let mut existing = Vec::new();
    for term in terms {
        if moderation.config().add_term(guild_id, &term).await? {
            added.push(term);
        } else {
            existing.push(term);
        }
    }

    if !added.is_empty() {
        moderation
            .audit()
            .log_event(
                "MODERATION_CONFIG",
                &format!("Banned words added by {}: {}", ctx.author().id, added.join(", ")),
            )
            .await;
    }

    let mut description = String::new();
    if !added.is_empty() {
        description.push_str(&format!("**Added:** {}\n", spoilered(&added)));
    }
    if !existing.is_empty() {
        description.push_str(&format!("**Already banned:** {}", spoilered(&existing)));
    }

    let embed = embeds::success_embed()
        .title("Banned Words Updated")
        .description(description);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Remove a word from the list
#[poise::command(slash_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Word to remove"] word: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let moderation = &ctx.data().moderation;
    let word = word.trim().to_lowercase();

    let embed = if moderation.config().remove_term(guild_id, &word).await? {
        moderation
            .audit()
            .log_event(
                "MODERATION_CONFIG",
                &format!("Banned word removed by {}: {}", ctx.author().id, word),
            )
            .await;

        embeds::success_embed()
            .title("Banned Word Removed")
            .description(format!("||{}|| is no longer banned.", word))
    } else {
        embeds::error_embed()
            .title("Not Found")
            .description(format!("||{}|| is not in the banned word list.", word))
    };

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Show the banned word list
#[poise::command(slash_command, guild_only)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Page number"]
    #[min = 1]
    page: Option<u32>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?.get();
    let config = ctx.data().moderation.config().get(guild_id).await?;

    let mut terms = config.banned_terms;
    terms.sort();

    let (page_terms, page, pages) = paginate(&terms, page.unwrap_or(1) as usize);

    let description = if page_terms.is_empty() {
        "No banned words configured.".to_string()
    } else {
        page_terms
            .iter()
            .map(|t| format!("{} ||{}||", embeds::BULLET, t))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = embeds::standard_embed()
        .title(format!("Banned Words ({})", terms.len()))
        .description(description)
        .footer(serenity::all::CreateEmbedFooter::new(format!(
            "Page {} of {}",
            page, pages
        )));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Split comma separated input into lowercase, de-duplicated terms
fn parse_terms(input: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in input.split(',').map(|t| t.trim().to_lowercase()) {
        if !term.is_empty() && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Clamp `page` (1-based) and return that page's slice with the page count
fn paginate(terms: &[String], page: usize) -> (&[String], usize, usize) {
    let pages = terms.len().div_ceil(BANNED_WORDS_PAGE_SIZE).max(1);
    let page = page.clamp(1, pages);
    let start = (page - 1) * BANNED_WORDS_PAGE_SIZE;
    let end = (start + BANNED_WORDS_PAGE_SIZE).min(terms.len());
    (&terms[start..end], page, pages)
}

fn spoilered(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("||{}||", t))
        .collect::<Vec<_>>()
        .join(", ")
}
