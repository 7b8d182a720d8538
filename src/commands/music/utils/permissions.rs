use poise::serenity_prelude as serenity;
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};
use serenity::model::guild::Member;

use super::embedded_messages;
use crate::{Context, Data, Error};

/// Whether a member may use DJ-restricted controls.
///
/// Allowed when no DJ role is configured, for administrators and role holders, and for anyone
/// who is alone (at most one human) in their voice channel.
pub fn dj_allowed(
    dj_role_id: Option<u64>,
    is_admin: bool,
    member_roles: &[RoleId],
    humans_in_channel: Option<usize>,
) -> bool {
    let Some(role_id) = dj_role_id else {
        return true;
    };
    is_admin
        || member_roles.iter().any(|r| r.get() == role_id)
        || humans_in_channel.is_some_and(|count| count <= 1)
}

/// Non-bot users connected to `channel_id`, read from the cache.
pub fn humans_in_channel(ctx: &serenity::Context, guild_id: GuildId, channel_id: ChannelId) -> usize {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return 0;
    };
    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id))
        .filter(|state| {
            let is_bot = state
                .member
                .as_ref()
                .map(|m| m.user.bot)
                .or_else(|| guild.members.get(&state.user_id).map(|m| m.user.bot))
                .unwrap_or(false);
            !is_bot
        })
        .count()
}

/// The voice channel a user is connected to, read from the cache.
pub fn user_voice_channel(ctx: &serenity::Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    ctx.cache
        .guild(guild_id)?
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
}

fn is_admin(ctx: &serenity::Context, guild_id: GuildId, member: &Member) -> bool {
    if member.permissions.is_some_and(|p| p.administrator()) {
        return true;
    }
    ctx.cache
        .guild(guild_id)
        .is_some_and(|guild| guild.owner_id == member.user.id)
}

/// `None` when the member passes the DJ check, otherwise the message to show them.
pub async fn check_dj(ctx: &serenity::Context, data: &Data, guild_id: GuildId, member: &Member) -> Option<String> {
    let dj_role_id = data.queues.get(guild_id).lock().await.settings.dj_role_id;
    let role_id = dj_role_id?;

    let humans = user_voice_channel(ctx, guild_id, member.user.id)
        .map(|channel| humans_in_channel(ctx, guild_id, channel));
    if dj_allowed(dj_role_id, is_admin(ctx, guild_id, member), &member.roles, humans) {
        return None;
    }

    let role_name = ctx
        .cache
        .guild(guild_id)
        .and_then(|guild| guild.roles.get(&RoleId::new(role_id)).map(|r| r.name.clone()))
        .unwrap_or_else(|| "DJ".to_string());
    Some(data.t(guild_id, "dj_required", &[("role", &role_name)]).await)
}

/// Command guard: answers with an ephemeral error and returns `false` when the author is not a DJ.
pub async fn require_dj(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(false);
    };
    let Some(member) = ctx.author_member().await else {
        return Ok(true);
    };
    match check_dj(ctx.serenity_context(), ctx.data(), guild_id, &member).await {
        None => Ok(true),
        Some(message) => {
            ctx.send(embedded_messages::error_reply(&message)).await?;
            Ok(false)
        }
    }
}

/// Whether the invoking member is a DJ, without replying.
pub async fn author_is_dj(ctx: Context<'_>) -> bool {
    let Some(guild_id) = ctx.guild_id() else {
        return false;
    };
    match ctx.author_member().await {
        Some(member) => check_dj(ctx.serenity_context(), ctx.data(), guild_id, &member)
            .await
            .is_none(),
        None => false,
    }
}

/// Whether the invoking member is an administrator.
pub async fn author_is_admin(ctx: Context<'_>) -> bool {
    let Some(guild_id) = ctx.guild_id() else {
        return false;
    };
    match ctx.author_member().await {
        Some(member) => is_admin(ctx.serenity_context(), guild_id, &member),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const DJ: u64 = 77;

    #[test_case(None, false, &[], Some(5), true ; "no dj role configured")]
    #[test_case(Some(DJ), true, &[], Some(5), true ; "administrator")]
    #[test_case(Some(DJ), false, &[RoleId::new(DJ)], Some(5), true ; "has the role")]
    #[test_case(Some(DJ), false, &[RoleId::new(1)], Some(1), true ; "alone in channel")]
    #[test_case(Some(DJ), false, &[RoleId::new(1)], Some(2), false ; "shared channel")]
    #[test_case(Some(DJ), false, &[], None, false ; "not in voice")]
    fn test_dj_allowed(role: Option<u64>, admin: bool, roles: &[RoleId], humans: Option<usize>, expected: bool) {
        assert_eq!(dj_allowed(role, admin, roles, humans), expected);
    }
}
