use serenity::all::{ComponentInteraction, CreateMessage, GuildId, Ready, VoiceState};
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::Data;

#[cfg(feature = "music")]
use crate::commands::music::utils::{
    component_handlers, embedded_messages, event_handlers, music_manager::MUSIC_MANAGER,
    music_manager::MusicManager, permissions,
};

/// How long the "now playing" notice for a newly joined listener stays up.
const JOIN_NOTICE_TTL: Duration = Duration::from_secs(30);
/// How often expired component views are swept.
const VIEW_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Handler {
    data: Data,
    sweeping: AtomicBool,
}

impl Handler {
    pub fn new(data: Data) -> Self {
        Self {
            data,
            sweeping: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl serenity::prelude::EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected to {} guilds", ready.user.name, ready.guilds.len());
        // guilds arrive in the cache after Ready, so count the ones Ready lists
        #[cfg(feature = "music")]
        event_handlers::set_idle_presence_for(&ctx, ready.guilds.len());

        if !self.sweeping.swap(true, Ordering::SeqCst) {
            let views = self.data.views.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(VIEW_SWEEP_INTERVAL).await;
                    let expired = views.purge_expired();
                    if !expired.is_empty() {
                        debug!("Swept {} expired component views", expired.len());
                    }
                }
            });
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            if component.data.custom_id.starts_with("music_") {
                self.music_component_interaction(&ctx, &component).await;
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        #[cfg(feature = "music")]
        self.music_voice_state_update(&ctx, old, new).await;
        #[cfg(not(feature = "music"))]
        let _ = (ctx, old, new);
    }
}

impl Handler {
    /// Handle component interactions for components with identities starting with "music_"
    async fn music_component_interaction(&self, ctx: &Context, component: &ComponentInteraction) {
        #[cfg(feature = "music")]
        if let Err(e) = component_handlers::handle_interaction(ctx, &self.data, component).await {
            error!("Error handling component interaction: {}", e);
        }
        #[cfg(not(feature = "music"))]
        {
            let _ = ctx;
            error!("Music component {} ignored: built without voice support", component.data.custom_id);
        }
    }

    /// Greet listeners joining mid-track and leave when the last human goes.
    #[cfg(feature = "music")]
    async fn music_voice_state_update(&self, ctx: &Context, old: Option<VoiceState>, new: VoiceState) {
        let is_bot = new.member.as_ref().is_some_and(|m| m.user.bot);
        let Some(guild_id) = new.guild_id else {
            return;
        };
        if is_bot {
            return;
        }
        let Some(bot_channel) = MusicManager::bot_channel(ctx, guild_id).await else {
            return;
        };

        let old_channel = old.as_ref().and_then(|state| state.channel_id);
        let joined = new.channel_id == Some(bot_channel) && old_channel != new.channel_id;
        if joined {
            self.post_join_notice(ctx, guild_id).await;
        }

        if old_channel != Some(bot_channel) || new.channel_id == Some(bot_channel) {
            return;
        }
        if permissions::humans_in_channel(ctx, guild_id, bot_channel) > 0 {
            return;
        }
        let queue = self.data.queues.get(guild_id);
        {
            let mut gq = queue.lock().await;
            if gq.settings.stay_connected {
                debug!("Alone in guild {} but 24/7 mode is on", guild_id);
                return;
            }
            gq.clear();
        }
        info!("Everyone left the voice channel in guild {}; disconnecting", guild_id);
        event_handlers::disconnect(ctx, &self.data, guild_id).await;
    }

    #[cfg(feature = "music")]
    async fn post_join_notice(&self, ctx: &Context, guild_id: GuildId) {
        {
            let manager = MUSIC_MANAGER.lock().await;
            if !manager.is_active(guild_id) || manager.is_paused(guild_id) {
                return;
            }
        }
        let (channel, embed) = {
            let queue = self.data.queues.get(guild_id);
            let gq = queue.lock().await;
            let (Some(channel), Some(track)) = (gq.text_channel_id, gq.current.as_ref()) else {
                return;
            };
            (channel, embedded_messages::join_notice(track, gq.elapsed_secs()))
        };

        let message = match channel.send_message(&ctx.http, CreateMessage::new().embed(embed)).await {
            Ok(message) => message,
            Err(e) => {
                debug!("Could not post join notice in guild {}: {}", guild_id, e);
                return;
            }
        };
        let http = ctx.http.clone();
        tokio::spawn(async move {
            tokio::time::sleep(JOIN_NOTICE_TTL).await;
            if let Err(e) = message.delete(&http).await {
                debug!("Join notice already gone: {}", e);
            }
        });
    }
}
