//! Essusic: a Discord music bot built on poise, serenity and songbird.
//!
//! The binary in `main.rs` only sets up logging and configuration; everything else
//! lives here so that the integration tests can reach it.

use ::serenity::all::ClientBuilder;
use poise::serenity_prelude as serenity;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};

pub mod commands;
pub mod config;
pub mod events;
pub mod utils;

use commands::music::audio_sources::lyrics::LyricsClient;
use commands::music::audio_sources::spotify::SpotifyClient;
use commands::music::audio_sources::youtube::Ytdl;
use commands::music::utils::embedded_messages;
use commands::music::utils::queue_manager::QueueManager;
use commands::music::utils::views::ViewRegistry;
use commands::music::utils::{MusicError, MusicResult};
use config::Config;
use utils::database::Database;
use utils::i18n::Locales;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// Shared HTTP client for every outbound API call.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// User data, which is stored and accessible in all command invocations and event handlers.
#[derive(Clone)]
pub struct Data {
    pub config: Arc<Config>,
    pub queues: Arc<QueueManager>,
    pub spotify: Arc<SpotifyClient>,
    pub lyrics: Arc<LyricsClient>,
    pub youtube: Arc<Ytdl>,
    pub locales: Arc<Locales>,
    pub views: Arc<ViewRegistry>,
}

impl Data {
    /// Open the database and build every client from the configuration.
    pub fn new(config: Config) -> MusicResult<Self> {
        let db = Database::open(config.database_path())?;
        Ok(Self::with_database(config, db))
    }

    pub fn with_database(config: Config, db: Database) -> Self {
        let locales = Locales::load(&config.locales_dir);
        if !config.cookies_path.exists() {
            warn!(
                "No yt-dlp cookie file at {}; age-restricted videos will fail",
                config.cookies_path.display()
            );
        }
        if config.spotify.is_none() {
            info!("Spotify credentials not set; Spotify features are disabled");
        }

        Self {
            spotify: Arc::new(SpotifyClient::new(config.spotify.clone())),
            youtube: Arc::new(Ytdl::new(config.cookies_path.clone())),
            lyrics: Arc::new(LyricsClient::default()),
            queues: Arc::new(QueueManager::new(Arc::new(db))),
            locales: Arc::new(locales),
            views: Arc::new(ViewRegistry::default()),
            config: Arc::new(config),
        }
    }

    pub fn db(&self) -> &Database {
        self.queues.db()
    }

    /// Translate `key` into the guild's configured language.
    pub async fn t(
        &self,
        guild_id: serenity::GuildId,
        key: &str,
        vars: &[(&str, &(dyn std::fmt::Display + Sync))],
    ) -> String {
        let locale = self.queues.get(guild_id).lock().await.settings.locale.clone();
        self.locales.t(key, &locale, vars)
    }
}

/// Browse all bot commands by category
#[poise::command(slash_command, category = "Help")]
pub async fn help(ctx: Context<'_>) -> CommandResult {
    ctx.send(embedded_messages::help_reply()).await?;
    Ok(())
}

/// Register or unregister the slash commands with Discord.
#[poise::command(prefix_command, slash_command, hide_in_help, category = "Help")]
pub async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

/// Log framework errors and answer the user with an ephemeral error embed.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().name, error);
            let message = match error.downcast_ref::<MusicError>() {
                Some(music_error) => music_error.to_string(),
                None => "Something went wrong while running that command.".to_string(),
            };
            if let Err(e) = ctx.send(embedded_messages::error_reply(&message)).await {
                warn!("Failed to send error reply: {}", e);
            }
        }
        poise::FrameworkError::GuildOnly { ctx, .. } => {
            let reply = embedded_messages::error_reply("This command only works in a server.");
            if let Err(e) = ctx.send(reply).await {
                warn!("Failed to send guild-only reply: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Connect to Discord and run until the gateway closes.
pub async fn start(config: Config) -> Result<(), Error> {
    let token = config.discord_token.clone();
    let data = Data::new(config)?;

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut commands = vec![register(), help()];
    commands.extend(commands::music::commands());

    let framework_data = data.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(framework_data)
            })
        });

    let client_builder = ClientBuilder::new(token, intents)
        .framework(framework.build())
        .event_handler(events::Handler::new(data));

    build_and_start_client(client_builder).await
}

async fn build_and_start_client(client_builder: ClientBuilder) -> Result<(), Error> {
    #[cfg(feature = "music")]
    {
        use songbird::SerenityInit;

        let mut client = client_builder.register_songbird().await?;
        client.start().await.map_err(Into::into)
    }

    #[cfg(not(feature = "music"))]
    {
        let mut client = client_builder.await?;
        client.start().await.map_err(Into::into)
    }
}
