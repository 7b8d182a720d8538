//! Runtime configuration, read from the process environment (and `.env` via `dotenv`).

use std::env;
use std::path::PathBuf;

use crate::commands::music::utils::MusicError;

/// Default directory holding the database and the yt-dlp cookie file.
pub const DEFAULT_DATA_DIR: &str = "/data";
/// Default directory holding the locale JSON files.
pub const DEFAULT_LOCALES_DIR: &str = "locales";
/// Filename of the SQLite database inside the data directory.
pub const DATABASE_FILE: &str = "essusic.db";

/// Client credentials for the Spotify Web API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Everything the bot needs to know before connecting to Discord.
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// `None` when either Spotify variable is missing; Spotify features are then disabled.
    pub spotify: Option<SpotifyCredentials>,
    pub data_dir: PathBuf,
    pub cookies_path: PathBuf,
    pub locales_dir: PathBuf,
}

impl Config {
    /// Build the configuration from the real process environment.
    pub fn from_env() -> Result<Self, MusicError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated the same as missing ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MusicError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN")
            .ok_or_else(|| MusicError::ConfigError("DISCORD_TOKEN not set in .env".to_string()))?;

        let spotify = match (get("SPOTIFY_CLIENT_ID"), get("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let data_dir = PathBuf::from(get("ESSUSIC_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into()));
        let cookies_path = get("ESSUSIC_COOKIES")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("cookies.txt"));
        let locales_dir =
            PathBuf::from(get("ESSUSIC_LOCALES_DIR").unwrap_or_else(|| DEFAULT_LOCALES_DIR.into()));

        Ok(Self {
            discord_token,
            spotify,
            data_dir,
            cookies_path,
            locales_dir,
        })
    }

    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    /// A missing token is a configuration error carrying the message shown at startup.
    #[test]
    fn test_missing_token() {
        let result = Config::from_lookup(lookup_from(&[]));

        match result {
            Err(MusicError::ConfigError(msg)) => assert_eq!(msg, "DISCORD_TOKEN not set in .env"),
            other => panic!("Expected ConfigError, got {:?}", other),
        }
    }

    /// Spotify stays disabled unless both credentials are present.
    #[test]
    fn test_spotify_requires_both_credentials() {
        let config =
            Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "t"), ("SPOTIFY_CLIENT_ID", "id")]))
                .unwrap();
        assert!(config.spotify.is_none());

        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "t"),
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();
        assert_eq!(
            config.spotify,
            Some(SpotifyCredentials {
                client_id: "id".into(),
                client_secret: "secret".into()
            })
        );
    }

    /// Paths default to the container layout and follow an overridden data directory.
    #[test]
    fn test_paths() {
        let config = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "t")])).unwrap();
        assert_eq!(config.cookies_path, PathBuf::from("/data/cookies.txt"));
        assert_eq!(config.database_path(), PathBuf::from("/data/essusic.db"));
        assert_eq!(config.locales_dir, PathBuf::from("locales"));

        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "t"),
            ("ESSUSIC_DATA_DIR", "/tmp/essusic"),
        ]))
        .unwrap();
        assert_eq!(config.cookies_path, PathBuf::from("/tmp/essusic/cookies.txt"));
    }
}
