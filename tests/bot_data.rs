//! Building the shared bot state from configuration, and translating through it.

#[allow(dead_code)]
mod common;

use pretty_assertions::assert_eq;
use serenity::model::id::GuildId;
use std::collections::HashMap;
use test_case::test_case;

use common::fixtures::GUILD_ID;
use essusic::Data;
use essusic::config::Config;
use essusic::utils::database::Database;
use essusic::utils::i18n::Locales;

fn config(pairs: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([(
        "ESSUSIC_LOCALES_DIR".to_string(),
        common::repo_root().join("locales").display().to_string(),
    )]);
    vars.insert("DISCORD_TOKEN".to_string(), "token".to_string());
    for (key, value) in pairs {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid config")
}

fn data(pairs: &[(&str, &str)]) -> Data {
    Data::with_database(config(pairs), Database::open_in_memory().expect("in-memory db"))
}

#[test]
fn test_shipped_locales_load() {
    let locales = Locales::load(common::repo_root().join("locales"));
    assert_eq!(locales.available(), vec!["de", "en", "tr"]);
}

#[test_case("en", "Queue is full (50 tracks max).")]
#[test_case("de", "Die Warteschlange ist voll (maximal 50 Titel).")]
#[test_case("xx", "Queue is full (50 tracks max).")]
fn test_queue_full_message(locale: &str, expected: &str) {
    let locales = Locales::load(common::repo_root().join("locales"));
    assert_eq!(locales.t("queue_full", locale, &[("max", &50)]), expected);
}

#[test]
fn test_spotify_disabled_without_credentials() {
    let data = data(&[("SPOTIFY_CLIENT_ID", "id")]);
    assert!(!data.spotify.available());

    let data = data_with_spotify();
    assert!(data.spotify.available());
}

fn data_with_spotify() -> Data {
    data(&[("SPOTIFY_CLIENT_ID", "id"), ("SPOTIFY_CLIENT_SECRET", "secret")])
}

#[tokio::test]
async fn test_translation_follows_guild_language() {
    common::init_tracing();
    let data = data(&[]);
    let guild = GuildId::new(GUILD_ID);

    assert_eq!(data.t(guild, "paused", &[]).await, "Paused.");

    {
        let queue = data.queues.get(guild);
        let mut gq = queue.lock().await;
        gq.settings.locale = "de".to_string();
        data.queues.save_settings(guild, &gq);
    }
    assert_eq!(data.t(guild, "paused", &[]).await, "Pausiert.");
    assert_eq!(data.t(guild, "no_such_key", &[]).await, "no_such_key");
}
