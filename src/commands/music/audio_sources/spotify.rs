//! Spotify Web API client.
//!
//! Spotify audio is never streamed directly: tracks, albums and playlists are turned into
//! `"Artist - Title"` strings that are searched on YouTube at play time. The client also powers
//! recommendations (autoplay, radio, `/similar`) through related artists' top tracks.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::track_metadata::TrackMetadata;
use crate::HTTP_CLIENT;
use crate::commands::music::utils::{MusicError, MusicResult};
use crate::config::SpotifyCredentials;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
pub const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

/// Authentication tokens for Spotify API
#[derive(Debug, Serialize, Deserialize)]
struct SpotifyToken {
    access_token: String,
    token_type: String,
    expires_in: u64,
    #[serde(skip, default = "Instant::now")]
    created_at: Instant,
}

impl SpotifyToken {
    fn is_expired(&self) -> bool {
        let expiry = Duration::from_secs(self.expires_in);
        let elapsed = self.created_at.elapsed();
        // Consider it expired 30 seconds before actual expiry
        elapsed > expiry.saturating_sub(Duration::from_secs(30))
    }
}

/// Spotify API client
pub struct SpotifyClient {
    credentials: Option<SpotifyCredentials>,
    api_base: String,
    accounts_base: String,
    token: Mutex<Option<SpotifyToken>>,
}

impl SpotifyClient {
    pub fn new(credentials: Option<SpotifyCredentials>) -> Self {
        if credentials.is_none() {
            warn!("Spotify credentials not set, Spotify links will not work.");
        }
        Self {
            credentials,
            api_base: SPOTIFY_API_BASE.to_string(),
            accounts_base: SPOTIFY_ACCOUNTS_BASE.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Point the client at different hosts (used against mock servers).
    pub fn with_base_urls(mut self, api_base: impl Into<String>, accounts_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.accounts_base = accounts_base.into();
        self
    }

    pub fn available(&self) -> bool {
        self.credentials.is_some()
    }

    /// Get an access token for Spotify API
    async fn access_token(&self) -> MusicResult<String> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| MusicError::ConfigError("Spotify credentials are not configured.".to_string()))?;

        let mut token_lock = self.token.lock().await;

        // Return existing token if it's still valid
        if let Some(token) = &*token_lock {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        // Create authorization header (Basic auth with client_id:client_secret)
        let auth = BASE64_STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));

        debug!("Requesting a new Spotify access token");
        let response = HTTP_CLIENT
            .post(format!("{}/api/token", self.accounts_base))
            .header(header::AUTHORIZATION, format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                MusicError::ExternalApiError(format!("Failed to request Spotify token: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Cannot read response".to_string());
            return Err(MusicError::ExternalApiError(format!(
                "Spotify API error: {} - {}",
                status, text
            )));
        }

        let token = response.json::<SpotifyToken>().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify token: {}", e))
        })?;

        let access_token = token.access_token.clone();
        *token_lock = Some(token);

        Ok(access_token)
    }

    /// GET a Web API resource. `target` is either a path below the API base or a full
    /// pagination URL returned by Spotify.
    async fn get_json(&self, target: &str, query: &[(&str, String)]) -> MusicResult<Value> {
        let token = self.access_token().await?;
        let url = if target.starts_with("http") {
            target.to_string()
        } else {
            format!("{}{}", self.api_base, target)
        };

        let response = HTTP_CLIENT
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .query(query)
            .send()
            .await
            .map_err(|e| MusicError::ExternalApiError(format!("Failed to request {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Cannot read response".to_string());
            return Err(MusicError::ExternalApiError(format!(
                "Spotify API error: {} - {}",
                status, text
            )));
        }

        response.json().await.map_err(|e| {
            MusicError::ExternalApiError(format!("Failed to parse Spotify response: {}", e))
        })
    }

    /// Follow `next` links and collect the `items` of every page.
    async fn paginate(&self, first: &str, query: &[(&str, String)]) -> MusicResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = self.get_json(first, query).await?;

        loop {
            if let Some(page_items) = page["items"].as_array() {
                items.extend(page_items.iter().cloned());
            }
            match page["next"].as_str() {
                Some(next) => page = self.get_json(next, &[]).await?,
                None => break,
            }
        }

        Ok(items)
    }

    pub async fn resolve_track(&self, track_id: &str) -> MusicResult<Vec<String>> {
        if !self.available() {
            return Ok(Vec::new());
        }
        let track = self.get_json(&format!("/tracks/{}", track_id), &[]).await?;
        Ok(vec![format_track(&track)])
    }

    pub async fn resolve_playlist(&self, playlist_id: &str) -> MusicResult<Vec<String>> {
        if !self.available() {
            return Ok(Vec::new());
        }
        let items = self
            .paginate(
                &format!("/playlists/{}/tracks", playlist_id),
                &[("limit", "100".to_string())],
            )
            .await?;
        info!("Resolved {} Spotify playlist items", items.len());

        // Local files and removed tracks come back with a null `track`.
        Ok(items
            .iter()
            .filter(|item| item["track"].is_object())
            .map(|item| format_track(&item["track"]))
            .collect())
    }

    pub async fn resolve_album(&self, album_id: &str) -> MusicResult<Vec<String>> {
        if !self.available() {
            return Ok(Vec::new());
        }
        let items = self
            .paginate(
                &format!("/albums/{}/tracks", album_id),
                &[("limit", "50".to_string())],
            )
            .await?;
        Ok(items.iter().map(format_track).collect())
    }

    /// Search Spotify for tracks.
    pub async fn search(&self, query: &str, limit: usize) -> MusicResult<Vec<TrackMetadata>> {
        if !self.available() {
            return Ok(Vec::new());
        }
        let results = self.search_items(query, "track", limit).await?;
        Ok(results.iter().map(track_to_metadata).collect())
    }

    async fn search_items(&self, query: &str, kind: &str, limit: usize) -> MusicResult<Vec<Value>> {
        let results = self
            .get_json(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", kind.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(results[format!("{}s", kind)]["items"]
            .as_array()
            .cloned()
            .unwrap_or_default())
    }

    /// Artist of the best matching track, falling back to an artist search.
    async fn artist_id(&self, query: &str) -> MusicResult<Option<String>> {
        let tracks = self.search_items(query, "track", 1).await?;
        if let Some(id) = tracks
            .first()
            .and_then(|track| track["artists"][0]["id"].as_str())
        {
            return Ok(Some(id.to_string()));
        }

        let artists = self.search_items(query, "artist", 1).await?;
        Ok(artists
            .first()
            .and_then(|artist| artist["id"].as_str())
            .map(str::to_string))
    }

    /// Top tracks of artists related to `artist_id`, skipping and then recording ids in `exclude`.
    async fn related_top_tracks(
        &self,
        artist_id: &str,
        exclude: &mut HashSet<String>,
        limit: usize,
    ) -> Vec<(String, TrackMetadata)> {
        let related = match self
            .get_json(&format!("/artists/{}/related-artists", artist_id), &[])
            .await
        {
            Ok(related) => related,
            Err(e) => {
                warn!("Spotify related artists failed: {}", e);
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for artist in related["artists"].as_array().into_iter().flatten() {
            if out.len() >= limit {
                break;
            }
            let Some(id) = artist["id"].as_str() else {
                continue;
            };
            let top = match self
                .get_json(
                    &format!("/artists/{}/top-tracks", id),
                    &[("market", "US".to_string())],
                )
                .await
            {
                Ok(top) => top,
                Err(_) => continue,
            };

            for track in top["tracks"].as_array().into_iter().flatten() {
                let Some(track_id) = track["id"].as_str() else {
                    continue;
                };
                if !exclude.insert(track_id.to_string()) {
                    continue;
                }
                out.push((track_id.to_string(), track_to_metadata(track)));
                if out.len() >= limit {
                    break;
                }
            }
        }
        out
    }

    /// One track similar to `query`.
    pub async fn recommend(&self, query: &str) -> MusicResult<Option<TrackMetadata>> {
        Ok(self.recommend_multiple(query, 1).await?.into_iter().next())
    }

    /// Up to `limit` tracks similar to `query`.
    pub async fn recommend_multiple(&self, query: &str, limit: usize) -> MusicResult<Vec<TrackMetadata>> {
        if !self.available() {
            return Ok(Vec::new());
        }
        let Some(artist_id) = self.artist_id(query).await? else {
            return Ok(Vec::new());
        };
        let mut exclude = HashSet::new();
        Ok(self
            .related_top_tracks(&artist_id, &mut exclude, limit)
            .await
            .into_iter()
            .map(|(_, track)| track)
            .collect())
    }

    /// Radio recommendations for a seed artist or track, returned with their Spotify ids
    /// so the caller can avoid repeats.
    pub async fn recommend_by_seed(
        &self,
        seed: &str,
        exclude: &HashSet<String>,
        limit: usize,
    ) -> MusicResult<Vec<(String, TrackMetadata)>> {
        if !self.available() {
            return Ok(Vec::new());
        }

        let artists = self.search_items(seed, "artist", 1).await?;
        let artist_id = match artists.first().and_then(|a| a["id"].as_str()) {
            Some(id) => id.to_string(),
            None => {
                let tracks = self.search_items(seed, "track", 1).await?;
                match tracks.first().and_then(|t| t["artists"][0]["id"].as_str()) {
                    Some(id) => id.to_string(),
                    None => return Ok(Vec::new()),
                }
            }
        };

        let mut exclude = exclude.clone();
        Ok(self.related_top_tracks(&artist_id, &mut exclude, limit).await)
    }
}

fn artist_names(track: &Value) -> String {
    track["artists"]
        .as_array()
        .map(|artists| {
            artists
                .iter()
                .filter_map(|a| a["name"].as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

/// `"Artist A, Artist B - Track"`, the string searched on YouTube.
pub fn format_track(track: &Value) -> String {
    format!(
        "{} - {}",
        artist_names(track),
        track["name"].as_str().unwrap_or("Unknown")
    )
}

/// Queue entry for a Spotify track, resolved through a YouTube search at play time.
pub fn track_to_metadata(track: &Value) -> TrackMetadata {
    let mut metadata = TrackMetadata::from_search_term(format_track(track));
    metadata.duration = track["duration_ms"]
        .as_u64()
        .filter(|ms| *ms > 0)
        .map(|ms| Duration::from_secs(ms / 1000));
    metadata.artist = Some(artist_names(track)).filter(|a| !a.is_empty());
    metadata.thumbnail = track["album"]["images"][0]["url"].as_str().map(str::to_string);
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Option<SpotifyCredentials> {
        Some(SpotifyCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        })
    }

    async fn client_for(server: &MockServer) -> SpotifyClient {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
        SpotifyClient::new(credentials()).with_base_urls(server.uri(), server.uri())
    }

    fn track(id: &str, name: &str, artist: &str, artist_id: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "duration_ms": 215_000,
            "artists": [{ "id": artist_id, "name": artist }],
            "album": { "images": [{ "url": "https://img/1.jpg" }] }
        })
    }

    /// The token is requested with Basic auth once and reused while valid.
    #[tokio::test]
    async fn test_token_cached() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header("Authorization", "Basic aWQ6c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tracks/abc"))
            .and(header("Authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(track("abc", "Song", "Band", "b1")))
            .expect(2)
            .mount(&server)
            .await;
        let client = SpotifyClient::new(credentials()).with_base_urls(server.uri(), server.uri());

        // Act
        let first = client.resolve_track("abc").await.unwrap();
        let second = client.resolve_track("abc").await.unwrap();

        // Assert
        assert_eq!(first, vec!["Band - Song".to_string()]);
        assert_eq!(first, second);
    }

    /// Playlists follow `next` links and skip items whose track was removed.
    #[tokio::test]
    async fn test_resolve_playlist_paginates() {
        // Arrange
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/playlists/pl/tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "track": track("1", "First", "A", "a") },
                    { "track": null }
                ],
                "next": format!("{}/page2", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "track": {
                    "id": "2", "name": "Second",
                    "artists": [{ "name": "B" }, { "name": "C" }]
                }}],
                "next": null
            })))
            .mount(&server)
            .await;

        // Act
        let result = client.resolve_playlist("pl").await.unwrap();

        // Assert
        assert_eq!(result, vec!["A - First".to_string(), "B, C - Second".to_string()]);
    }

    /// Search results become ytsearch tracks with duration and artist.
    #[tokio::test]
    async fn test_search_maps_tracks() {
        // Arrange
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("type", "track"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tracks": { "items": [track("1", "Get Lucky", "Daft Punk", "dp")] }
            })))
            .mount(&server)
            .await;

        // Act
        let results = client.search("get lucky", 5).await.unwrap();

        // Assert
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Daft Punk - Get Lucky");
        assert_eq!(results[0].url, "ytsearch:Daft Punk - Get Lucky");
        assert_eq!(results[0].duration_secs(), 215);
        assert_eq!(results[0].artist.as_deref(), Some("Daft Punk"));
    }

    /// Radio seeds prefer an artist match and never return excluded track ids.
    #[tokio::test]
    async fn test_recommend_by_seed_excludes_history() {
        // Arrange
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("type", "artist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artists": { "items": [{ "id": "radiohead" }] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artists/radiohead/related-artists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artists": [{ "id": "muse" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artists/muse/top-tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tracks": [
                    track("t1", "Uprising", "Muse", "muse"),
                    track("t2", "Starlight", "Muse", "muse")
                ]
            })))
            .mount(&server)
            .await;
        let exclude: HashSet<String> = ["t1".to_string()].into_iter().collect();

        // Act
        let results = client.recommend_by_seed("Radiohead", &exclude, 1).await.unwrap();

        // Assert
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "t2");
        assert_eq!(results[0].1.title, "Muse - Starlight");
    }

    /// Recommendations fall back to an artist search when no track matches.
    #[tokio::test]
    async fn test_recommend_artist_fallback() {
        // Arrange
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("type", "track"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tracks": { "items": [] } })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("type", "artist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artists": { "items": [{ "id": "a1" }] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artists/a1/related-artists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "artists": [{ "id": "a2" }] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artists/a2/top-tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tracks": [track("x", "Similar", "Other", "a2")]
            })))
            .mount(&server)
            .await;

        // Act
        let result = client.recommend("some artist").await.unwrap();

        // Assert
        assert_eq!(result.map(|t| t.title), Some("Other - Similar".to_string()));
    }

    /// Non-success statuses surface as external API errors.
    #[tokio::test]
    async fn test_api_error() {
        // Arrange
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("GET"))
            .and(path("/albums/missing/tracks"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        // Act
        let result = client.resolve_album("missing").await;

        // Assert
        match result {
            Err(MusicError::ExternalApiError(msg)) => assert!(msg.contains("404")),
            other => panic!("Expected ExternalApiError, got {:?}", other),
        }
    }

    /// Without credentials nothing is requested and results are empty.
    #[tokio::test]
    async fn test_unavailable() {
        let client = SpotifyClient::new(None);
        assert!(!client.available());
        assert!(client.search("anything", 5).await.unwrap().is_empty());
        assert!(client.recommend("anything").await.unwrap().is_none());
    }
}
