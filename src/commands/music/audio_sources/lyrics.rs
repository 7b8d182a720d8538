//! lrclib.net lyrics lookup.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::HTTP_CLIENT;
use crate::commands::music::utils::{MusicError, MusicResult, clean_title};

pub const LRCLIB_BASE: &str = "https://lrclib.net";
/// Discord's embed description limit.
pub const PAGE_LIMIT: usize = 4096;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One lrclib record. Only the fields we display are kept.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lyrics {
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub plain_lyrics: Option<String>,
    #[serde(default)]
    pub synced_lyrics: Option<String>,
}

impl Lyrics {
    pub fn text(&self) -> Option<&str> {
        self.plain_lyrics
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.synced_lyrics.as_deref().filter(|t| !t.is_empty()))
    }

    /// `**Title** — Artist`, or just the bold title.
    pub fn header(&self, fallback_title: &str) -> String {
        let title = self.track_name.as_deref().unwrap_or(fallback_title);
        match self.artist_name.as_deref().filter(|a| !a.is_empty()) {
            Some(artist) => format!("**{}** — {}", title, artist),
            None => format!("**{}**", title),
        }
    }

    /// Embed descriptions, the first one prefixed with the header.
    pub fn pages(&self, fallback_title: &str) -> Vec<String> {
        let header = self.header(fallback_title);
        let text = self.text().unwrap_or_default();
        let mut pages = paginate(text, PAGE_LIMIT - header.chars().count() - 2);
        if let Some(first) = pages.first_mut() {
            *first = format!("{}\n\n{}", header, first);
        }
        pages
    }
}

/// Split `text` into chunks of at most `first_limit` characters for the first chunk and
/// `PAGE_LIMIT` for the rest, cutting at a newline when one sits in the back half.
pub fn paginate(text: &str, first_limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest: &str = text;
    let mut limit = first_limit.max(1);

    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let mut cut = &rest[..end];
        if end < rest.len() {
            if let Some(nl) = cut.rfind('\n') {
                if cut[..nl].chars().count() > limit / 2 {
                    cut = &cut[..nl];
                }
            }
        }
        chunks.push(cut.to_string());
        rest = rest[cut.len()..].trim_start_matches('\n');
        limit = PAGE_LIMIT;
    }
    chunks
}

/// Turn a track title (and maybe its artist) into an lrclib query pair.
/// Titles shaped like `Artist - Title` are split when no artist is known.
pub fn search_terms(title: &str, artist: Option<&str>) -> (String, String) {
    let title = clean_title(title);
    match artist.filter(|a| !a.is_empty()) {
        Some(artist) => (artist.to_string(), title),
        None => match title.split_once(" - ") {
            Some((artist, rest)) => (artist.trim().to_string(), rest.trim().to_string()),
            None => (String::new(), title),
        },
    }
}

pub struct LyricsClient {
    base_url: String,
}

impl Default for LyricsClient {
    fn default() -> Self {
        Self::new(LRCLIB_BASE)
    }
}

impl LyricsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Exact match first, then the fuzzy search endpoint.
    pub async fn fetch(&self, artist: &str, title: &str) -> MusicResult<Option<Lyrics>> {
        if !artist.is_empty() && !title.is_empty() {
            let response = HTTP_CLIENT
                .get(format!("{}/api/get", self.base_url))
                .query(&[("track_name", title), ("artist_name", artist)])
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
                .map_err(|e| MusicError::ExternalApiError(format!("lrclib request failed: {}", e)))?;

            if response.status().is_success() {
                if let Ok(hit) = response.json::<Lyrics>().await {
                    if hit.text().is_some() {
                        return Ok(Some(hit));
                    }
                }
            }
            debug!("No exact lrclib match for {} - {}", artist, title);
        }

        let query = format!("{} {}", artist, title).trim().to_string();
        let response = HTTP_CLIENT
            .get(format!("{}/api/search", self.base_url))
            .query(&[("q", query.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| MusicError::ExternalApiError(format!("lrclib request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MusicError::ExternalApiError(format!(
                "lrclib search returned {}",
                response.status()
            )));
        }

        let hits: Vec<Lyrics> = response
            .json()
            .await
            .map_err(|e| MusicError::ExternalApiError(format!("Invalid lrclib response: {}", e)))?;

        Ok(hits.into_iter().find(|hit| hit.text().is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// The exact-match endpoint wins when it has lyrics.
    #[tokio::test]
    async fn test_fetch_exact_match() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get"))
            .and(query_param("track_name", "Creep"))
            .and(query_param("artist_name", "Radiohead"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "trackName": "Creep",
                "artistName": "Radiohead",
                "plainLyrics": "When you were here before"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let client = LyricsClient::new(server.uri());

        // Act
        let hit = client.fetch("Radiohead", "Creep").await.unwrap().unwrap();

        // Assert
        assert_eq!(hit.text(), Some("When you were here before"));
        assert_eq!(hit.header("x"), "**Creep** — Radiohead");
    }

    /// A 404 from the exact endpoint falls through to search, skipping empty hits.
    #[tokio::test]
    async fn test_fetch_falls_back_to_search() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/get"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", "Daft Punk One More Time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "trackName": "Instrumental", "plainLyrics": "" },
                { "trackName": "One More Time", "syncedLyrics": "[00:01] One more time" }
            ])))
            .mount(&server)
            .await;
        let client = LyricsClient::new(server.uri());

        // Act
        let hit = client.fetch("Daft Punk", "One More Time").await.unwrap();

        // Assert
        assert_eq!(hit.and_then(|h| h.track_name), Some("One More Time".to_string()));
    }

    /// Search errors are reported instead of being mistaken for "no lyrics".
    #[tokio::test]
    async fn test_fetch_search_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let client = LyricsClient::new(server.uri());

        assert!(matches!(
            client.fetch("", "anything").await,
            Err(MusicError::ExternalApiError(_))
        ));
    }

    #[test]
    fn test_search_terms() {
        assert_eq!(
            search_terms("Rick Astley - Never Gonna Give You Up (Official Video)", None),
            ("Rick Astley".to_string(), "Never Gonna Give You Up".to_string())
        );
        assert_eq!(
            search_terms("Karma Police", Some("Radiohead")),
            ("Radiohead".to_string(), "Karma Police".to_string())
        );
        assert_eq!(search_terms("Untitled", None), (String::new(), "Untitled".to_string()));
    }

    /// Pages respect the limit and prefer cutting on line boundaries.
    #[test]
    fn test_paginate_on_lines() {
        let line = "la ".repeat(30);
        let text = vec![line.trim_end(); 300].join("\n");

        let pages = paginate(&text, 4000);

        assert!(pages.len() > 1);
        assert!(pages[0].chars().count() <= 4000);
        assert!(pages.iter().skip(1).all(|p| p.chars().count() <= PAGE_LIMIT));
        assert!(pages.iter().all(|p| !p.starts_with('\n')));
        assert!(pages[0].ends_with("la"));
        assert_eq!(pages.concat().len() + pages.len() - 1, text.len());
    }

    /// The header lands on the first page only.
    #[test]
    fn test_pages_header() {
        let lyrics = Lyrics {
            track_name: Some("Song".into()),
            artist_name: None,
            plain_lyrics: Some("short".into()),
            synced_lyrics: None,
        };
        assert_eq!(lyrics.pages("fallback"), vec!["**Song**\n\nshort".to_string()]);
    }
}
