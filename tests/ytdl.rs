//! `Ytdl` driven through a stub `yt-dlp` script.

#[allow(dead_code)]
mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use common::stubs::{calls, write_stub};
use essusic::commands::music::audio_sources::youtube::Ytdl;
use essusic::commands::music::utils::MusicError;

const VIDEO: &str = r#"{"title":"Never Gonna Give You Up","webpage_url":"https://www.youtube.com/watch?v=dQw4w9WgXcQ","url":"https://rr1.googlevideo.com/audio","duration":213,"uploader":"Rick Astley","thumbnail":"https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg"}"#;

const SEARCH: &str = r#"{"entries":[{"title":"A channel","url":"https://www.youtube.com/channel/UC1"},{"title":"First","id":"aaaaaaaaaaa","duration":60},{"title":"Second","url":"https://www.youtube.com/watch?v=bbbbbbbbbbb","duration":120}]}"#;

const PLAYLIST: &str = r#"{"title":"Mixtape","entries":[{"title":"One","id":"ccccccccccc"},null,{"title":"Two","id":"ddddddddddd"}]}"#;

/// A stub that prints `stdout` and exits with `code`, logging its arguments.
fn ytdl(dir: &TempDir, stdout: &str, code: i32) -> Ytdl {
    let out = dir.path().join("out.json");
    fs::write(&out, stdout).expect("write stub output");
    let body = format!(
        "echo \"$*\" >> '{}'\ncat '{}'\n[[ {} -ne 0 ]] && echo 'ERROR: [youtube] Video unavailable' >&2\nexit {}",
        args_log(dir).display(),
        out.display(),
        code,
        code
    );
    let binary = write_stub(dir.path(), "yt-dlp", &body);
    Ytdl::new(dir.path().join("missing-cookies.txt")).with_binary(binary.display().to_string())
}

/// Arguments of every stub invocation, one line each.
fn args_log(dir: &TempDir) -> PathBuf {
    dir.path().join("args.log")
}

#[tokio::test]
async fn test_stream_url_reads_media_url() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let ytdl = ytdl(&dir, VIDEO, 0);

    let (track, stream) = assert_ok!(ytdl.stream_url("https://youtu.be/dQw4w9WgXcQ").await);

    assert_eq!(stream, "https://rr1.googlevideo.com/audio");
    assert_eq!(track.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert_eq!(track.duration, Some(Duration::from_secs(213)));
    assert_eq!(track.artist.as_deref(), Some("Rick Astley"));
}

#[tokio::test]
async fn test_search_keeps_only_videos() {
    let dir = TempDir::new().unwrap();
    let ytdl = ytdl(&dir, SEARCH, 0);

    let results = assert_ok!(ytdl.search("rick", 5).await);

    let titles: Vec<&str> = results.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["First", "Second"]);
    assert_eq!(results[0].url, "https://www.youtube.com/watch?v=aaaaaaaaaaa");
}

#[tokio::test]
async fn test_playlist_skips_unavailable_entries() {
    let dir = TempDir::new().unwrap();
    let ytdl = ytdl(&dir, PLAYLIST, 0);

    let (title, entries) = assert_ok!(ytdl.playlist("https://www.youtube.com/playlist?list=PL1").await);

    assert_eq!(title, "Mixtape");
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_failure_reports_last_stderr_line() {
    let dir = TempDir::new().unwrap();
    let ytdl = ytdl(&dir, "", 1);

    let error = assert_err!(ytdl.resolve("https://youtu.be/gone").await);

    assert_matches!(error, MusicError::AudioSourceError(reason) if reason.contains("Video unavailable"));
}

#[tokio::test]
async fn test_missing_cookie_file_is_not_passed() {
    let dir = TempDir::new().unwrap();
    let ytdl = ytdl(&dir, VIDEO, 0);
    assert_ok!(ytdl.resolve("ytsearch:never gonna").await);

    let calls = calls(&args_log(&dir));
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].contains("--cookies"), "{}", calls[0]);
    assert!(calls[0].ends_with("ytsearch:never gonna"));
}
