//! Sample tracks and ids.

use fake::Fake;
use fake::faker::lorem::en::Words;
use fake::faker::name::en::Name;
use std::time::Duration;

use essusic::commands::music::audio_sources::track_metadata::TrackMetadata;

pub const GUILD_ID: u64 = 400_000_000_000_000_001;
pub const OTHER_GUILD_ID: u64 = 400_000_000_000_000_002;
pub const USER_ID: u64 = 123_456_789;

/// A finished (non-live) YouTube track with a random title and artist.
pub fn track(id: &str) -> TrackMetadata {
    let words: Vec<String> = Words(2..4).fake();
    TrackMetadata {
        title: words.join(" "),
        url: format!("https://www.youtube.com/watch?v={}", id),
        duration: Some(Duration::from_secs((90..400).fake::<u64>())),
        artist: Some(Name().fake()),
        ..Default::default()
    }
}

pub fn tracks(count: usize) -> Vec<TrackMetadata> {
    (0..count).map(|i| track(&format!("vid{:03}", i))).collect()
}
