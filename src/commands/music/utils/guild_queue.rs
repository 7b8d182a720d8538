//! Per-guild playback state: the queue itself, loop handling, votes, radio bookkeeping,
//! DJ approval requests, undo snapshots and the playback clock.

use rand::seq::SliceRandom;
use regex::Regex;
use serenity::model::id::{ChannelId, MessageId, UserId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use super::guild_settings::{GuildSettings, LoopMode};
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;

pub const MAX_UNDO: usize = 10;
pub const MAX_PENDING_REQUESTS: usize = 50;
pub const MAX_RADIO_HISTORY: usize = 200;

static ARTIST_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[-–—|]\s+").expect("valid artist separator regex"));

/// Artist key from an `Artist - Title` string, lowercased. Empty when there is no separator.
pub fn extract_artist(title: &str) -> String {
    let mut parts = ARTIST_SEP_RE.splitn(title, 2);
    match (parts.next(), parts.next()) {
        (Some(artist), Some(_)) => artist.trim().to_lowercase(),
        _ => String::new(),
    }
}

/// Wall-clock position tracking that survives pauses and speed changes.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    started: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    speed: f32,
}

impl PlaybackClock {
    /// Start counting as if playback had already reached `seek_secs`.
    pub fn start(&mut self, seek_secs: u64, speed: f32) {
        let speed = if speed > 0.0 { speed } else { 1.0 };
        let offset = Duration::from_secs_f64(seek_secs as f64 / speed as f64);
        let now = Instant::now();
        self.started = Some(now.checked_sub(offset).unwrap_or(now));
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.speed = speed;
    }

    pub fn pause(&mut self) {
        if self.started.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Seconds of audio played so far.
    pub fn elapsed_secs(&self) -> u64 {
        let Some(started) = self.started else {
            return 0;
        };
        let until = self.paused_at.unwrap_or_else(Instant::now);
        let wall = until
            .saturating_duration_since(started)
            .saturating_sub(self.paused_total);
        (wall.as_secs_f64() * self.speed as f64) as u64
    }
}

/// A track waiting for DJ approval.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub id: u64,
    pub track: TrackMetadata,
}

/// Spotify ids already played by radio, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RadioHistory {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl RadioHistory {
    pub fn insert(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.ids.insert(id.clone()) {
            self.order.push_back(id);
        }
        if self.order.len() > MAX_RADIO_HISTORY {
            // Keep the newer half.
            let drop = self.order.len() - MAX_RADIO_HISTORY / 2;
            for old in self.order.drain(..drop) {
                self.ids.remove(&old);
            }
        }
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.ids.clear();
    }
}

#[derive(Debug, Default)]
pub struct GuildQueue {
    pub settings: GuildSettings,
    pub queue: VecDeque<TrackMetadata>,
    pub current: Option<TrackMetadata>,
    pub previous: Option<TrackMetadata>,
    pub text_channel_id: Option<ChannelId>,
    pub np_message_id: Option<MessageId>,
    pub skip_votes: HashSet<UserId>,
    pub radio_mode: bool,
    pub radio_seed: Option<String>,
    pub radio_history: RadioHistory,
    pub dj_queue_mode: bool,
    pub pending_requests: VecDeque<PendingRequest>,
    next_request_id: u64,
    undo_stack: Vec<(Vec<TrackMetadata>, String)>,
    pub clock: PlaybackClock,
}

impl GuildQueue {
    pub fn new(settings: GuildSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.settings.max_queue
    }

    /// Append a track. Returns its 1-based position, or `None` when the queue is full.
    pub fn add(&mut self, track: TrackMetadata) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        self.queue.push_back(track);
        Some(self.queue.len())
    }

    /// Insert a track at the front. The caller checks capacity.
    pub fn push_front(&mut self, track: TrackMetadata) {
        self.queue.push_front(track);
    }

    /// Advance according to the loop mode and return the new current track.
    pub fn next_track(&mut self) -> Option<TrackMetadata> {
        self.skip_votes.clear();
        if self.settings.loop_mode == LoopMode::Single {
            if let Some(current) = &self.current {
                return Some(current.clone());
            }
        }

        self.previous = self.current.take();

        if self.settings.loop_mode == LoopMode::Queue {
            if let Some(previous) = &self.previous {
                self.queue.push_back(previous.clone());
            }
        }

        self.current = self.queue.pop_front();
        self.current.clone()
    }

    /// Remove the track at a 0-based index.
    pub fn remove_at(&mut self, index: usize) -> Option<TrackMetadata> {
        self.queue.remove(index)
    }

    /// Move a track between 0-based positions; the target is clamped to the queue bounds.
    pub fn move_track(&mut self, from: usize, to: usize) -> Option<TrackMetadata> {
        let track = self.queue.remove(from)?;
        let to = to.min(self.queue.len());
        self.queue.insert(to, track.clone());
        Some(track)
    }

    /// Drop everything before the 0-based `index` and return the new front.
    pub fn skip_to(&mut self, index: usize) -> Option<TrackMetadata> {
        if index >= self.queue.len() {
            return None;
        }
        self.queue.drain(..index);
        self.queue.front().cloned()
    }

    /// Shuffle while keeping tracks by the same artist apart where possible.
    pub fn smart_shuffle(&mut self) {
        if self.queue.len() < 2 {
            return;
        }

        let mut groups: HashMap<String, Vec<TrackMetadata>> = HashMap::new();
        for (i, track) in self.queue.drain(..).enumerate() {
            let key = track
                .artist
                .as_ref()
                .map(|a| a.to_lowercase())
                .filter(|a| !a.is_empty())
                .or_else(|| Some(extract_artist(&track.title)).filter(|a| !a.is_empty()))
                .unwrap_or_else(|| format!("\u{0}unknown{}", i));
            groups.entry(key).or_default().push(track);
        }

        let mut rng = rand::rng();
        let mut remaining: Vec<(String, VecDeque<TrackMetadata>)> = groups
            .into_iter()
            .map(|(key, mut tracks)| {
                tracks.shuffle(&mut rng);
                (key, VecDeque::from(tracks))
            })
            .collect();
        // Random tie-breaking between equally large groups.
        remaining.shuffle(&mut rng);

        let mut last_key: Option<String> = None;
        while !remaining.is_empty() {
            let pick = remaining
                .iter()
                .enumerate()
                .filter(|(_, (key, _))| Some(key) != last_key.as_ref())
                .max_by_key(|(i, (_, tracks))| (tracks.len(), std::cmp::Reverse(*i)))
                .or_else(|| {
                    remaining
                        .iter()
                        .enumerate()
                        .max_by_key(|(i, (_, tracks))| (tracks.len(), std::cmp::Reverse(*i)))
                })
                .map(|(i, _)| i);
            let Some(i) = pick else {
                break;
            };

            if let Some(track) = remaining[i].1.pop_front() {
                self.queue.push_back(track);
            }
            last_key = Some(remaining[i].0.clone());
            if remaining[i].1.is_empty() {
                remaining.remove(i);
            }
        }
    }

    /// True when the URL is already playing or queued.
    pub fn has_duplicate(&self, track: &TrackMetadata) -> bool {
        self.current.as_ref().is_some_and(|c| c.url == track.url)
            || self.queue.iter().any(|t| t.url == track.url)
    }

    /// Forget the whole session. Settings other than the loop mode are kept.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
        self.previous = None;
        self.settings.loop_mode = LoopMode::Off;
        self.radio_mode = false;
        self.radio_seed = None;
        self.radio_history.clear();
        self.skip_votes.clear();
        self.pending_requests.clear();
        self.clock.reset();
        self.undo_stack.clear();
    }

    pub fn snapshot(&mut self, description: impl Into<String>) {
        self.undo_stack
            .push((self.queue.iter().cloned().collect(), description.into()));
        if self.undo_stack.len() > MAX_UNDO {
            self.undo_stack.remove(0);
        }
    }

    /// Restore the latest snapshot and return its description.
    pub fn undo(&mut self) -> Option<String> {
        let (tracks, description) = self.undo_stack.pop()?;
        self.queue = tracks.into();
        Some(description)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    fn is_requester(track: &TrackMetadata, user_id: u64, user_name: &str) -> bool {
        match track.requester_id {
            Some(id) => id == user_id,
            None => track.requested_by.as_deref() == Some(user_name),
        }
    }

    /// Number of queued tracks requested by this user.
    pub fn count_for_user(&self, user_id: u64, user_name: &str) -> usize {
        self.queue
            .iter()
            .filter(|t| Self::is_requester(t, user_id, user_name))
            .count()
    }

    /// Queued tracks requested by this user with their 1-based positions.
    pub fn tracks_for_user(&self, user_id: u64, user_name: &str) -> Vec<(usize, &TrackMetadata)> {
        self.queue
            .iter()
            .enumerate()
            .filter(|(_, t)| Self::is_requester(t, user_id, user_name))
            .map(|(i, t)| (i + 1, t))
            .collect()
    }

    /// Whether this user may queue `adding` more tracks under the per-user limit.
    pub fn user_has_room(&self, user_id: u64, user_name: &str, adding: usize) -> bool {
        self.settings.max_per_user == 0
            || self.count_for_user(user_id, user_name) + adding <= self.settings.max_per_user
    }

    /// File a track for DJ approval. Returns the request id, or `None` when too many are waiting.
    pub fn submit_request(&mut self, track: TrackMetadata) -> Option<u64> {
        if self.pending_requests.len() >= MAX_PENDING_REQUESTS {
            return None;
        }
        self.next_request_id += 1;
        let id = self.next_request_id;
        self.pending_requests.push_back(PendingRequest { id, track });
        Some(id)
    }

    /// Take a pending request out of the waiting list. `None` once it has been handled.
    pub fn take_request(&mut self, id: u64) -> Option<PendingRequest> {
        let index = self.pending_requests.iter().position(|r| r.id == id)?;
        self.pending_requests.remove(index)
    }

    /// Position in seconds of the current track.
    pub fn elapsed_secs(&self) -> u64 {
        self.clock.elapsed_secs()
    }

    /// Total queued duration in seconds, ignoring unknown lengths.
    pub fn total_duration_secs(&self) -> i64 {
        self.queue.iter().map(TrackMetadata::duration_secs).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", title),
            ..Default::default()
        }
    }

    fn queue_of(titles: &[&str]) -> GuildQueue {
        let mut gq = GuildQueue::default();
        for t in titles {
            gq.add(track(t));
        }
        gq
    }

    fn titles(gq: &GuildQueue) -> Vec<String> {
        gq.queue.iter().map(|t| t.title.clone()).collect()
    }

    /// `add` reports 1-based positions and refuses once max_queue is reached.
    #[test]
    fn test_add_respects_max_queue() {
        let mut gq = GuildQueue::default();
        gq.settings.max_queue = 2;

        assert_eq!(gq.add(track("a")), Some(1));
        assert_eq!(gq.add(track("b")), Some(2));
        assert_eq!(gq.add(track("c")), None);
        assert_eq!(gq.len(), 2);
    }

    /// Loop off walks the queue and ends with no current track.
    #[test]
    fn test_next_track_loop_off() {
        let mut gq = queue_of(&["a", "b"]);

        assert_eq!(gq.next_track().map(|t| t.title), Some("a".into()));
        assert_eq!(gq.next_track().map(|t| t.title), Some("b".into()));
        assert_eq!(gq.previous.as_ref().map(|t| t.title.as_str()), Some("a"));
        assert_eq!(gq.next_track(), None);
        assert_eq!(gq.current, None);
    }

    /// Single loop repeats the current track without touching the queue.
    #[test]
    fn test_next_track_loop_single() {
        let mut gq = queue_of(&["a", "b"]);
        gq.next_track();
        gq.settings.loop_mode = LoopMode::Single;
        gq.skip_votes.insert(UserId::new(1));

        assert_eq!(gq.next_track().map(|t| t.title), Some("a".into()));
        assert_eq!(titles(&gq), vec!["b"]);
        assert!(gq.skip_votes.is_empty());
    }

    /// Queue loop recycles the finished track to the back.
    #[test]
    fn test_next_track_loop_queue() {
        let mut gq = queue_of(&["a", "b"]);
        gq.settings.loop_mode = LoopMode::Queue;
        gq.next_track();

        assert_eq!(gq.next_track().map(|t| t.title), Some("b".into()));
        assert_eq!(titles(&gq), vec!["a"]);
        assert_eq!(gq.next_track().map(|t| t.title), Some("a".into()));
    }

    #[test]
    fn test_remove_at() {
        let mut gq = queue_of(&["a", "b", "c"]);
        assert_eq!(gq.remove_at(1).map(|t| t.title), Some("b".into()));
        assert_eq!(gq.remove_at(5), None);
        assert_eq!(titles(&gq), vec!["a", "c"]);
    }

    /// The target index is clamped after the track has been taken out.
    #[test]
    fn test_move_track_clamps() {
        let mut gq = queue_of(&["a", "b", "c"]);

        assert_eq!(gq.move_track(0, 99).map(|t| t.title), Some("a".into()));
        assert_eq!(titles(&gq), vec!["b", "c", "a"]);
        assert_eq!(gq.move_track(2, 0).map(|t| t.title), Some("a".into()));
        assert_eq!(titles(&gq), vec!["a", "b", "c"]);
        assert_eq!(gq.move_track(3, 0), None);
    }

    #[test]
    fn test_skip_to() {
        let mut gq = queue_of(&["a", "b", "c", "d"]);
        assert_eq!(gq.skip_to(2).map(|t| t.title), Some("c".into()));
        assert_eq!(titles(&gq), vec!["c", "d"]);
        assert_eq!(gq.skip_to(2), None);
        assert_eq!(titles(&gq), vec!["c", "d"]);
    }

    #[test]
    fn test_extract_artist() {
        assert_eq!(extract_artist("Daft Punk - Around the World"), "daft punk");
        assert_eq!(extract_artist("Muse | Uprising"), "muse");
        assert_eq!(extract_artist("AC-DC Thunderstruck"), "");
    }

    /// Smart shuffle separates artists whenever the mix allows it.
    #[test]
    fn test_smart_shuffle_spreads_artists() {
        let mut gq = GuildQueue::default();
        for i in 0..3 {
            gq.add(track(&format!("Alpha - Song {}", i)));
            gq.add(track(&format!("Beta - Song {}", i)));
        }
        let mut lone = track("untitled jam");
        lone.artist = Some("Gamma".into());
        gq.add(lone);

        for _ in 0..20 {
            gq.smart_shuffle();
            let keys: Vec<String> = gq
                .queue
                .iter()
                .map(|t| t.artist.clone().unwrap_or_else(|| extract_artist(&t.title)))
                .map(|k| k.to_lowercase())
                .collect();
            assert_eq!(keys.len(), 7);
            assert!(keys.windows(2).all(|w| w[0] != w[1]), "adjacent artists in {:?}", keys);
        }
    }

    /// A single-artist queue is still fully preserved.
    #[test]
    fn test_smart_shuffle_single_artist() {
        let mut gq = queue_of(&["X - 1", "X - 2", "X - 3"]);
        gq.smart_shuffle();
        let mut got = titles(&gq);
        got.sort();
        assert_eq!(got, vec!["X - 1", "X - 2", "X - 3"]);
    }

    #[test]
    fn test_has_duplicate() {
        let mut gq = queue_of(&["a", "b"]);
        gq.next_track();
        assert!(gq.has_duplicate(&track("a")));
        assert!(gq.has_duplicate(&track("b")));
        assert!(!gq.has_duplicate(&track("c")));
    }

    /// Only the ten most recent snapshots survive.
    #[test]
    fn test_undo_cap() {
        let mut gq = GuildQueue::default();
        for i in 0..12 {
            gq.add(track(&i.to_string()));
            gq.snapshot(format!("step {}", i));
        }
        assert_eq!(gq.undo_depth(), MAX_UNDO);

        assert_eq!(gq.undo().as_deref(), Some("step 11"));
        assert_eq!(gq.len(), 12);
        for _ in 0..9 {
            gq.undo();
        }
        assert_eq!(gq.len(), 3);
        assert_eq!(gq.undo(), None);
    }

    /// Clearing resets session state but keeps the volume.
    #[test]
    fn test_clear() {
        let mut gq = queue_of(&["a", "b"]);
        gq.settings.volume = 0.8;
        gq.settings.loop_mode = LoopMode::Queue;
        gq.next_track();
        gq.radio_mode = true;
        gq.radio_history.insert("id");
        gq.submit_request(track("p"));
        gq.snapshot("x");

        gq.clear();

        assert!(gq.is_empty());
        assert_eq!(gq.current, None);
        assert_eq!(gq.settings.loop_mode, LoopMode::Off);
        assert!(!gq.radio_mode);
        assert!(gq.radio_history.is_empty());
        assert!(gq.pending_requests.is_empty());
        assert_eq!(gq.undo_depth(), 0);
        assert_eq!(gq.settings.volume, 0.8);
    }

    /// Requester matching uses the id, and the display name only for tracks without one.
    #[test]
    fn test_count_for_user() {
        let mut gq = GuildQueue::default();
        gq.add(track("a").requested("alice", 1));
        gq.add(track("b").requested("bob", 2));
        let mut legacy = track("c");
        legacy.requested_by = Some("alice".into());
        gq.add(legacy);
        gq.add(track("d").requested("alice", 3));

        assert_eq!(gq.count_for_user(1, "alice"), 2);
        assert_eq!(
            gq.tracks_for_user(1, "alice").iter().map(|(p, _)| *p).collect::<Vec<_>>(),
            vec![1, 3]
        );

        gq.settings.max_per_user = 2;
        assert!(!gq.user_has_room(1, "alice", 1));
        assert!(gq.user_has_room(2, "bob", 1));
    }

    /// Requests get distinct ids, can be taken once, and are capped.
    #[test]
    fn test_pending_requests() {
        let mut gq = GuildQueue::default();
        let first = gq.submit_request(track("a")).unwrap();
        let second = gq.submit_request(track("b")).unwrap();
        assert_ne!(first, second);

        assert_eq!(gq.take_request(first).map(|r| r.track.title), Some("a".into()));
        assert_eq!(gq.take_request(first), None);

        for i in 0..MAX_PENDING_REQUESTS - 1 {
            assert!(gq.submit_request(track(&i.to_string())).is_some());
        }
        assert_eq!(gq.submit_request(track("overflow")), None);
    }

    /// Radio history drops its older half once it passes the cap.
    #[test]
    fn test_radio_history_cap() {
        let mut history = RadioHistory::default();
        for i in 0..=MAX_RADIO_HISTORY {
            history.insert(i.to_string());
        }
        assert_eq!(history.len(), MAX_RADIO_HISTORY / 2);
        assert!(history.ids().contains(&MAX_RADIO_HISTORY.to_string()));
        assert!(!history.ids().contains("0"));
    }

    /// A clock started at a seek offset reports it immediately, scaled by speed.
    #[test]
    fn test_clock_seek_and_pause() {
        let mut clock = PlaybackClock::default();
        assert_eq!(clock.elapsed_secs(), 0);

        clock.start(90, 1.0);
        assert_eq!(clock.elapsed_secs(), 90);

        clock.start(60, 2.0);
        assert_eq!(clock.elapsed_secs(), 60);

        clock.pause();
        let paused = clock.elapsed_secs();
        clock.resume();
        assert!(clock.elapsed_secs() >= paused);
        assert!(clock.is_running());

        clock.reset();
        assert!(!clock.is_running());
    }
}
