use serenity::all::{
    ButtonStyle, CreateActionRow, CreateButton, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, ReactionType,
};

use super::format_duration;
use crate::commands::music::audio_sources::track_metadata::TrackMetadata;

/// Number of clickable segments in the player's seek bar.
pub const SEEK_SEGMENTS: u64 = 5;
/// Discord rejects button labels longer than this.
const MAX_LABEL: usize = 80;

/// Every component action the bot understands, decoded from a `music_` custom id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentAction {
    Previous,
    Rewind,
    PauseResume,
    Forward,
    Next,
    VolumeDown,
    VolumeUp,
    Seek(u64),
    QueuePage(usize),
    SearchPick(usize),
    MixVideo,
    MixAll,
    VoteSkip,
    RateUp,
    RateDown,
    DjApprove(u64),
    DjReject(u64),
    Help,
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        let id = custom_id.strip_prefix("music_")?;
        let (name, arg) = match id.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (id, None),
        };

        let action = match (name, arg) {
            ("prev", None) => Self::Previous,
            ("rewind", None) => Self::Rewind,
            ("pause_resume", None) => Self::PauseResume,
            ("forward", None) => Self::Forward,
            ("next", None) => Self::Next,
            ("vol_down", None) => Self::VolumeDown,
            ("vol_up", None) => Self::VolumeUp,
            ("seek", Some(secs)) => Self::Seek(secs.parse().ok()?),
            ("queue_page", Some(page)) => Self::QueuePage(page.parse().ok()?),
            ("search_pick", Some(index)) => Self::SearchPick(index.parse().ok()?),
            ("mix_video", None) => Self::MixVideo,
            ("mix_all", None) => Self::MixAll,
            ("voteskip", None) => Self::VoteSkip,
            ("rate_up", None) => Self::RateUp,
            ("rate_down", None) => Self::RateDown,
            ("dj_approve", Some(id)) => Self::DjApprove(id.parse().ok()?),
            ("dj_reject", Some(id)) => Self::DjReject(id.parse().ok()?),
            ("help", None) => Self::Help,
            _ => return None,
        };
        Some(action)
    }
}

fn icon_button(custom_id: impl Into<String>, emoji: &str) -> CreateButton {
    CreateButton::new(custom_id)
        .emoji(ReactionType::Unicode(emoji.to_string()))
        .style(ButtonStyle::Secondary)
}

fn truncate_label(label: String) -> String {
    if label.chars().count() <= MAX_LABEL {
        return label;
    }
    let cut: String = label.chars().take(MAX_LABEL - 3).collect();
    format!("{}...", cut)
}

/// One seek-bar segment: where it starts and whether playback is currently inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekSegment {
    pub start: u64,
    pub current: bool,
}

/// Split a track into equal segments; the last segment also catches any overrun.
pub fn seek_segments(duration: u64, elapsed: u64) -> Vec<SeekSegment> {
    if duration == 0 {
        return Vec::new();
    }
    (0..SEEK_SEGMENTS)
        .map(|i| {
            let start = duration * i / SEEK_SEGMENTS;
            let end = duration * (i + 1) / SEEK_SEGMENTS;
            let current = (start <= elapsed && elapsed < end) || (i == SEEK_SEGMENTS - 1 && elapsed >= start);
            SeekSegment { start, current }
        })
        .collect()
}

/// The interactive player: transport row, clickable seek bar (when the duration is known), volume row.
pub fn player_buttons(paused: bool, duration: u64, elapsed: u64) -> Vec<CreateActionRow> {
    let pause_resume = CreateButton::new("music_pause_resume")
        .emoji(ReactionType::Unicode(if paused { "▶" } else { "⏸" }.to_string()))
        .style(if paused {
            ButtonStyle::Success
        } else {
            ButtonStyle::Secondary
        });

    let mut rows = vec![CreateActionRow::Buttons(vec![
        icon_button("music_prev", "⏮"),
        icon_button("music_rewind", "⏪"),
        pause_resume,
        icon_button("music_forward", "⏩"),
        icon_button("music_next", "⏭"),
    ])];

    let segments = seek_segments(duration, elapsed);
    if !segments.is_empty() {
        let buttons = segments
            .into_iter()
            .map(|segment| {
                let (label, style) = if segment.current {
                    (format!("🔘 {}", format_duration(elapsed as i64)), ButtonStyle::Primary)
                } else {
                    (format!("▬ {}", format_duration(segment.start as i64)), ButtonStyle::Secondary)
                };
                CreateButton::new(format!("music_seek:{}", segment.start))
                    .label(label)
                    .style(style)
            })
            .collect();
        rows.push(CreateActionRow::Buttons(buttons));
    }

    rows.push(CreateActionRow::Buttons(vec![
        icon_button("music_vol_down", "🔉"),
        icon_button("music_vol_up", "🔊"),
    ]));
    rows
}

/// ◀ ▶ page buttons for `/queue`; each carries the page it leads to.
pub fn queue_page_buttons(page: usize, total_pages: usize) -> Vec<CreateActionRow> {
    let prev = icon_button(format!("music_queue_page:{}", page.saturating_sub(1)), "◀").disabled(page == 0);
    let next = icon_button(format!("music_queue_page:{}", page + 1), "▶").disabled(page + 1 >= total_pages);
    vec![CreateActionRow::Buttons(vec![prev, next])]
}

/// Numbered pick buttons for search results, five per row.
pub fn search_buttons(results: &[TrackMetadata], disabled: bool) -> Vec<CreateActionRow> {
    let buttons: Vec<CreateButton> = results
        .iter()
        .enumerate()
        .map(|(i, track)| {
            CreateButton::new(format!("music_search_pick:{}", i))
                .label(truncate_label(format!("{}. {}", i + 1, track.title)))
                .style(ButtonStyle::Primary)
                .disabled(disabled)
        })
        .collect();
    buttons
        .chunks(5)
        .map(|chunk| CreateActionRow::Buttons(chunk.to_vec()))
        .collect()
}

pub fn mix_buttons(disabled: bool) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new("music_mix_video")
            .label("Play just this video")
            .style(ButtonStyle::Primary)
            .disabled(disabled),
        CreateButton::new("music_mix_all")
            .label("Load the mix anyway")
            .style(ButtonStyle::Secondary)
            .disabled(disabled),
    ])]
}

pub fn vote_skip_buttons(votes: usize, required: usize, disabled: bool) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new("music_voteskip")
            .label(format!("Skip ({}/{})", votes, required))
            .style(ButtonStyle::Danger)
            .disabled(disabled),
    ])]
}

pub fn rate_buttons(up: u64, down: u64) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new("music_rate_up")
            .label(format!("👍 {}", up))
            .style(ButtonStyle::Success),
        CreateButton::new("music_rate_down")
            .label(format!("👎 {}", down))
            .style(ButtonStyle::Danger),
    ])]
}

pub fn dj_approval_buttons(request_id: u64, disabled: bool) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(format!("music_dj_approve:{}", request_id))
            .label("Approve")
            .style(ButtonStyle::Success)
            .disabled(disabled),
        CreateButton::new(format!("music_dj_reject:{}", request_id))
            .label("Reject")
            .style(ButtonStyle::Danger)
            .disabled(disabled),
    ])]
}

/// Category picker for `/help`.
pub fn help_select(categories: &[(&str, &str, usize)]) -> Vec<CreateActionRow> {
    let options = categories
        .iter()
        .map(|(label, id, count)| {
            CreateSelectMenuOption::new(*label, *id).description(format!("{} commands", count))
        })
        .collect();
    vec![CreateActionRow::SelectMenu(
        CreateSelectMenu::new("music_help", CreateSelectMenuKind::String { options })
            .placeholder("Browse a category…"),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("music_prev", Some(ComponentAction::Previous))]
    #[case("music_pause_resume", Some(ComponentAction::PauseResume))]
    #[case("music_vol_up", Some(ComponentAction::VolumeUp))]
    #[case("music_seek:120", Some(ComponentAction::Seek(120)))]
    #[case("music_queue_page:3", Some(ComponentAction::QueuePage(3)))]
    #[case("music_search_pick:4", Some(ComponentAction::SearchPick(4)))]
    #[case("music_dj_approve:17", Some(ComponentAction::DjApprove(17)))]
    #[case("music_dj_reject:2", Some(ComponentAction::DjReject(2)))]
    #[case("music_help", Some(ComponentAction::Help))]
    #[case("music_seek:abc", None)]
    #[case("music_seek", None)]
    #[case("music_prev:1", None)]
    #[case("other_prev", None)]
    #[case("music_unknown", None)]
    fn test_parse_action(#[case] custom_id: &str, #[case] expected: Option<ComponentAction>) {
        assert_eq!(ComponentAction::parse(custom_id), expected);
    }

    /// Exactly one segment is marked current, and the final one absorbs overrun.
    #[test]
    fn test_seek_segments() {
        let segments = seek_segments(100, 45);
        assert_eq!(
            segments.iter().map(|s| s.start).collect::<Vec<_>>(),
            vec![0, 20, 40, 60, 80]
        );
        assert_eq!(segments.iter().filter(|s| s.current).count(), 1);
        assert!(segments[2].current);

        let overrun = seek_segments(100, 250);
        assert!(overrun[4].current);
        assert!(seek_segments(0, 10).is_empty());
    }

    #[test]
    fn test_truncate_label() {
        let long = "x".repeat(120);
        let label = truncate_label(long);
        assert_eq!(label.chars().count(), MAX_LABEL);
        assert!(label.ends_with("..."));
        assert_eq!(truncate_label("1. Short".into()), "1. Short");
    }

    /// The player has a seek row only when the duration is known.
    #[test]
    fn test_player_rows() {
        assert_eq!(player_buttons(false, 200, 10).len(), 3);
        assert_eq!(player_buttons(true, 0, 10).len(), 2);
    }
}
