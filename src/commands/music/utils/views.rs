//! Component state that cannot fit in a `custom_id`, keyed by the message carrying the buttons.

use dashmap::DashMap;
use serenity::model::id::{GuildId, MessageId, UserId};
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::commands::music::audio_sources::track_metadata::TrackMetadata;

pub const SEARCH_TTL: Duration = Duration::from_secs(60);
pub const MIX_TTL: Duration = Duration::from_secs(30);
pub const VOTE_SKIP_TTL: Duration = Duration::from_secs(60);
pub const RATE_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq)]
pub enum PendingView {
    /// Results offered by one of the search commands.
    Search { results: Vec<TrackMetadata> },
    /// A YouTube Mix link waiting for the user's choice.
    Mix { url: String },
    VoteSkip {
        guild_id: GuildId,
        required: usize,
        voters: HashSet<UserId>,
    },
    Rate {
        guild_id: GuildId,
        url: String,
        title: String,
    },
}

#[derive(Debug)]
struct Entry {
    view: PendingView,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: DashMap<MessageId, Entry>,
}

impl ViewRegistry {
    pub fn insert(&self, message_id: MessageId, view: PendingView, ttl: Duration) {
        self.views.insert(
            message_id,
            Entry {
                view,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Run `f` against a live view. Expired views are dropped and yield `None`.
    pub fn with_view_mut<R>(&self, message_id: MessageId, f: impl FnOnce(&mut PendingView) -> R) -> Option<R> {
        {
            let mut entry = self.views.get_mut(&message_id)?;
            if entry.expires_at > Instant::now() {
                return Some(f(&mut entry.view));
            }
        }
        self.views.remove(&message_id);
        None
    }

    /// A copy of a live view.
    pub fn get(&self, message_id: MessageId) -> Option<PendingView> {
        self.with_view_mut(message_id, |view| view.clone())
    }

    /// Remove a view regardless of expiry; used when it completes or times out.
    pub fn remove(&self, message_id: MessageId) -> Option<PendingView> {
        self.views.remove(&message_id).map(|(_, entry)| entry.view)
    }

    /// Drop every expired view and return the ids of their messages.
    pub fn purge_expired(&self) -> Vec<MessageId> {
        let now = Instant::now();
        let expired: Vec<MessageId> = self
            .views
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| *entry.key())
            .collect();
        for id in &expired {
            self.views.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn vote(required: usize) -> PendingView {
        PendingView::VoteSkip {
            guild_id: GuildId::new(1),
            required,
            voters: HashSet::new(),
        }
    }

    /// Votes recorded through `with_view_mut` are visible to later reads.
    #[test]
    fn test_mutation_persists() {
        let registry = ViewRegistry::default();
        let msg = MessageId::new(10);
        registry.insert(msg, vote(2), VOTE_SKIP_TTL);

        let count = registry.with_view_mut(msg, |view| match view {
            PendingView::VoteSkip { voters, .. } => {
                voters.insert(UserId::new(5));
                voters.insert(UserId::new(5));
                voters.len()
            }
            _ => 0,
        });

        assert_eq!(count, Some(1));
        assert_matches!(registry.get(msg), Some(PendingView::VoteSkip { voters, .. }) if voters.len() == 1);
    }

    /// An expired view behaves as if it never existed and is removed on access.
    #[test]
    fn test_expired_view_is_gone() {
        let registry = ViewRegistry::default();
        let msg = MessageId::new(11);
        registry.insert(msg, vote(1), Duration::ZERO);

        assert_eq!(registry.get(msg), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_purge_expired_keeps_live_views() {
        let registry = ViewRegistry::default();
        registry.insert(MessageId::new(1), vote(1), Duration::ZERO);
        registry.insert(
            MessageId::new(2),
            PendingView::Mix {
                url: "https://www.youtube.com/watch?v=a&list=RDa".into(),
            },
            MIX_TTL,
        );

        assert_eq!(registry.purge_expired(), vec![MessageId::new(1)]);
        assert_eq!(registry.len(), 1);
        assert_matches!(registry.remove(MessageId::new(2)), Some(PendingView::Mix { .. }));
    }
}
