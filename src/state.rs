//! Per-user conversation state
//!
//! Each user is either `Idle` or `AwaitingLink`. Only awaiting users have an
//! entry; absence means idle. Updates for one user go through that user's map
//! shard entry, so racing events for the same user are serialized while
//! different users do not wait on each other.

use crate::link::is_candidate_link;
use crate::types::UserId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Conversation state of one user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserState {
    /// No pending request
    Idle,
    /// The next text from this user is read as a link
    AwaitingLink,
}

/// What to do with a free-text message, decided atomically for its sender
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextDecision {
    /// The user was awaiting a link and sent one; state is now idle
    Preview(String),
    /// The user was awaiting a link but the text is not one; still awaiting
    ResendLink,
    /// The user was not awaiting a link
    NotAwaiting,
}

/// Process-wide map from user to "awaiting a link next"
#[derive(Debug, Default)]
pub struct ConversationState {
    awaiting: DashMap<UserId, bool>,
}

impl ConversationState {
    /// Create an empty store (every user idle)
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `user`
    pub fn get(&self, user: UserId) -> UserState {
        match self.awaiting.get(&user).map(|flag| *flag) {
            Some(true) => UserState::AwaitingLink,
            _ => UserState::Idle,
        }
    }

    /// The start-download control was pressed
    pub fn begin_awaiting(&self, user: UserId) {
        self.awaiting.insert(user, true);
    }

    /// Help or an unrelated command: back to idle
    pub fn reset(&self, user: UserId) {
        self.awaiting.remove(&user);
    }

    /// Classify `text` from `user` and apply the transition in one step
    pub fn on_text(&self, user: UserId, text: &str) -> TextDecision {
        match self.awaiting.entry(user) {
            Entry::Occupied(entry) if *entry.get() => {
                if is_candidate_link(text) {
                    entry.remove();
                    TextDecision::Preview(text.trim().to_string())
                } else {
                    TextDecision::ResendLink
                }
            }
            Entry::Occupied(entry) => {
                entry.remove();
                TextDecision::NotAwaiting
            }
            Entry::Vacant(_) => TextDecision::NotAwaiting,
        }
    }

    /// Number of users currently awaiting a link
    pub fn awaiting_count(&self) -> usize {
        self.awaiting.iter().filter(|entry| *entry.value()).count()
    }
}
