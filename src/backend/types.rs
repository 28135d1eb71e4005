use std::cmp::Ordering;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Number of messages kept in the live window.
pub const WINDOW_SIZE: usize = 25;

/// The signed-in user as reported by the identity provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Session snapshot emitted by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Cached credentials have not been resolved yet.
    #[default]
    Loading,
    SignedOut,
    SignedIn(UserIdentity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Creation time of a message.
///
/// `Pending` is a write the store has not stamped yet. It sorts after every
/// assigned timestamp since the store always stamps with the commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedAt {
    Pending,
    At(DateTime<Utc>),
}

impl CreatedAt {
    pub fn is_pending(&self) -> bool {
        matches!(self, CreatedAt::Pending)
    }

    /// Local wall-clock rendering used by the message list.
    pub fn display(&self) -> String {
        match self {
            CreatedAt::Pending => "sending…".to_string(),
            CreatedAt::At(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl Ord for CreatedAt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CreatedAt::At(a), CreatedAt::At(b)) => a.cmp(b),
            (CreatedAt::At(_), CreatedAt::Pending) => Ordering::Less,
            (CreatedAt::Pending, CreatedAt::At(_)) => Ordering::Greater,
            (CreatedAt::Pending, CreatedAt::Pending) => Ordering::Equal,
        }
    }
}

impl PartialOrd for CreatedAt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A message document as observed through a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Document id assigned by the store.
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_display_name: String,
    pub author_avatar_url: Option<String>,
    pub created_at: CreatedAt,
}

/// Payload for an append. The creation timestamp is always assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftMessage {
    pub text: String,
    pub author: UserIdentity,
}

impl DraftMessage {
    pub fn new(text: impl Into<String>, author: UserIdentity) -> Self {
        Self {
            text: text.into(),
            author,
        }
    }
}

/// Reduces a newest-first or unordered result set to the ascending window.
///
/// Stable sort keeps the store's own order for equal timestamps.
pub fn window_of(mut messages: Vec<Message>, limit: usize) -> Vec<Message> {
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let excess = messages.len().saturating_sub(limit);
    messages.drain(..excess);
    messages
}
