//! # Application State
//!
//! Core business state for LiveChat. This module contains domain logic only -
//! no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── identity: Arc<dyn IdentityProvider>  // who the user is
//! ├── store: Arc<dyn MessageStore>         // where messages live
//! ├── window_size: usize                   // newest-N window
//! ├── gate: Gate                           // Loading | Unauthenticated | Authenticated
//! │   └── Authenticated(ChatRoom)
//! │       ├── identity: UserIdentity
//! │       ├── feed: Feed                   // Waiting | Live | Degraded
//! │       ├── subscription: Option<SubscriptionHandle>
//! │       └── generation: u64              // which live query owns the feed
//! ├── send: SendStatus                     // Idle | Pending | Succeeded | Failed
//! └── status_message: String               // status bar text
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.
//! The live query handle lives inside `Gate::Authenticated`, so replacing the
//! gate drops (and cancels) it on every transition.

use std::sync::Arc;

use crate::backend::{
    IdentityProvider, Message, MessageStore, SignInPrompt, SubscriptionHandle, UserIdentity,
};

/// What the window currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Feed {
    /// Live query attached, no snapshot yet
    #[default]
    Waiting,
    Live(Vec<Message>),
    /// The live query failed. `last` is the last good window, kept on screen
    /// under an error banner so "no messages" is never implied.
    Degraded { last: Vec<Message>, error: String },
}

impl Feed {
    pub fn messages(&self) -> &[Message] {
        match self {
            Feed::Waiting => &[],
            Feed::Live(messages) => messages,
            Feed::Degraded { last, .. } => last,
        }
    }
}

/// The signed-in view and the live query feeding it.
#[derive(Debug)]
pub struct ChatRoom {
    pub identity: UserIdentity,
    pub feed: Feed,
    pub subscription: Option<SubscriptionHandle>,
    pub generation: u64,
}

/// The signed-out view.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignInState {
    pub signing_in: bool,
    /// Device code instructions while a sign-in is waiting for approval
    pub prompt: Option<SignInPrompt>,
    /// Informational note (e.g. the last attempt was cancelled)
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Session gate: which root view is shown.
#[derive(Debug)]
pub enum Gate {
    /// First session emission not resolved yet
    Loading,
    Unauthenticated(SignInState),
    Authenticated(ChatRoom),
}

impl Gate {
    pub fn room(&self) -> Option<&ChatRoom> {
        match self {
            Gate::Authenticated(room) => Some(room),
            _ => None,
        }
    }

    pub fn room_mut(&mut self) -> Option<&mut ChatRoom> {
        match self {
            Gate::Authenticated(room) => Some(room),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Gate::Authenticated(_))
    }
}

/// Outcome of the most recent append.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SendStatus {
    #[default]
    Idle,
    Pending { text: String },
    Succeeded,
    Failed { text: String, error: String },
}

pub struct App {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn MessageStore>,
    pub window_size: usize,
    pub gate: Gate,
    pub send: SendStatus,
    pub status_message: String,
    /// Bumped for every live query so late snapshots from a cancelled one are ignored.
    pub(crate) next_generation: u64,
}

impl App {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn MessageStore>,
        window_size: usize,
    ) -> Self {
        Self {
            identity,
            store,
            window_size,
            gate: Gate::Loading,
            send: SendStatus::Idle,
            status_message: String::from("Welcome to LiveChat!"),
            next_generation: 0,
        }
    }

    /// Name shown in the title bar, e.g. `firebase/firestore`.
    pub fn backend_label(&self) -> String {
        format!("{}/{}", self.identity.name(), self.store.name())
    }

    /// Messages currently in the window (empty outside a chat room).
    pub fn window(&self) -> &[Message] {
        self.gate
            .room()
            .map(|room| room.feed.messages())
            .unwrap_or_default()
    }
}
