//! # Actions
//!
//! Everything that can happen in LiveChat becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! The platform pushes a new window? That's `Action::SnapshotReceived`.
//!
//! The `update()` function applies an action to the state and returns the
//! `Effect` the adapter has to carry out (start a sign-in, open a live query,
//! send an append). No I/O happens here.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```
//!
//! ## Session gate transitions
//!
//! ```text
//!            SessionChanged(SignedIn) / SignInFinished(Ok)
//! Loading ──────────────────────────────────────────────▶ Authenticated
//!    │                                                      │    ▲
//!    │ SessionChanged(SignedOut)      SessionChanged(       │    │
//!    ▼                                SignedOut) / Quit     ▼    │
//! Unauthenticated ◀──────────────────────────────────────────    │
//!    └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Leaving `Authenticated` by any edge drops the `ChatRoom`, and with it the
//! live query handle.

use log::{debug, info, warn};

use crate::backend::{
    AuthError, DraftMessage, SessionState, SignInPrompt, Snapshot, StoreError,
    SubscriptionHandle, UserIdentity,
};
use crate::core::state::{App, ChatRoom, Feed, Gate, SendStatus, SignInState};

#[derive(Debug)]
pub enum Action {
    /// The identity provider published a new session snapshot.
    SessionChanged(SessionState),
    SignInRequested,
    SignInPrompted(SignInPrompt),
    SignInFinished(Result<UserIdentity, AuthError>),
    SignOutRequested,
    SignOutFinished(Result<(), AuthError>),
    /// The live query requested by `Effect::OpenSubscription` is attached.
    SubscriptionOpened {
        generation: u64,
        handle: SubscriptionHandle,
    },
    SnapshotReceived {
        generation: u64,
        snapshot: Snapshot,
    },
    /// The composer submitted its draft.
    Submit(String),
    SendFinished(Result<(), StoreError>),
    Quit,
}

/// Side effects requested by `update()`, executed by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Quit,
    StartSignIn,
    StartSignOut,
    /// Attach a live query for the chat room with this generation.
    OpenSubscription { generation: u64 },
    Append(DraftMessage),
    /// Put text that was never persisted back into the composer.
    RestoreDraft(String),
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::SessionChanged(session) => on_session(app, session),

        Action::SignInRequested => match &mut app.gate {
            Gate::Unauthenticated(sign_in) if !sign_in.signing_in => {
                sign_in.signing_in = true;
                sign_in.prompt = None;
                sign_in.notice = None;
                sign_in.error = None;
                app.status_message = "Signing in…".to_string();
                Effect::StartSignIn
            }
            _ => Effect::None,
        },

        Action::SignInPrompted(prompt) => {
            if let Gate::Unauthenticated(sign_in) = &mut app.gate
                && sign_in.signing_in
            {
                sign_in.prompt = Some(prompt);
            }
            Effect::None
        }

        Action::SignInFinished(Ok(identity)) => enter_chat(app, identity),

        Action::SignInFinished(Err(error)) => {
            if let Gate::Unauthenticated(sign_in) = &mut app.gate {
                sign_in.signing_in = false;
                sign_in.prompt = None;
                match &error {
                    AuthError::Cancelled => {
                        sign_in.notice = Some("Sign-in cancelled.".to_string());
                    }
                    AuthError::Provider(_) => {
                        sign_in.error = Some(error.to_string());
                    }
                }
            }
            info!("Sign-in did not complete: {}", error);
            app.status_message = String::new();
            Effect::None
        }

        Action::SignOutRequested => {
            if app.gate.is_authenticated() {
                app.status_message = "Signing out…".to_string();
                Effect::StartSignOut
            } else {
                Effect::None
            }
        }

        Action::SignOutFinished(Ok(())) => leave_chat(app),

        Action::SignOutFinished(Err(error)) => {
            warn!("Sign-out failed: {}", error);
            app.status_message = format!("Sign-out failed: {error}");
            Effect::None
        }

        Action::SubscriptionOpened { generation, handle } => {
            match app.gate.room_mut() {
                Some(room) if room.generation == generation => {
                    room.subscription = Some(handle);
                }
                _ => {
                    // The room it was opened for is gone
                    debug!("Dropping stale live query (generation {generation})");
                    handle.cancel();
                }
            }
            Effect::None
        }

        Action::SnapshotReceived {
            generation,
            snapshot,
        } => {
            let Some(room) = app.gate.room_mut().filter(|r| r.generation == generation) else {
                debug!("Ignoring snapshot from stale live query (generation {generation})");
                return Effect::None;
            };
            room.feed = match snapshot {
                Ok(window) => {
                    debug!("Window updated: {} messages", window.len());
                    Feed::Live(window)
                }
                Err(error) => {
                    warn!("Live query error: {}", error);
                    let last = std::mem::take(&mut room.feed).messages().to_vec();
                    Feed::Degraded {
                        last,
                        error: error.to_string(),
                    }
                }
            };
            Effect::None
        }

        Action::Submit(text) => {
            let Some(room) = app.gate.room() else {
                return Effect::None;
            };
            if text.trim().is_empty() {
                return Effect::None;
            }
            if let SendStatus::Pending { .. } = app.send {
                app.status_message = "Still sending the previous message".to_string();
                return Effect::RestoreDraft(text);
            }
            let draft = DraftMessage::new(text.clone(), room.identity.clone());
            app.send = SendStatus::Pending { text };
            Effect::Append(draft)
        }

        Action::SendFinished(Ok(())) => {
            app.send = SendStatus::Succeeded;
            Effect::None
        }

        Action::SendFinished(Err(error)) => {
            warn!("Append failed: {}", error);
            let text = match std::mem::take(&mut app.send) {
                SendStatus::Pending { text } => text,
                other => {
                    app.send = other;
                    return Effect::None;
                }
            };
            app.send = SendStatus::Failed {
                text: text.clone(),
                error: error.to_string(),
            };
            Effect::RestoreDraft(text)
        }

        Action::Quit => {
            if let Some(handle) = app.gate.room_mut().and_then(|r| r.subscription.take()) {
                handle.cancel();
            }
            Effect::Quit
        }
    }
}

fn on_session(app: &mut App, session: SessionState) -> Effect {
    match session {
        SessionState::Loading => {
            app.gate = Gate::Loading;
            Effect::None
        }
        SessionState::SignedOut => leave_chat(app),
        SessionState::SignedIn(identity) => enter_chat(app, identity),
    }
}

/// Moves to `Authenticated` unless already there for the same user.
fn enter_chat(app: &mut App, identity: UserIdentity) -> Effect {
    if let Some(room) = app.gate.room()
        && room.identity.id == identity.id
    {
        return Effect::None;
    }

    app.next_generation += 1;
    let generation = app.next_generation;
    info!(
        "Entering chat as {} (generation {generation})",
        identity.display_name
    );
    app.status_message = format!("Signed in as {}", identity.display_name);
    // An append still in flight keeps its text so a late failure can restore it
    if !matches!(app.send, SendStatus::Pending { .. }) {
        app.send = SendStatus::Idle;
    }
    // Replacing the gate drops any previous room and its live query
    app.gate = Gate::Authenticated(ChatRoom {
        identity,
        feed: Feed::Waiting,
        subscription: None,
        generation,
    });
    Effect::OpenSubscription { generation }
}

/// Moves to `Unauthenticated`, keeping an existing sign-in view as it is.
fn leave_chat(app: &mut App) -> Effect {
    if matches!(app.gate, Gate::Unauthenticated(_)) {
        return Effect::None;
    }
    if let Gate::Authenticated(room) = &mut app.gate {
        info!("Leaving chat (generation {})", room.generation);
        if let Some(handle) = room.subscription.take() {
            handle.cancel();
        }
        app.status_message = "Signed out".to_string();
    }
    app.gate = Gate::Unauthenticated(SignInState::default());
    Effect::None
}
