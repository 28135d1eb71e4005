//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! translates keyboard events into `core::Action` values and carries out the
//! `Effect`s the reducer asks for.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Background work
//!
//! Every backend call runs as a tokio task and reports back by sending an
//! `Action` over a `std::sync::mpsc` channel:
//!
//! ```text
//!  session watch ──SessionChanged──────┐
//!  sign-in task ───SignInPrompted/─────┤
//!                  SignInFinished      │
//!  sign-out task ──SignOutFinished─────┼──▶ event loop ──▶ update() ──▶ Effect
//!  live query ─────SnapshotReceived────┤
//!  append task ────SendFinished────────┘
//! ```
//!
//! The loop never talks to the store itself; it drains the channel and
//! terminal events, then redraws.
//!
//! ## Redraw Strategy
//!
//! The loop only redraws after a terminal event or an action. It polls the
//! terminal with a short timeout so actions from background tasks are picked
//! up promptly.

mod component;
mod components;
mod event;
mod ui;

use log::{debug, error, info, warn};
use std::io::stdout;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;

use crate::backend::firebase::{FirebaseIdentity, FirestoreStore};
use crate::backend::{
    DraftMessage, IdentityProvider, LocalIdentity, LocalPlatform, MessageStore, UserIdentity,
};
use crate::core::action::{Action, Effect, update};
use crate::core::config::{ConfigError, ResolvedConfig};
use crate::core::state::{App, Gate};
use crate::tui::component::EventHandler;
use crate::tui::components::{InputBox, InputEvent, MessageListState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// How long the loop waits for terminal input before draining background actions.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    pub message_list: MessageListState,
    pub input_box: InputBox,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            message_list: MessageListState::new(),
            input_box: InputBox::new(),
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Kitty keyboard protocol is enabled unconditionally; terminals without
        // support ignore it
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide
        );
    }
}

/// The identity provider and message store the app runs against.
pub struct Backends {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn MessageStore>,
}

/// Build the backends named by the resolved config.
///
/// Must be called inside a tokio runtime: the Firebase provider starts
/// restoring the cached session right away.
pub fn build_backends(config: &ResolvedConfig) -> Result<Backends, ConfigError> {
    match config.backend.as_str() {
        "local" => {
            let identity = UserIdentity {
                id: config.local_user_id.clone(),
                display_name: config.local_display_name.clone(),
                avatar_url: None,
            };
            info!("Using local backend as {}", identity.display_name);
            Ok(Backends {
                identity: Arc::new(LocalIdentity::new(identity)),
                store: Arc::new(LocalPlatform::new().store()),
            })
        }
        other => {
            if other != "firebase" {
                warn!("Unknown backend '{}', using firebase", other);
            }
            let settings = config.firebase_settings()?;
            info!("Using firebase backend (project {})", settings.project_id);
            // One instance is both the session source and the token source for Firestore
            let identity = Arc::new(FirebaseIdentity::new(settings.clone()));
            let store = FirestoreStore::new(settings, identity.clone());

            let restoring = identity.clone();
            tokio::spawn(async move {
                restoring.restore_session().await;
            });

            Ok(Backends {
                identity,
                store: Arc::new(store),
            })
        }
    }
}

pub fn run(mut app: App) -> std::io::Result<()> {
    let mut tui = TuiState::new();

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();

    let session_watch = spawn_session_watch(app.identity.clone(), tx.clone());

    let mut needs_redraw = true; // Force first frame
    let mut should_quit = false;

    while !should_quit {
        if needs_redraw {
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui))?;
            needs_redraw = false;
        }

        let first_event = poll_event_timeout(POLL_TIMEOUT);
        if first_event.is_some() {
            needs_redraw = true;
        }

        // Process first event + drain ALL pending events before next draw
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if let Some(action) = route_event(&app, &mut tui, &event)
                && dispatch(&mut app, &mut tui, action, &tx)
            {
                should_quit = true;
                break;
            }
        }

        if should_quit {
            break;
        }

        // Handle background task actions
        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            if dispatch(&mut app, &mut tui, action, &tx) {
                should_quit = true;
                break;
            }
        }
    }

    session_watch.abort();
    info!("Shutting down");
    ratatui::restore();
    Ok(())
}

/// Map a terminal event to a core action. Events that only touch
/// presentation state are handled here and yield `None`.
fn route_event(app: &App, tui: &mut TuiState, event: &TuiEvent) -> Option<Action> {
    match event {
        TuiEvent::Resize => None,
        TuiEvent::Quit => Some(Action::Quit),
        TuiEvent::SignOut => Some(Action::SignOutRequested),
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown
        | TuiEvent::ScrollToBottom => {
            tui.message_list.handle_event(event);
            None
        }
        _ => match &app.gate {
            Gate::Loading => None,
            // Enter is the sign-in control
            Gate::Unauthenticated(_) => {
                matches!(event, TuiEvent::Submit).then_some(Action::SignInRequested)
            }
            Gate::Authenticated(_) => match tui.input_box.handle_event(event)? {
                InputEvent::Submit(text) => Some(Action::Submit(text)),
                InputEvent::ContentChanged => None,
            },
        },
    }
}

/// Apply an action and carry out the resulting effect.
/// Returns `true` when the app should exit.
fn dispatch(app: &mut App, tui: &mut TuiState, action: Action, tx: &mpsc::Sender<Action>) -> bool {
    let was_in_chat = app.gate.is_authenticated();
    let effect = update(app, action);

    if was_in_chat && !app.gate.is_authenticated() {
        // Drafts and scroll position belong to the session that just ended
        tui.input_box.clear();
        tui.message_list = MessageListState::new();
    }

    match effect {
        Effect::None => {}
        Effect::Quit => return true,
        Effect::StartSignIn => spawn_sign_in(app.identity.clone(), tx.clone()),
        Effect::StartSignOut => spawn_sign_out(app.identity.clone(), tx.clone()),
        Effect::OpenSubscription { generation } => {
            tui.message_list = MessageListState::new();
            open_subscription(app, generation, tx.clone());
        }
        Effect::Append(draft) => spawn_append(app.store.clone(), draft, tx.clone()),
        Effect::RestoreDraft(text) => tui.input_box.restore_draft(&text),
    }
    false
}

/// Forward every session snapshot (starting with the current one) for the
/// lifetime of the process.
fn spawn_session_watch(
    identity: Arc<dyn IdentityProvider>,
    tx: mpsc::Sender<Action>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut session = identity.observe_session();
        loop {
            let state = session.borrow_and_update().clone();
            debug!("Session changed: {:?}", state);
            if tx.send(Action::SessionChanged(state)).is_err() {
                return;
            }
            if session.changed().await.is_err() {
                warn!("Session stream closed");
                return;
            }
        }
    })
}

fn spawn_sign_in(identity: Arc<dyn IdentityProvider>, tx: mpsc::Sender<Action>) {
    info!("Starting sign-in with {}", identity.name());
    let (prompt_tx, mut prompt_rx) = tokio::sync::mpsc::channel(4);

    let prompt_forward = tx.clone();
    tokio::spawn(async move {
        while let Some(prompt) = prompt_rx.recv().await {
            if prompt_forward.send(Action::SignInPrompted(prompt)).is_err() {
                return;
            }
        }
    });

    tokio::spawn(async move {
        let result = identity.sign_in(prompt_tx).await;
        if tx.send(Action::SignInFinished(result)).is_err() {
            warn!("Failed to send sign-in result: receiver dropped");
        }
    });
}

fn spawn_sign_out(identity: Arc<dyn IdentityProvider>, tx: mpsc::Sender<Action>) {
    info!("Signing out of {}", identity.name());
    tokio::spawn(async move {
        let result = identity.sign_out().await;
        if tx.send(Action::SignOutFinished(result)).is_err() {
            warn!("Failed to send sign-out result: receiver dropped");
        }
    });
}

fn spawn_append(store: Arc<dyn MessageStore>, draft: DraftMessage, tx: mpsc::Sender<Action>) {
    debug!("Appending message ({} bytes)", draft.text.len());
    tokio::spawn(async move {
        let result = store.append(draft).await;
        if tx.send(Action::SendFinished(result)).is_err() {
            warn!("Failed to send append result: receiver dropped");
        }
    });
}

/// Attach the live query for the room with `generation` and forward its
/// snapshots. The forwarder ends when the subscription task is cancelled and
/// its sender drops.
fn open_subscription(app: &App, generation: u64, tx: mpsc::Sender<Action>) {
    let subscription = match app.store.subscribe_recent(app.window_size) {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Live query could not attach: {}", e);
            let _ = tx.send(Action::SnapshotReceived {
                generation,
                snapshot: Err(e),
            });
            return;
        }
    };

    let mut snapshots = subscription.snapshots;
    let forward = tx.clone();
    tokio::spawn(async move {
        while let Some(snapshot) = snapshots.recv().await {
            if forward
                .send(Action::SnapshotReceived {
                    generation,
                    snapshot,
                })
                .is_err()
            {
                return;
            }
        }
        debug!("Live query {generation} closed");
    });

    if tx
        .send(Action::SubscriptionOpened {
            generation,
            handle: subscription.handle,
        })
        .is_err()
    {
        warn!("Failed to register live query: receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthError, SessionState};
    use crate::core::state::{Feed, SendStatus};
    use crate::test_support::{alice, test_app};

    /// Drain background actions until `done` holds, failing after a second.
    async fn pump_until(
        app: &mut App,
        tui: &mut TuiState,
        tx: &mpsc::Sender<Action>,
        rx: &mpsc::Receiver<Action>,
        done: impl Fn(&App, &TuiState) -> bool,
    ) {
        for _ in 0..100 {
            while let Ok(action) = rx.try_recv() {
                dispatch(app, tui, action, tx);
            }
            if done(app, tui) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    async fn signed_in(
        app: &mut App,
        tui: &mut TuiState,
        tx: &mpsc::Sender<Action>,
        rx: &mpsc::Receiver<Action>,
    ) {
        dispatch(app, tui, Action::SessionChanged(SessionState::SignedOut), tx);
        dispatch(app, tui, Action::SignInRequested, tx);
        pump_until(app, tui, tx, rx, |app, _| {
            app.gate
                .room()
                .is_some_and(|room| matches!(room.feed, Feed::Live(_)) && room.subscription.is_some())
        })
        .await;
    }

    #[tokio::test]
    async fn sign_in_opens_live_window() {
        let (mut app, platform) = test_app();
        let mut tui = TuiState::new();
        let (tx, rx) = mpsc::channel();

        signed_in(&mut app, &mut tui, &tx, &rx).await;
        assert_eq!(app.gate.room().unwrap().identity, alice());
        assert_eq!(platform.listener_count(), 1);
    }

    #[tokio::test]
    async fn submitted_message_arrives_through_the_window() {
        let (mut app, platform) = test_app();
        let mut tui = TuiState::new();
        let (tx, rx) = mpsc::channel();
        signed_in(&mut app, &mut tui, &tx, &rx).await;

        for c in "hello".chars() {
            let action = route_event(&app, &mut tui, &TuiEvent::InputChar(c));
            assert!(action.is_none());
        }
        let action = route_event(&app, &mut tui, &TuiEvent::Submit);
        assert!(matches!(action, Some(Action::Submit(ref text)) if text == "hello"));
        dispatch(&mut app, &mut tui, action.unwrap(), &tx);

        pump_until(&mut app, &mut tui, &tx, &rx, |app, _| {
            app.send == SendStatus::Succeeded && app.window().len() == 1
        })
        .await;
        assert_eq!(app.window()[0].text, "hello");
        assert_eq!(app.window()[0].author_display_name, "Alice");
        assert_eq!(platform.stored_count(), 1);
        assert!(tui.input_box.buffer.is_empty());
    }

    #[tokio::test]
    async fn failed_append_restores_draft_without_phantom() {
        let (mut app, platform) = test_app();
        let mut tui = TuiState::new();
        let (tx, rx) = mpsc::channel();
        signed_in(&mut app, &mut tui, &tx, &rx).await;

        platform.fail_next_appends(1);
        dispatch(&mut app, &mut tui, Action::Submit("hello".into()), &tx);

        pump_until(&mut app, &mut tui, &tx, &rx, |app, _| {
            matches!(app.send, SendStatus::Failed { .. })
        })
        .await;
        assert_eq!(tui.input_box.buffer, "hello");
        assert!(app.window().is_empty());
        assert_eq!(platform.stored_count(), 0);
    }

    #[tokio::test]
    async fn sign_out_releases_live_query() {
        let (mut app, platform) = test_app();
        let mut tui = TuiState::new();
        let (tx, rx) = mpsc::channel();
        signed_in(&mut app, &mut tui, &tx, &rx).await;
        tui.input_box.restore_draft("unsent");

        let action = route_event(&app, &mut tui, &TuiEvent::SignOut);
        dispatch(&mut app, &mut tui, action.unwrap(), &tx);
        pump_until(&mut app, &mut tui, &tx, &rx, |app, _| {
            matches!(app.gate, Gate::Unauthenticated(_))
        })
        .await;
        assert!(tui.input_box.buffer.is_empty());

        // The aborted task drops its listener once the runtime gets to it
        for _ in 0..100 {
            if platform.listener_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("live query still attached after sign-out");
    }

    #[tokio::test]
    async fn sign_in_failure_stays_on_sign_in_page() {
        let platform = LocalPlatform::new();
        let identity = Arc::new(LocalIdentity::new(alice()));
        identity.fail_next_sign_in(AuthError::Provider("offline".into()));
        let mut app = App::new(identity, Arc::new(platform.store()), 25);
        let mut tui = TuiState::new();
        let (tx, rx) = mpsc::channel();

        dispatch(&mut app, &mut tui, Action::SessionChanged(SessionState::SignedOut), &tx);
        let action = route_event(&app, &mut tui, &TuiEvent::Submit);
        assert!(matches!(action, Some(Action::SignInRequested)));
        dispatch(&mut app, &mut tui, action.unwrap(), &tx);

        pump_until(&mut app, &mut tui, &tx, &rx, |app, _| {
            matches!(&app.gate, Gate::Unauthenticated(s) if s.error.is_some())
        })
        .await;
        assert_eq!(platform.listener_count(), 0);
    }

    #[test]
    fn typing_is_ignored_outside_the_chat() {
        let (mut app, _platform) = test_app();
        let mut tui = TuiState::new();
        let (tx, _rx) = mpsc::channel();
        dispatch(&mut app, &mut tui, Action::SessionChanged(SessionState::SignedOut), &tx);

        assert!(route_event(&app, &mut tui, &TuiEvent::InputChar('a')).is_none());
        assert!(tui.input_box.buffer.is_empty());
        assert!(matches!(
            route_event(&app, &mut tui, &TuiEvent::Quit),
            Some(Action::Quit)
        ));
    }

    #[tokio::test]
    async fn session_watch_forwards_current_state() {
        let identity: Arc<dyn IdentityProvider> = Arc::new(LocalIdentity::new(alice()));
        let (tx, rx) = mpsc::channel();
        let watch = spawn_session_watch(identity, tx);

        for _ in 0..100 {
            if let Ok(action) = rx.try_recv() {
                assert!(matches!(action, Action::SessionChanged(SessionState::SignedOut)));
                watch.abort();
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no session snapshot forwarded");
    }
}
