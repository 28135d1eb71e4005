//! In-process backend.
//!
//! `LocalPlatform` plays the role of the hosted database: one shared message
//! collection with server-side timestamps and change notification. Several
//! `LocalStore`s (one per participant) can point at the same platform, which
//! is how offline demos and the multi-user tests run.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::Sender;
use tokio::sync::{broadcast, mpsc, watch};

use super::identity::{AuthError, IdentityProvider, SignInPrompt};
use super::store::{MessageStore, Snapshot, StoreError, Subscription, SubscriptionHandle};
use super::types::{CreatedAt, DraftMessage, Message, SessionState, UserIdentity, window_of};

/// Buffered snapshots per subscriber before the feeding task waits.
const SNAPSHOT_BUFFER: usize = 16;
/// Change notifications kept for slow subscribers (lagging just triggers a re-read).
const CHANGE_BUFFER: usize = 64;

#[derive(Default)]
struct Collection {
    messages: Vec<Message>,
    last_stamp: Option<DateTime<Utc>>,
    failing_appends: usize,
}

/// Shared in-memory message collection.
#[derive(Clone)]
pub struct LocalPlatform {
    collection: Arc<Mutex<Collection>>,
    changes: broadcast::Sender<()>,
}

impl Default for LocalPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPlatform {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            collection: Arc::new(Mutex::new(Collection::default())),
            changes,
        }
    }

    /// A store client bound to this platform.
    pub fn store(&self) -> LocalStore {
        LocalStore {
            platform: self.clone(),
        }
    }

    /// Number of live queries currently attached.
    pub fn listener_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Total messages ever stored (the window only shows the newest ones).
    pub fn stored_count(&self) -> usize {
        self.lock().messages.len()
    }

    /// Makes the next `count` appends fail as if the network dropped them.
    pub fn fail_next_appends(&self, count: usize) {
        self.lock().failing_appends = count;
    }

    fn lock(&self) -> MutexGuard<'_, Collection> {
        // A poisoned lock only means a panicking test thread; the data is still valid
        self.collection.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn window(&self, limit: usize) -> Vec<Message> {
        window_of(self.lock().messages.clone(), limit)
    }

    fn insert(&self, draft: DraftMessage) -> Result<Message, StoreError> {
        let message = {
            let mut collection = self.lock();
            if collection.failing_appends > 0 {
                collection.failing_appends -= 1;
                return Err(StoreError::Write("simulated network error".to_string()));
            }

            // Server clock never runs backwards
            let now = Utc::now();
            let stamp = collection.last_stamp.map_or(now, |last| last.max(now));
            collection.last_stamp = Some(stamp);

            let message = Message {
                id: uuid::Uuid::new_v4().to_string(),
                text: draft.text,
                author_id: draft.author.id,
                author_display_name: draft.author.display_name,
                author_avatar_url: draft.author.avatar_url,
                created_at: CreatedAt::At(stamp),
            };
            collection.messages.push(message.clone());
            message
        };

        // No receivers just means nobody is watching
        let _ = self.changes.send(());
        Ok(message)
    }
}

/// Message store client over a `LocalPlatform`.
#[derive(Clone)]
pub struct LocalStore {
    platform: LocalPlatform,
}

#[async_trait]
impl MessageStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn subscribe_recent(&self, limit: usize) -> Result<Subscription, StoreError> {
        let platform = self.platform.clone();
        // Attach before the first read so no insert falls between the two
        let mut changes = platform.changes.subscribe();
        let (tx, rx) = mpsc::channel::<Snapshot>(SNAPSHOT_BUFFER);

        let task = tokio::spawn(async move {
            let mut last = platform.window(limit);
            if tx.send(Ok(last.clone())).await.is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        let window = platform.window(limit);
                        if window == last {
                            continue;
                        }
                        last = window.clone();
                        if tx.send(Ok(window)).await.is_err() {
                            debug!("Snapshot receiver dropped, closing live query");
                            return;
                        }
                    }
                    Err(RecvError::Closed) => {
                        warn!("Local platform shut down");
                        let _ = tx
                            .send(Err(StoreError::Subscription("platform closed".to_string())))
                            .await;
                        return;
                    }
                }
            }
        });

        info!("Local live query attached (limit={limit})");
        Ok(Subscription {
            snapshots: rx,
            handle: SubscriptionHandle::new(task.abort_handle()),
        })
    }

    async fn append(&self, draft: DraftMessage) -> Result<(), StoreError> {
        let message = self.platform.insert(draft)?;
        debug!("Local append stored {} from {}", message.id, message.author_id);
        Ok(())
    }
}

/// Identity provider that signs in as a fixed local identity.
pub struct LocalIdentity {
    identity: UserIdentity,
    session: watch::Sender<SessionState>,
    next_failure: Mutex<Option<AuthError>>,
}

impl LocalIdentity {
    pub fn new(identity: UserIdentity) -> Self {
        let (session, _) = watch::channel(SessionState::SignedOut);
        Self {
            identity,
            session,
            next_failure: Mutex::new(None),
        }
    }

    /// Makes the next sign-in fail with `error`.
    pub fn fail_next_sign_in(&self, error: AuthError) {
        *self.next_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn name(&self) -> &str {
        "local"
    }

    fn observe_session(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    async fn sign_in(&self, _prompts: Sender<SignInPrompt>) -> Result<UserIdentity, AuthError> {
        let failure = self
            .next_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(error) = failure {
            info!("Local sign-in failed: {error}");
            return Err(error);
        }

        info!("Signed in locally as {}", self.identity.display_name);
        self.session
            .send_replace(SessionState::SignedIn(self.identity.clone()));
        Ok(self.identity.clone())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        info!("Signed out of local session");
        self.session.send_replace(SessionState::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::WINDOW_SIZE;
    use tokio_test::{assert_err, assert_ok};

    fn alice() -> UserIdentity {
        UserIdentity {
            id: "u1".into(),
            display_name: "Alice".into(),
            avatar_url: None,
        }
    }

    fn bob() -> UserIdentity {
        UserIdentity {
            id: "u2".into(),
            display_name: "Bob".into(),
            avatar_url: Some("https://example.com/bob.png".into()),
        }
    }

    fn texts(window: &[Message]) -> Vec<&str> {
        window.iter().map(|m| m.text.as_str()).collect()
    }

    /// Reads snapshots until one matches, so the test doesn't depend on how
    /// many intermediate windows were pushed.
    async fn wait_for(subscription: &mut Subscription, expected: &[&str]) -> Vec<Message> {
        loop {
            let snapshot = subscription
                .snapshots
                .recv()
                .await
                .expect("live query closed")
                .expect("live query failed");
            if texts(&snapshot) == expected {
                return snapshot;
            }
        }
    }

    #[tokio::test]
    async fn first_snapshot_is_current_window() {
        let platform = LocalPlatform::new();
        let store = platform.store();
        assert_ok!(store.append(DraftMessage::new("before", alice())).await);

        let mut sub = store.subscribe_recent(WINDOW_SIZE).unwrap();
        let first = sub.snapshots.recv().await.unwrap().unwrap();
        assert_eq!(texts(&first), vec!["before"]);
        assert_eq!(first[0].author_display_name, "Alice");
        assert!(!first[0].created_at.is_pending());
    }

    #[tokio::test]
    async fn two_sessions_converge_in_creation_order() {
        let platform = LocalPlatform::new();
        let alice_store = platform.store();
        let bob_store = platform.store();

        let mut alice_sub = alice_store.subscribe_recent(WINDOW_SIZE).unwrap();
        let mut bob_sub = bob_store.subscribe_recent(WINDOW_SIZE).unwrap();

        alice_store
            .append(DraftMessage::new("hello", alice()))
            .await
            .unwrap();
        let window = wait_for(&mut alice_sub, &["hello"]).await;
        assert_eq!(window[0].author_display_name, "Alice");

        bob_store.append(DraftMessage::new("hi", bob())).await.unwrap();

        wait_for(&mut alice_sub, &["hello", "hi"]).await;
        let bob_view = wait_for(&mut bob_sub, &["hello", "hi"]).await;
        assert_eq!(bob_view[1].author_id, "u2");
    }

    #[tokio::test]
    async fn window_keeps_latest_25_of_30() {
        let platform = LocalPlatform::new();
        let store = platform.store();
        let mut sub = store.subscribe_recent(WINDOW_SIZE).unwrap();

        for i in 0..30 {
            store
                .append(DraftMessage::new(format!("m{i}"), alice()))
                .await
                .unwrap();
        }

        let expected: Vec<String> = (5..30).map(|i| format!("m{i}")).collect();
        let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
        let window = wait_for(&mut sub, &expected).await;

        assert_eq!(window.len(), WINDOW_SIZE);
        // Older messages drop out of view but stay stored
        assert_eq!(platform.stored_count(), 30);
    }

    #[tokio::test]
    async fn every_snapshot_respects_window_bound() {
        let platform = LocalPlatform::new();
        let store = platform.store();
        let mut sub = store.subscribe_recent(WINDOW_SIZE).unwrap();

        for i in 0..30 {
            store
                .append(DraftMessage::new(format!("m{i}"), alice()))
                .await
                .unwrap();
        }

        loop {
            let window = sub.snapshots.recv().await.unwrap().unwrap();
            assert!(window.len() <= WINDOW_SIZE);
            assert!(window.windows(2).all(|w| w[0].created_at <= w[1].created_at));
            if window.last().is_some_and(|m| m.text == "m29") {
                break;
            }
        }
    }

    #[tokio::test]
    async fn failed_append_leaves_no_phantom() {
        let platform = LocalPlatform::new();
        let store = platform.store();
        platform.fail_next_appends(1);

        let result = store.append(DraftMessage::new("lost", alice())).await;
        assert_eq!(
            result,
            Err(StoreError::Write("simulated network error".to_string()))
        );
        assert_eq!(platform.stored_count(), 0);

        // The next one goes through
        assert_ok!(store.append(DraftMessage::new("kept", alice())).await);
        let mut sub = store.subscribe_recent(WINDOW_SIZE).unwrap();
        let window = sub.snapshots.recv().await.unwrap().unwrap();
        assert_eq!(texts(&window), vec!["kept"]);
    }

    #[tokio::test]
    async fn cancel_releases_listener() {
        let platform = LocalPlatform::new();
        let store = platform.store();
        let mut sub = store.subscribe_recent(WINDOW_SIZE).unwrap();
        assert_eq!(platform.listener_count(), 1);
        sub.snapshots.recv().await.unwrap().unwrap();

        let Subscription {
            mut snapshots,
            handle,
        } = sub;
        handle.cancel();

        // The feeding task is gone once the channel reports closed
        while snapshots.recv().await.is_some() {}
        assert_eq!(platform.listener_count(), 0);

        store.append(DraftMessage::new("late", alice())).await.unwrap();
        assert!(snapshots.recv().await.is_none());
    }

    #[tokio::test]
    async fn identity_emits_session_transitions() {
        let identity = LocalIdentity::new(alice());
        let mut session = identity.observe_session();
        assert_eq!(*session.borrow(), SessionState::SignedOut);

        let (prompt_tx, _prompt_rx) = mpsc::channel(1);
        let signed_in = identity.sign_in(prompt_tx).await.unwrap();
        assert_eq!(signed_in, alice());
        session.changed().await.unwrap();
        assert_eq!(*session.borrow(), SessionState::SignedIn(alice()));

        identity.sign_out().await.unwrap();
        session.changed().await.unwrap();
        assert_eq!(*session.borrow(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn injected_sign_in_failure_is_returned_once() {
        let identity = LocalIdentity::new(alice());
        identity.fail_next_sign_in(AuthError::Cancelled);

        let (prompt_tx, _prompt_rx) = mpsc::channel(1);
        let err = assert_err!(identity.sign_in(prompt_tx.clone()).await);
        assert_eq!(err, AuthError::Cancelled);
        assert_eq!(*identity.observe_session().borrow(), SessionState::SignedOut);

        assert_ok!(identity.sign_in(prompt_tx).await);
    }
}
