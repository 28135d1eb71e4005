use std::fmt;

use async_trait::async_trait;
use log::debug;
use tokio::sync::mpsc::Receiver;
use tokio::task::AbortHandle;

use super::types::{DraftMessage, Message};

/// Errors raised by a message store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The live query could not attach or stopped delivering.
    Subscription(String),
    /// An append was rejected or never acknowledged.
    Write(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Subscription(msg) => write!(f, "live query failed: {msg}"),
            StoreError::Write(msg) => write!(f, "message not sent: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// One push from a live query: the full replacement window, or why it failed.
pub type Snapshot = Result<Vec<Message>, StoreError>;

/// Cancellation handle for a live query.
///
/// Cancelling aborts the task feeding the snapshot channel, which drops the
/// store-side listener. Dropping the handle cancels too, so no exit path of
/// the owner can leak a live query.
#[derive(Debug)]
pub struct SubscriptionHandle {
    abort: AbortHandle,
}

impl SubscriptionHandle {
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort }
    }

    pub fn cancel(self) {
        debug!("Cancelling live query");
        // Drop does the work
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// A live query: lazy sequence of window snapshots plus its cancellation handle.
pub struct Subscription {
    pub snapshots: Receiver<Snapshot>,
    pub handle: SubscriptionHandle,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Returns the name of the store.
    fn name(&self) -> &str;

    /// Opens a live query over the newest `limit` messages, ordered by
    /// creation time ascending. Must be called within a tokio runtime.
    fn subscribe_recent(&self, limit: usize) -> Result<Subscription, StoreError>;

    /// Appends a message. Resolves once the store acknowledged the write;
    /// the stored message is observed through the subscription.
    async fn append(&self, draft: DraftMessage) -> Result<(), StoreError>;
}
