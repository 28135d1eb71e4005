//! Cloud Firestore message store over REST.
//!
//! The window is `ORDER BY createdAt DESC LIMIT n` reversed to ascending, so
//! it always holds the newest messages. Appends go through `documents:commit`
//! with a `REQUEST_TIME` transform, which lets the server stamp `createdAt`.
//!
//! Firestore's streaming Listen channel isn't exposed over plain REST, so the
//! live query re-runs the window query inside the subscription task and only
//! pushes a snapshot when the window actually changed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use super::{FirebaseSettings, TokenSource, google_error_message};
use crate::backend::store::{MessageStore, Snapshot, StoreError, Subscription, SubscriptionHandle};
use crate::backend::types::{CreatedAt, DraftMessage, Message, window_of};

const SNAPSHOT_BUFFER: usize = 16;

// ============================================================================
// Document Decoding
// ============================================================================

/// A Firestore typed value. Only the variants the message schema uses are read.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct Value {
    #[serde(default)]
    string_value: Option<String>,
    #[serde(default)]
    timestamp_value: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

/// One element of the `runQuery` response array. Entries without a document
/// only carry a read time (e.g. an empty result).
#[derive(Deserialize, Debug)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<Document>,
}

impl Document {
    fn string(&self, field: &str) -> Option<String> {
        self.fields.get(field).and_then(|v| v.string_value.clone())
    }

    /// Maps the stored schema (`text`, `uid`, `photoURL`, `displayName`,
    /// `createdAt`) to a `Message`. A missing timestamp means the server
    /// transform hasn't been applied yet.
    fn into_message(self) -> Message {
        let created_at = self
            .fields
            .get("createdAt")
            .and_then(|v| v.timestamp_value)
            .map_or(CreatedAt::Pending, CreatedAt::At);
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or(self.name.as_str())
            .to_string();

        Message {
            text: self.string("text").unwrap_or_default(),
            author_id: self.string("uid").unwrap_or_default(),
            author_display_name: self
                .string("displayName")
                .unwrap_or_else(|| "Anonymous".to_string()),
            author_avatar_url: self.string("photoURL").filter(|u| !u.is_empty()),
            created_at,
            id,
        }
    }
}

/// Decodes a `runQuery` response into the ascending window.
fn decode_window(items: Vec<RunQueryItem>, limit: usize) -> Vec<Message> {
    let messages = items
        .into_iter()
        .filter_map(|item| item.document)
        .map(Document::into_message)
        .collect();
    window_of(messages, limit)
}

fn optional_string(value: &Option<String>) -> serde_json::Value {
    match value {
        Some(s) => json!({ "stringValue": s }),
        None => json!({ "nullValue": null }),
    }
}

// ============================================================================
// Store Implementation
// ============================================================================

/// Firestore-backed message store.
#[derive(Clone)]
pub struct FirestoreStore {
    settings: FirebaseSettings,
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
}

impl FirestoreStore {
    pub fn new(settings: FirebaseSettings, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            settings,
            tokens,
            client: reqwest::Client::new(),
        }
    }

    /// `projects/{p}/databases/(default)/documents`
    fn documents_path(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.settings.project_id
        )
    }

    fn documents_url(&self) -> String {
        format!("{}/{}", self.settings.endpoints.firestore, self.documents_path())
    }

    /// Runs the window query once.
    async fn query_window(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let token = self
            .tokens
            .id_token()
            .await
            .map_err(|e| StoreError::Subscription(e.to_string()))?;

        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.settings.collection }],
                "orderBy": [{
                    "field": { "fieldPath": "createdAt" },
                    "direction": "DESCENDING"
                }],
                "limit": limit
            }
        });

        let response = self
            .client
            .post(format!("{}:runQuery", self.documents_url()))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Subscription(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("Firestore runQuery failed: {} - {}", status, body);
            return Err(StoreError::Subscription(format!(
                "HTTP {status}: {}",
                google_error_message(&body)
            )));
        }

        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .map_err(|e| StoreError::Subscription(format!("bad query response: {e}")))?;
        Ok(decode_window(items, limit))
    }
}

#[async_trait]
impl MessageStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    fn subscribe_recent(&self, limit: usize) -> Result<Subscription, StoreError> {
        if self.settings.project_id.is_empty() {
            return Err(StoreError::Subscription(
                "no Firebase project configured".to_string(),
            ));
        }

        let store = self.clone();
        let interval = self.settings.poll_interval;
        let (tx, rx) = mpsc::channel::<Snapshot>(SNAPSHOT_BUFFER);

        let task = tokio::spawn(async move {
            let mut last: Option<Snapshot> = None;
            loop {
                let snapshot = store.query_window(limit).await;
                // Only push when the window (or the failure) changed
                if last.as_ref() != Some(&snapshot) {
                    if let Err(e) = &snapshot {
                        warn!("Live query degraded: {}", e);
                    } else {
                        debug!("Live query window changed");
                    }
                    last = Some(snapshot.clone());
                    if tx.send(snapshot).await.is_err() {
                        debug!("Snapshot receiver dropped, closing live query");
                        return;
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });

        info!(
            "Firestore live query attached (collection={}, limit={limit})",
            self.settings.collection
        );
        Ok(Subscription {
            snapshots: rx,
            handle: SubscriptionHandle::new(task.abort_handle()),
        })
    }

    async fn append(&self, draft: DraftMessage) -> Result<(), StoreError> {
        let token = self
            .tokens
            .id_token()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        let doc_id = uuid::Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}/{}/{}",
            self.documents_path(),
            self.settings.collection,
            doc_id
        );
        let body = json!({
            "writes": [{
                "update": {
                    "name": name,
                    "fields": {
                        "text": { "stringValue": draft.text },
                        "uid": { "stringValue": draft.author.id },
                        "displayName": { "stringValue": draft.author.display_name },
                        "photoURL": optional_string(&draft.author.avatar_url)
                    }
                },
                "updateTransforms": [{
                    "fieldPath": "createdAt",
                    "setToServerValue": "REQUEST_TIME"
                }],
                "currentDocument": { "exists": false }
            }]
        });

        let response = self
            .client
            .post(format!("{}:commit", self.documents_url()))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("Firestore commit failed: {} - {}", status, body);
            return Err(StoreError::Write(format!(
                "HTTP {status}: {}",
                google_error_message(&body)
            )));
        }

        debug!("Committed message {}", doc_id);
        Ok(())
    }
}
