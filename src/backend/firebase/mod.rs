//! Firebase backend over the public REST APIs.
//!
//! - [`auth`]: Google device-flow sign-in exchanged for a Firebase session
//! - [`firestore`]: window query and appends against a Firestore collection
//! - [`credentials`]: refresh-token cache so a restart doesn't need a new sign-in

pub mod auth;
pub mod credentials;
pub mod firestore;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::identity::AuthError;

pub use auth::FirebaseIdentity;
pub use firestore::FirestoreStore;

pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_OAUTH_URL: &str = "https://oauth2.googleapis.com";
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// Base URLs of the Google APIs. Overridable so tests can point at a mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub identity_toolkit: String,
    pub secure_token: String,
    pub oauth: String,
    pub firestore: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity_toolkit: DEFAULT_IDENTITY_TOOLKIT_URL.to_string(),
            secure_token: DEFAULT_SECURE_TOKEN_URL.to_string(),
            oauth: DEFAULT_OAUTH_URL.to_string(),
            firestore: DEFAULT_FIRESTORE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Every API served from one base URL (mock servers).
    pub fn single(base_url: &str) -> Self {
        Self {
            identity_toolkit: base_url.to_string(),
            secure_token: base_url.to_string(),
            oauth: base_url.to_string(),
            firestore: base_url.to_string(),
        }
    }
}

/// Everything the Firebase adapters need to talk to one project.
#[derive(Debug, Clone)]
pub struct FirebaseSettings {
    /// Web API key of the Firebase project
    pub api_key: String,
    pub project_id: String,
    /// OAuth client registered for "TVs and limited input devices"
    pub oauth_client_id: String,
    pub oauth_client_secret: Option<String>,
    /// Collection holding the message documents
    pub collection: String,
    /// Interval between window queries in the live subscription
    pub poll_interval: Duration,
    /// Where the refresh token is cached (None disables caching)
    pub credentials_path: Option<PathBuf>,
    pub endpoints: Endpoints,
}

/// Source of a valid Firebase ID token for authenticated requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn id_token(&self) -> Result<String, AuthError>;
}

/// Google error envelope: `{"error": {"code": 400, "message": "..."}}`.
#[derive(Deserialize, Debug)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Deserialize, Debug)]
struct GoogleError {
    message: String,
}

/// Pulls the human-readable message out of a Google API error body.
pub(crate) fn google_error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
