use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;

use super::types::{SessionState, UserIdentity};

/// Errors that can occur during sign-in or sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The user dismissed or denied the sign-in. Recoverable, nothing to report.
    Cancelled,
    /// Network, configuration or provider failure. Shown to the user.
    Provider(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Cancelled => write!(f, "sign-in cancelled"),
            AuthError::Provider(msg) => write!(f, "identity provider error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Instructions the user has to follow to finish an interactive sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInPrompt {
    /// Page the user opens in a browser
    pub verification_url: String,
    /// Code the user types on that page
    pub user_code: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Subscribes to session snapshots. The current value is available
    /// immediately and may be `Loading` until cached credentials resolve.
    fn observe_session(&self) -> watch::Receiver<SessionState>;

    /// Runs an interactive sign-in. Instructions for the user are sent to
    /// `prompts`. On success the session stream also emits `SignedIn`.
    async fn sign_in(&self, prompts: Sender<SignInPrompt>) -> Result<UserIdentity, AuthError>;

    /// Ends the session. The session stream emits `SignedOut`.
    async fn sign_out(&self) -> Result<(), AuthError>;
}
