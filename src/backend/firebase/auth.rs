//! Firebase Authentication with a Google account, for a terminal.
//!
//! A terminal can't host the browser popup the web SDK uses, so sign-in runs
//! the OAuth 2.0 device authorization flow:
//!
//! ```text
//! POST {oauth}/device/code        → user_code + verification_url
//! POST {oauth}/token  (polling)   → Google id_token once the user approved
//! POST {identity}/accounts:signInWithIdp → Firebase idToken + refreshToken
//! POST {secure_token}/token       → fresh idToken from the refreshToken
//! ```
//!
//! The ID token never leaves this module except through [`TokenSource`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tokio::sync::{Mutex, watch};

use super::credentials::{self, CachedCredentials};
use super::{FirebaseSettings, TokenSource, google_error_message};
use crate::backend::identity::{AuthError, IdentityProvider, SignInPrompt};
use crate::backend::types::{SessionState, UserIdentity};

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const OAUTH_SCOPE: &str = "openid email profile";
/// Refresh this long before the ID token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Deserialize, Debug)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    // Google calls it verification_url, RFC 8628 calls it verification_uri
    #[serde(alias = "verification_uri")]
    verification_url: String,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Deserialize, Debug)]
struct DeviceTokenResponse {
    id_token: String,
}

#[derive(Deserialize, Debug)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest {
    post_body: String,
    request_uri: &'static str,
    return_secure_token: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    local_id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize, Debug)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

// ============================================================================
// Session Tokens
// ============================================================================

#[derive(Debug, Clone)]
struct Tokens {
    identity: UserIdentity,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl Tokens {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

/// `expiresIn` comes back as a string of seconds.
fn expiry_from(expires_in: &str) -> DateTime<Utc> {
    let secs = expires_in.parse::<i64>().unwrap_or(3600);
    Utc::now() + chrono::Duration::seconds(secs)
}

/// Firebase user → our identity. Falls back to the email when no display name is set.
fn identity_from(resp: &SignInWithIdpResponse) -> UserIdentity {
    let display_name = resp
        .display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| resp.email.clone())
        .unwrap_or_else(|| "Anonymous".to_string());
    UserIdentity {
        id: resp.local_id.clone(),
        display_name,
        avatar_url: resp.photo_url.clone(),
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Firebase Authentication identity provider (Google sign-in).
pub struct FirebaseIdentity {
    settings: FirebaseSettings,
    client: reqwest::Client,
    tokens: Mutex<Option<Tokens>>,
    session: watch::Sender<SessionState>,
}

impl FirebaseIdentity {
    /// Creates the provider in the `Loading` state. Call
    /// [`restore_session`](Self::restore_session) to resolve cached credentials.
    pub fn new(settings: FirebaseSettings) -> Self {
        let (session, _) = watch::channel(SessionState::Loading);
        Self {
            settings,
            client: reqwest::Client::new(),
            tokens: Mutex::new(None),
            session,
        }
    }

    fn credentials_path(&self) -> Option<&PathBuf> {
        self.settings.credentials_path.as_ref()
    }

    /// Resolves the startup session from the credential cache.
    /// Always ends with the session stream out of `Loading`.
    pub async fn restore_session(&self) {
        let cached = match self.credentials_path().map(|p| credentials::load(p)) {
            Some(Ok(Some(creds))) => creds,
            Some(Err(e)) => {
                warn!("Ignoring unreadable credential cache: {}", e);
                self.session.send_replace(SessionState::SignedOut);
                return;
            }
            _ => {
                debug!("No cached credentials");
                self.session.send_replace(SessionState::SignedOut);
                return;
            }
        };

        match self.refresh(&cached.refresh_token).await {
            Ok(resp) => {
                let tokens = Tokens {
                    identity: cached.identity.clone(),
                    id_token: resp.id_token,
                    refresh_token: resp.refresh_token,
                    expires_at: expiry_from(&resp.expires_in),
                };
                self.install(tokens).await;
                info!("Restored session for {}", cached.identity.display_name);
            }
            Err(RefreshError::Revoked(reason)) => {
                warn!("Cached session was revoked: {}", reason);
                self.forget_session();
            }
            Err(RefreshError::Failed(e)) => {
                // Keep the cache so the next start can try again
                warn!("Cached session could not be refreshed: {}", e);
                self.session.send_replace(SessionState::SignedOut);
            }
        }
    }

    /// Drops the cached refresh token and publishes `SignedOut`. The caller
    /// clears the in-memory tokens.
    fn forget_session(&self) {
        if let Some(path) = self.credentials_path()
            && let Err(e) = credentials::clear(path)
        {
            warn!("Failed to clear credential cache: {}", e);
        }
        self.session.send_replace(SessionState::SignedOut);
    }

    /// Stores fresh tokens, caches the refresh token and publishes the session.
    async fn install(&self, tokens: Tokens) {
        if let Some(path) = self.credentials_path() {
            let cached = CachedCredentials {
                identity: tokens.identity.clone(),
                refresh_token: tokens.refresh_token.clone(),
            };
            if let Err(e) = credentials::save(path, &cached) {
                warn!("Failed to cache credentials: {}", e);
            }
        }
        let identity = tokens.identity.clone();
        *self.tokens.lock().await = Some(tokens);
        self.session.send_replace(SessionState::SignedIn(identity));
    }

    async fn request_device_code(&self) -> Result<DeviceCodeResponse, AuthError> {
        let response = self
            .client
            .post(format!("{}/device/code", self.settings.endpoints.oauth))
            .form(&[
                ("client_id", self.settings.oauth_client_id.as_str()),
                ("scope", OAUTH_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("Device code request failed: {} - {}", status, body);
            return Err(AuthError::Provider(format!("HTTP {status}: {}", oauth_error_text(&body))));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("bad device code response: {e}")))
    }

    /// Polls the token endpoint until the user approves, denies, or the code expires.
    async fn await_google_token(&self, device: &DeviceCodeResponse) -> Result<String, AuthError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval = Duration::from_secs(device.interval);

        let mut form = vec![
            ("client_id", self.settings.oauth_client_id.clone()),
            ("device_code", device.device_code.clone()),
            ("grant_type", DEVICE_GRANT_TYPE.to_string()),
        ];
        if let Some(secret) = &self.settings.oauth_client_secret {
            form.push(("client_secret", secret.clone()));
        }

        loop {
            if tokio::time::Instant::now() >= deadline {
                info!("Device code expired before approval");
                return Err(AuthError::Cancelled);
            }
            tokio::time::sleep(interval).await;

            let response = self
                .client
                .post(format!("{}/token", self.settings.endpoints.oauth))
                .form(&form)
                .send()
                .await
                .map_err(|e| AuthError::Provider(e.to_string()))?;

            if response.status().is_success() {
                let token: DeviceTokenResponse = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Provider(format!("bad token response: {e}")))?;
                return Ok(token.id_token);
            }

            let body = response.text().await.unwrap_or_default();
            let error = serde_json::from_str::<OAuthErrorResponse>(&body)
                .map_err(|_| AuthError::Provider(body.trim().to_string()))?;
            match error.error.as_str() {
                "authorization_pending" => debug!("Waiting for device approval"),
                "slow_down" => {
                    interval += Duration::from_secs(5);
                    debug!("Token polling slowed to {:?}", interval);
                }
                "access_denied" | "expired_token" => {
                    info!("Device sign-in ended: {}", error.error);
                    return Err(AuthError::Cancelled);
                }
                other => {
                    warn!("Device token error: {} {:?}", other, error.error_description);
                    return Err(AuthError::Provider(
                        error.error_description.unwrap_or_else(|| other.to_string()),
                    ));
                }
            }
        }
    }

    async fn exchange_google_token(
        &self,
        google_id_token: &str,
    ) -> Result<SignInWithIdpResponse, AuthError> {
        let request = SignInWithIdpRequest {
            post_body: format!("id_token={google_id_token}&providerId=google.com"),
            request_uri: "http://localhost",
            return_secure_token: true,
        };

        let response = self
            .client
            .post(format!(
                "{}/accounts:signInWithIdp",
                self.settings.endpoints.identity_toolkit
            ))
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("signInWithIdp rejected: {}", body);
            return Err(AuthError::Provider(google_error_message(&body)));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("bad sign-in response: {e}")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, RefreshError> {
        let response = self
            .client
            .post(format!("{}/token", self.settings.endpoints.secure_token))
            .query(&[("key", self.settings.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| RefreshError::Failed(AuthError::Provider(e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = google_error_message(&body);
            if status.is_client_error() && is_revocation(&message) {
                return Err(RefreshError::Revoked(message));
            }
            return Err(RefreshError::Failed(AuthError::Provider(message)));
        }

        response.json().await.map_err(|e| {
            RefreshError::Failed(AuthError::Provider(format!("bad refresh response: {e}")))
        })
    }
}

/// Why a token refresh failed.
#[derive(Debug)]
enum RefreshError {
    /// The provider no longer honours the refresh token.
    Revoked(String),
    /// Network or provider trouble; the token may still be good.
    Failed(AuthError),
}

/// Secure Token API codes that end the session for good. Messages can carry
/// details after the code (`"USER_DISABLED : ..."`).
const REVOCATION_CODES: &[&str] = &[
    "INVALID_REFRESH_TOKEN",
    "TOKEN_EXPIRED",
    "USER_DISABLED",
    "USER_NOT_FOUND",
];

fn is_revocation(message: &str) -> bool {
    REVOCATION_CODES.iter().any(|code| message.starts_with(code))
}

fn oauth_error_text(body: &str) -> String {
    serde_json::from_str::<OAuthErrorResponse>(body)
        .map(|e| e.error_description.unwrap_or(e.error))
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    fn name(&self) -> &str {
        "firebase"
    }

    fn observe_session(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    async fn sign_in(&self, prompts: Sender<SignInPrompt>) -> Result<UserIdentity, AuthError> {
        info!("Starting Google device sign-in");
        let device = self.request_device_code().await?;

        let prompt = SignInPrompt {
            verification_url: device.verification_url.clone(),
            user_code: device.user_code.clone(),
        };
        if prompts.send(prompt).await.is_err() {
            // Nobody can show the code, so the user can never approve it
            return Err(AuthError::Cancelled);
        }

        let google_id_token = self.await_google_token(&device).await?;
        let resp = self.exchange_google_token(&google_id_token).await?;

        let identity = identity_from(&resp);
        let tokens = Tokens {
            identity: identity.clone(),
            id_token: resp.id_token,
            refresh_token: resp.refresh_token,
            expires_at: expiry_from(&resp.expires_in),
        };
        self.install(tokens).await;
        info!("Signed in as {} ({})", identity.display_name, identity.id);
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        // Cache first: a failure leaves the session fully usable
        if let Some(path) = self.credentials_path() {
            credentials::clear(path)
                .map_err(|e| AuthError::Provider(format!("could not clear credentials: {e}")))?;
        }
        *self.tokens.lock().await = None;
        self.session.send_replace(SessionState::SignedOut);
        info!("Signed out");
        Ok(())
    }
}

#[async_trait]
impl TokenSource for FirebaseIdentity {
    async fn id_token(&self) -> Result<String, AuthError> {
        let mut guard = self.tokens.lock().await;
        let Some(tokens) = guard.as_mut() else {
            return Err(AuthError::Provider("not signed in".to_string()));
        };
        if tokens.is_fresh(Utc::now()) {
            return Ok(tokens.id_token.clone());
        }

        debug!("ID token expiring, refreshing");
        let resp = match self.refresh(&tokens.refresh_token).await {
            Ok(resp) => resp,
            Err(RefreshError::Revoked(reason)) => {
                info!("Session ended by the provider: {}", reason);
                *guard = None;
                self.forget_session();
                return Err(AuthError::Provider(format!("session expired: {reason}")));
            }
            Err(RefreshError::Failed(e)) => return Err(e),
        };
        tokens.id_token = resp.id_token;
        tokens.refresh_token = resp.refresh_token;
        tokens.expires_at = expiry_from(&resp.expires_in);
        Ok(tokens.id_token.clone())
    }
}
