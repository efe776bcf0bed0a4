//! REST client for the hosted identity provider.
//!
//! This module implements `IdentityBackend` against a GoTrue-style auth
//! endpoint (sign-up, OTP send/verify, password grant, refresh grant,
//! logout). The client owns the durable `SessionStore` and is the only
//! writer of it; every session transition it performs is published on a
//! broadcast channel for the auth context to observe.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::auth::backend::{AuthResponse, IdentityBackend, OtpPurpose, SessionChange};
use crate::auth::session::{SessionData, SessionStore, UserIdentity};

use super::BackendError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow provider responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Buffer size for the session-change broadcast channel.
/// Session transitions are rare; 16 leaves ample headroom for slow readers.
const CHANGE_CHANNEL_SIZE: usize = 16;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    email: String,
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

impl WireUser {
    fn into_identity(self) -> UserIdentity {
        let full_name = self
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("full_name"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        UserIdentity {
            id: self.id,
            email: self.email,
            full_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireSession {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: WireUser,
}

impl WireSession {
    fn into_session(self) -> SessionData {
        let now = Utc::now();
        SessionData {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: self.user.into_identity(),
            expires_at: now + chrono::Duration::seconds(self.expires_in),
            created_at: now,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Identity provider client.
/// Clone is not offered; the client is shared behind an `Arc` because it
/// owns the durable session store and the change channel.
pub struct IdentityClient {
    client: Client,
    base_url: String,
    api_key: String,
    store: Mutex<SessionStore>,
    changes: broadcast::Sender<SessionChange>,
}

impl IdentityClient {
    /// Create a new client against `base_url` (the provider's `/auth/v1`
    /// root), persisting sessions under `data_dir`.
    pub fn new(base_url: &str, api_key: &str, data_dir: PathBuf) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);

        let mut store = SessionStore::new(data_dir);
        if let Err(e) = store.load() {
            warn!(error = %e, "Failed to load persisted session, starting signed out");
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            store: Mutex::new(store),
            changes,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if response is successful, returning a structured error with
    /// the provider's message if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(BackendError::from_status(status, &body))
        }
    }

    async fn post_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: serde_json::Value,
    ) -> Result<reqwest::Response, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .query(query)
            .header("apikey", &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        Self::check_response(response).await
    }

    /// Persist a freshly acquired session and notify subscribers.
    async fn adopt_session(&self, session: SessionData, change: SessionChange) {
        let mut store = self.store.lock().await;
        store.update(session);
        if let Err(e) = store.save() {
            warn!(error = %e, "Failed to persist session");
        }
        // A send error only means nobody is listening yet
        let _ = self.changes.send(change);
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionData, BackendError> {
        debug!("Refreshing expired session");
        let response = self
            .post_json(
                "/token",
                &[("grant_type", "refresh_token")],
                json!({ "refresh_token": refresh_token }),
            )
            .await?;
        let wire: WireSession = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(wire.into_session())
    }
}

#[async_trait]
impl IdentityBackend for IdentityClient {
    async fn sign_up_start(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError> {
        let response = self
            .post_json(
                "/signup",
                &[],
                json!({
                    "email": email,
                    "password": password,
                    "data": { "full_name": full_name },
                }),
            )
            .await?;

        // With email confirmation enabled the provider returns only the
        // created user; otherwise it returns a full session.
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if value.get("access_token").is_some() {
            let wire: WireSession = serde_json::from_value(value)
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
            let session = wire.into_session();
            let user = session.user.clone();
            self.adopt_session(session.clone(), SessionChange::SignedIn(session.clone()))
                .await;
            Ok(AuthResponse {
                user: Some(user),
                session: Some(session),
            })
        } else {
            let wire: WireUser = serde_json::from_value(value)
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
            Ok(AuthResponse {
                user: Some(wire.into_identity()),
                session: None,
            })
        }
    }

    async fn send_login_otp(&self, email: &str) -> Result<(), BackendError> {
        self.post_json("/otp", &[], json!({ "email": email })).await?;
        Ok(())
    }

    async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<AuthResponse, BackendError> {
        let response = self
            .post_json(
                "/verify",
                &[],
                json!({
                    "email": email,
                    "token": code,
                    "type": purpose.wire_value(),
                }),
            )
            .await?;

        let wire: WireSession = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let session = wire.into_session();
        let user = session.user.clone();
        self.adopt_session(session.clone(), SessionChange::SignedIn(session.clone()))
            .await;
        Ok(AuthResponse {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError> {
        let response = self
            .post_json(
                "/token",
                &[("grant_type", "password")],
                json!({ "email": email, "password": password }),
            )
            .await?;

        let wire: WireSession = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let session = wire.into_session();
        let user = session.user.clone();
        self.adopt_session(session.clone(), SessionChange::SignedIn(session.clone()))
            .await;
        Ok(AuthResponse {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        // Local-first: the session is gone from this device no matter what
        // the network says.
        let access_token = {
            let mut store = self.store.lock().await;
            let token = store.data.as_ref().map(|d| d.access_token.clone());
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to remove persisted session");
            }
            token
        };
        let _ = self.changes.send(SessionChange::SignedOut);

        if let Some(token) = access_token {
            let result = self
                .client
                .post(self.url("/logout"))
                .header("apikey", &self.api_key)
                .bearer_auth(token)
                .send()
                .await;
            match result {
                Ok(response) => {
                    if let Err(e) = Self::check_response(response).await {
                        warn!(error = %e, "Server-side sign-out failed");
                    }
                }
                Err(e) => warn!(error = %e, "Server-side sign-out unreachable"),
            }
        }
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<SessionData>, BackendError> {
        let mut store = self.store.lock().await;
        let previous_token = store.data.as_ref().map(|d| d.access_token.clone());

        // Re-read the file so sessions written out-of-band are observed
        if let Err(e) = store.load() {
            warn!(error = %e, "Failed to re-read persisted session");
        }

        let Some(data) = store.data.clone() else {
            return Ok(None);
        };

        let current = if data.needs_refresh() {
            match self.refresh(&data.refresh_token).await {
                Ok(refreshed) => {
                    store.update(refreshed.clone());
                    if let Err(e) = store.save() {
                        warn!(error = %e, "Failed to persist refreshed session");
                    }
                    let _ = self.changes.send(SessionChange::TokenRefreshed(refreshed.clone()));
                    refreshed
                }
                Err(e) if e.is_api() => {
                    // Refresh token revoked or consumed elsewhere
                    warn!(error = %e, "Session refresh rejected, signing out");
                    if let Err(e) = store.clear() {
                        warn!(error = %e, "Failed to remove persisted session");
                    }
                    let _ = self.changes.send(SessionChange::SignedOut);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        } else {
            data
        };

        // A session that appeared since the last look (e.g. a deep-link
        // continuation wrote the file) counts as a sign-in.
        if previous_token.as_deref() != Some(current.access_token.as_str()) {
            let _ = self.changes.send(SessionChange::SignedIn(current.clone()));
        }

        Ok(Some(current))
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}
