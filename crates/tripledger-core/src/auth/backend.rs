//! The seam between the auth state machine and the hosted identity
//! provider.
//!
//! Everything the flow and context need from the provider goes through
//! `IdentityBackend`, so tests can drive the state machine against an
//! in-memory fake while production uses the REST client in `api`.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::api::BackendError;
use crate::auth::session::{SessionData, UserIdentity};

/// What an OTP was issued for. Verification fails provider-side when this
/// does not match how the code was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Signup,
    Login,
}

impl OtpPurpose {
    /// Wire value expected by the provider's verify endpoint.
    pub fn wire_value(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::Login => "otp",
        }
    }
}

/// Success payload from sign-up, sign-in and verify calls.
///
/// Sign-up with email confirmation pending returns the created user but no
/// session yet; the session arrives only after the OTP is verified.
#[derive(Debug, Clone, Default)]
pub struct AuthResponse {
    pub user: Option<UserIdentity>,
    pub session: Option<SessionData>,
}

/// Push notification of a session transition, delivered in emission order.
#[derive(Debug, Clone)]
pub enum SessionChange {
    SignedIn(SessionData),
    TokenRefreshed(SessionData),
    SignedOut,
}

/// Asynchronous identity provider operations.
///
/// Expected provider rejections come back as `Err(BackendError::Api { .. })`
/// with the provider's message intact; transport failures as
/// `Err(BackendError::Network(_))`. No method panics.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Register an account. The provider sends the signup OTP as a side
    /// effect of its own confirmation policy; this call does not guarantee
    /// delivery.
    async fn sign_up_start(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError>;

    /// Request a one-time code for passwordless sign-in. Repeated calls
    /// simply re-trigger delivery, subject to provider-side throttling
    /// surfaced as an `Api` error.
    async fn send_login_otp(&self, email: &str) -> Result<(), BackendError>;

    /// Exchange a 6-digit code for a session.
    async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<AuthResponse, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError>;

    /// Invalidate the session. Logical sign-out is local-first: the durable
    /// session is cleared and `SignedOut` emitted even when the network
    /// revocation fails.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Last known session, re-read from durable storage so sessions written
    /// out-of-band (deep-link continuation) are observed.
    async fn get_session(&self) -> Result<Option<SessionData>, BackendError>;

    /// Subscribe to session transitions. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
}
