//! Authentication: session persistence, the auth flow state machine, and
//! the process-wide auth context.
//!
//! This module provides:
//! - `SessionStore` / `SessionData`: durable token-based sessions
//! - `IdentityBackend`: the async seam to the hosted identity provider
//! - `AuthFlow` / `VerifyFlow`: screen-local state machines for sign-in,
//!   sign-up, OTP resend throttling and verification
//! - `AuthContext`: the single process-wide "current user" view
//! - `CredentialStore`: optional OS-keychain password memory

pub mod backend;
pub mod context;
pub mod credentials;
pub mod flow;
#[cfg(test)]
pub(crate) mod mock;
pub mod otp;
pub mod session;

pub use backend::{AuthResponse, IdentityBackend, OtpPurpose, SessionChange};
pub use context::{AuthContext, AuthSnapshot};
pub use credentials::CredentialStore;
pub use flow::{normalize_email, AuthFlow, AuthMode, AuthPhase, Notice, RESEND_COOLDOWN_SECS};
pub use otp::{OtpInput, VerifyFlow, OTP_LEN};
pub use session::{SessionData, SessionStore, UserIdentity};
