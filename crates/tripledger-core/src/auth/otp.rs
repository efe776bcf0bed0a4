//! OTP entry and verification.
//!
//! Same state-machine family as `AuthFlow`, but for the dedicated code
//! entry screen: six independent single-character digit slots and a verify
//! call whose purpose must match how the code was requested. On success
//! the flow does not touch session state - the backend client persists the
//! session and the context's change listener reflects it, keeping a single
//! writer of session truth.

use std::sync::Arc;

use tracing::debug;

use crate::auth::backend::{IdentityBackend, OtpPurpose};
use crate::auth::flow::{normalize_email, Notice};

/// Number of digits in a one-time code.
pub const OTP_LEN: usize = 6;

/// Six independent single-character fields, mirroring the entry boxes on
/// the verify screen.
#[derive(Debug, Clone, Default)]
pub struct OtpInput {
    digits: [Option<char>; OTP_LEN],
}

impl OtpInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one slot. Non-digit input is rejected and returns false.
    pub fn set_digit(&mut self, index: usize, c: char) -> bool {
        if index >= OTP_LEN || !c.is_ascii_digit() {
            return false;
        }
        self.digits[index] = Some(c);
        true
    }

    pub fn clear_digit(&mut self, index: usize) {
        if index < OTP_LEN {
            self.digits[index] = None;
        }
    }

    pub fn clear(&mut self) {
        self.digits = [None; OTP_LEN];
    }

    pub fn len(&self) -> usize {
        self.digits.iter().filter(|d| d.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The full code, only once all six slots are filled.
    pub fn code(&self) -> Option<String> {
        if self.digits.iter().all(|d| d.is_some()) {
            Some(self.digits.iter().flatten().collect())
        } else {
            None
        }
    }
}

/// Verification phase. Kept separate from `AuthPhase` because the verify
/// screen has no cooldown or polling of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyPhase {
    Idle,
    Submitting,
}

/// State machine for the verify screen.
pub struct VerifyFlow<B: IdentityBackend + ?Sized> {
    backend: Arc<B>,
    email: String,
    purpose: OtpPurpose,
    pub input: OtpInput,
    phase: VerifyPhase,
    notice: Option<Notice>,
}

impl<B: IdentityBackend + ?Sized> VerifyFlow<B> {
    pub fn new(backend: Arc<B>, email: &str, purpose: OtpPurpose) -> Self {
        Self {
            backend,
            email: normalize_email(email),
            purpose,
            input: OtpInput::new(),
            phase: VerifyPhase::Idle,
            notice: None,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn purpose(&self) -> OtpPurpose {
        self.purpose
    }

    pub fn phase(&self) -> VerifyPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        match self.notice {
            Some(Notice::Error(ref msg)) => Some(msg),
            Some(Notice::Info(_)) | None => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.phase == VerifyPhase::Submitting
    }

    /// Submit the entered code. Rejected client-side when fewer than six
    /// digits are present. Returns true on successful verification; the
    /// caller then waits for the auth context to reflect the new session.
    pub async fn submit(&mut self) -> bool {
        match self.phase {
            VerifyPhase::Idle => {}
            VerifyPhase::Submitting => {
                debug!("Ignoring verify submit while in flight");
                return false;
            }
        }

        let Some(code) = self.input.code() else {
            self.notice = Some(Notice::Error("Please enter the 6-digit code".to_string()));
            return false;
        };

        self.phase = VerifyPhase::Submitting;
        self.notice = None;

        let result = self
            .backend
            .verify_otp(&self.email, &code, self.purpose)
            .await;
        self.phase = VerifyPhase::Idle;

        match result {
            Ok(_) => true,
            Err(e) => {
                self.notice = Some(Notice::Error(e.to_string()));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BackendError;
    use crate::auth::mock::MockBackend;

    #[test]
    fn test_otp_input_collects_six_digits() {
        let mut input = OtpInput::new();
        for (i, c) in "123456".chars().enumerate() {
            assert!(input.set_digit(i, c));
        }
        assert_eq!(input.code(), Some("123456".to_string()));
    }

    #[test]
    fn test_otp_input_rejects_non_digits_and_out_of_range() {
        let mut input = OtpInput::new();
        assert!(!input.set_digit(0, 'a'));
        assert!(!input.set_digit(6, '1'));
        assert!(input.is_empty());
    }

    #[test]
    fn test_otp_input_incomplete_code_is_none() {
        let mut input = OtpInput::new();
        for (i, c) in "12345".chars().enumerate() {
            input.set_digit(i, c);
        }
        assert_eq!(input.len(), 5);
        assert_eq!(input.code(), None);

        input.set_digit(5, '6');
        input.clear_digit(2);
        assert_eq!(input.code(), None);
    }

    #[tokio::test]
    async fn test_submit_rejects_short_code_without_network() {
        let backend = MockBackend::new();
        let mut flow = VerifyFlow::new(backend.clone(), "jane@x.com", OtpPurpose::Signup);
        flow.input.set_digit(0, '1');

        let ok = flow.submit().await;

        assert!(!ok);
        assert_eq!(flow.error(), Some("Please enter the 6-digit code"));
        assert_eq!(backend.call_count("verify_otp"), 0);
    }

    #[tokio::test]
    async fn test_submit_verifies_full_code() {
        let backend = MockBackend::new();
        backend.push_verify(Ok(Default::default()));
        let mut flow = VerifyFlow::new(backend.clone(), "  Jane@X.COM ", OtpPurpose::Signup);
        for (i, c) in "123456".chars().enumerate() {
            flow.input.set_digit(i, c);
        }

        let ok = flow.submit().await;

        assert!(ok);
        assert!(flow.error().is_none());
        assert_eq!(backend.call_count("verify_otp"), 1);
        // Verification correlates on the normalized email
        assert_eq!(backend.last_email(), Some("jane@x.com".to_string()));
    }

    #[tokio::test]
    async fn test_failed_verification_shows_backend_message() {
        let backend = MockBackend::new();
        backend.push_verify(Err(BackendError::Api {
            status: 401,
            message: "Token has expired or is invalid".to_string(),
        }));
        let mut flow = VerifyFlow::new(backend.clone(), "jane@x.com", OtpPurpose::Login);
        for (i, c) in "000000".chars().enumerate() {
            flow.input.set_digit(i, c);
        }

        let ok = flow.submit().await;

        assert!(!ok);
        assert_eq!(flow.error(), Some("Token has expired or is invalid"));
        assert_eq!(flow.phase(), VerifyPhase::Idle);
    }

    #[test]
    fn test_purpose_wire_values_match_request_type() {
        assert_eq!(OtpPurpose::Signup.wire_value(), "signup");
        assert_eq!(OtpPurpose::Login.wire_value(), "otp");
    }
}
