//! The auth session state machine.
//!
//! Drives sign-in, sign-up, OTP resend throttling, and the bounded
//! session-convergence poll. The flow never writes session state itself:
//! it calls the identity backend, interprets the result, and exposes a
//! phase plus at most one notice for the UI to render. Session truth is
//! owned by the backend client and observed through the auth context.
//!
//! Email confirmation can complete out-of-band (the user clicks a link on
//! another device), so `check_session` polls for convergence instead of
//! assuming a synchronous verify call resolves it.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::auth::backend::IdentityBackend;

// ============================================================================
// Constants
// ============================================================================

/// Seconds a user must wait before re-requesting OTP delivery.
pub const RESEND_COOLDOWN_SECS: u32 = 30;

/// Maximum attempts for the manual session-convergence poll.
const SESSION_CHECK_MAX_ATTEMPTS: u32 = 3;

/// Delay between session-check attempts.
const SESSION_CHECK_DELAY: Duration = Duration::from_secs(2);

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Same shape the original screens accepted: something@something.tld
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

// ============================================================================
// Input validation
// ============================================================================

/// Canonical form of an email address: trimmed and lower-cased. The
/// normalized email is the sole identity key used for OTP correlation.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Password policy for the full sign-up screen: at least 8 characters with
/// an uppercase letter, a lowercase letter and a digit.
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

// ============================================================================
// Error classification
// ============================================================================

/// Interpretation of a provider error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Account exists but the email is not confirmed yet
    UnconfirmedEmail,
    /// Too many sign-in attempts
    TooManyAttempts,
    /// Too many OTP delivery requests
    TooManyRequests,
    /// Anything else: shown verbatim
    Other,
}

static UNCONFIRMED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)confirm|verify").unwrap());
static TOO_MANY_ATTEMPTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)too.*many.*attempts").unwrap());
static TOO_MANY_REQUESTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)too.*many.*requests").unwrap());

/// Classify a provider's free-text error message.
///
/// Known fragility: the provider does not give us structured error codes,
/// so this matches substrings of human-readable text. The flow stays
/// correct when classification misses - the raw message degrades to an
/// `Other` error shown to the user. Keep every pattern here so a future
/// structured code is a localized change.
pub fn classify_auth_error(message: &str) -> ErrorClass {
    if TOO_MANY_REQUESTS_RE.is_match(message) {
        ErrorClass::TooManyRequests
    } else if TOO_MANY_ATTEMPTS_RE.is_match(message) {
        ErrorClass::TooManyAttempts
    } else if UNCONFIRMED_RE.is_match(message) {
        ErrorClass::UnconfirmedEmail
    } else {
        ErrorClass::Other
    }
}

// ============================================================================
// State types
// ============================================================================

/// Which form the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

/// Lifecycle phase of an auth interaction.
///
/// Every transition site matches exhaustively on this enum so new phases
/// cannot be silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Idle,
    Submitting,
    /// A code was (or should have been) delivered; `cooldown` is the
    /// seconds remaining before another delivery may be requested.
    AwaitingOtp { cooldown: u32 },
    /// Bounded poll for a session that may appear out-of-band.
    CheckingSession { attempt: u32, max: u32 },
}

/// The single message slot shown near the controls. Info and error are one
/// tagged value, so the impossible "error and success info at once" state
/// cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

// ============================================================================
// The flow
// ============================================================================

/// Screen-local auth state machine. One instance exists per active auth
/// interaction; it is discarded on unmount or once a session appears.
///
/// Cancellation is by drop: abandoning an in-flight `check_session` future
/// stops the poll mid-delay, and because every async operation borrows the
/// flow mutably, no transition can occur after the caller lets go.
pub struct AuthFlow<B: IdentityBackend + ?Sized> {
    backend: Arc<B>,
    mode: AuthMode,
    phase: AuthPhase,
    notice: Option<Notice>,
}

impl<B: IdentityBackend + ?Sized> AuthFlow<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            mode: AuthMode::SignIn,
            phase: AuthPhase::Idle,
            notice: None,
        }
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn info(&self) -> Option<&str> {
        match self.notice {
            Some(Notice::Info(ref msg)) => Some(msg),
            Some(Notice::Error(_)) | None => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self.notice {
            Some(Notice::Error(ref msg)) => Some(msg),
            Some(Notice::Info(_)) | None => None,
        }
    }

    /// True while a backend call or poll is in flight; the UI disables
    /// controls on this.
    pub fn is_busy(&self) -> bool {
        match self.phase {
            AuthPhase::Submitting | AuthPhase::CheckingSession { .. } => true,
            AuthPhase::Idle | AuthPhase::AwaitingOtp { .. } => false,
        }
    }

    /// Seconds before resend is allowed again (0 when not awaiting a code).
    pub fn cooldown(&self) -> u32 {
        match self.phase {
            AuthPhase::AwaitingOtp { cooldown } => cooldown,
            AuthPhase::Idle | AuthPhase::Submitting | AuthPhase::CheckingSession { .. } => 0,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn set_info(&mut self, msg: impl Into<String>) {
        self.notice = Some(Notice::Info(msg.into()));
    }

    fn set_error(&mut self, msg: impl Into<String>) {
        self.notice = Some(Notice::Error(msg.into()));
    }

    /// Switch between sign-in and sign-up. Any error state is recoverable
    /// by switching modes, so the notice is cleared.
    pub fn switch_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
        self.notice = None;
    }

    /// Return to `Idle` with no message. Used on unmount and when an
    /// external sign-out clears the session from under the screen.
    pub fn reset(&mut self) {
        self.phase = AuthPhase::Idle;
        self.notice = None;
    }

    /// Advance the once-per-second cooldown timer. Strictly decrements by
    /// one and never goes below zero.
    pub fn tick(&mut self) {
        match self.phase {
            AuthPhase::AwaitingOtp { cooldown } if cooldown > 0 => {
                self.phase = AuthPhase::AwaitingOtp {
                    cooldown: cooldown - 1,
                };
            }
            AuthPhase::Idle
            | AuthPhase::Submitting
            | AuthPhase::AwaitingOtp { .. }
            | AuthPhase::CheckingSession { .. } => {}
        }
    }

    /// Submit the current form. Validation failures never reach the
    /// network; backend failures are classified and become notices.
    pub async fn submit(&mut self, email: &str, password: &str) {
        match self.phase {
            AuthPhase::Idle => {}
            AuthPhase::Submitting
            | AuthPhase::AwaitingOtp { .. }
            | AuthPhase::CheckingSession { .. } => {
                debug!(phase = ?self.phase, "Ignoring submit outside Idle");
                return;
            }
        }

        if email.trim().is_empty() {
            self.set_error("Please enter your email address");
            return;
        }
        if self.mode == AuthMode::SignIn && password.trim().is_empty() {
            self.set_error("Please enter your password");
            return;
        }

        let email = normalize_email(email);
        self.phase = AuthPhase::Submitting;
        self.notice = None;

        match self.mode {
            AuthMode::SignIn => self.finish_sign_in(&email, password).await,
            AuthMode::SignUp => {
                // Compatibility path without a full name; the dedicated
                // sign-up screen goes through `sign_up` below.
                self.finish_sign_up("", &email, password).await;
            }
        }
    }

    /// Fully-parameterized sign-up with client-side validation, used by
    /// the dedicated account-creation screen.
    pub async fn sign_up(&mut self, full_name: &str, email: &str, password: &str) {
        match self.phase {
            AuthPhase::Idle => {}
            AuthPhase::Submitting
            | AuthPhase::AwaitingOtp { .. }
            | AuthPhase::CheckingSession { .. } => {
                debug!(phase = ?self.phase, "Ignoring sign_up outside Idle");
                return;
            }
        }

        if full_name.trim().is_empty() {
            self.set_error("Full name is required");
            return;
        }
        if !is_valid_email(email.trim()) {
            self.set_error("Please enter a valid email address");
            return;
        }
        if !is_valid_password(password) {
            self.set_error("Password must be at least 8 chars, include upper, lower and a number");
            return;
        }

        let email = normalize_email(email);
        self.phase = AuthPhase::Submitting;
        self.notice = None;
        self.finish_sign_up(full_name.trim(), &email, password).await;
    }

    async fn finish_sign_in(&mut self, email: &str, password: &str) {
        match self.backend.sign_in_with_password(email, password).await {
            Ok(_) => {
                // Session store updated by the client; the context's
                // change listener closes this flow out.
                self.phase = AuthPhase::Idle;
                self.notice = None;
            }
            Err(e) => {
                let msg = e.to_string();
                match classify_auth_error(&msg) {
                    ErrorClass::UnconfirmedEmail => {
                        self.phase = AuthPhase::AwaitingOtp { cooldown: 0 };
                        self.set_info(
                            "Your email address has not been confirmed yet. \
                             Check your inbox for a confirmation link.",
                        );
                    }
                    ErrorClass::TooManyAttempts | ErrorClass::TooManyRequests => {
                        self.phase = AuthPhase::Idle;
                        self.set_error("Too many attempts. Please try again later or use OTP sign-in.");
                    }
                    ErrorClass::Other => {
                        self.phase = AuthPhase::Idle;
                        self.set_error(msg);
                    }
                }
            }
        }
    }

    async fn finish_sign_up(&mut self, full_name: &str, email: &str, password: &str) {
        match self.backend.sign_up_start(full_name, email, password).await {
            Ok(_) => {
                self.phase = AuthPhase::AwaitingOtp {
                    cooldown: RESEND_COOLDOWN_SECS,
                };
                self.set_info("An OTP has been sent to your email. Enter it to complete signup.");
            }
            Err(e) => {
                self.phase = AuthPhase::Idle;
                self.set_error(e.to_string());
            }
        }
    }

    /// Request (or re-request) OTP delivery for passwordless sign-in or
    /// pending confirmation. Rejected outright while the cooldown runs -
    /// the request is not queued.
    pub async fn resend(&mut self, email: &str) {
        let prior = match self.phase {
            AuthPhase::Idle => None,
            AuthPhase::AwaitingOtp { cooldown } => {
                if cooldown > 0 {
                    self.set_error(format!(
                        "Please wait {} seconds before requesting another code",
                        cooldown
                    ));
                    return;
                }
                Some(cooldown)
            }
            AuthPhase::Submitting | AuthPhase::CheckingSession { .. } => {
                debug!(phase = ?self.phase, "Ignoring resend while busy");
                return;
            }
        };

        if !is_valid_email(email.trim()) {
            self.set_error("Please enter a valid email address");
            return;
        }

        let email = normalize_email(email);
        self.phase = AuthPhase::Submitting;
        self.notice = None;

        match self.backend.send_login_otp(&email).await {
            Ok(()) => {
                self.phase = AuthPhase::AwaitingOtp {
                    cooldown: RESEND_COOLDOWN_SECS,
                };
                self.set_info("A new verification code has been sent to your email.");
            }
            Err(e) => {
                let msg = e.to_string();
                // Re-enter the state the request came from
                self.phase = match prior {
                    Some(cooldown) => AuthPhase::AwaitingOtp { cooldown },
                    None => AuthPhase::Idle,
                };
                match classify_auth_error(&msg) {
                    ErrorClass::TooManyRequests | ErrorClass::TooManyAttempts => {
                        self.set_error("Too many attempts. Please try again in a few minutes.");
                    }
                    ErrorClass::UnconfirmedEmail | ErrorClass::Other => {
                        self.set_error(msg);
                    }
                }
            }
        }
    }

    /// Bounded poll for a session that may have been created out-of-band
    /// (the user clicked the emailed link elsewhere). Stops immediately
    /// when a session is found; gives multi-line guidance after the last
    /// miss. Returns true when a session was found.
    ///
    /// Dropping the returned future abandons the poll; no transitions
    /// happen afterwards.
    pub async fn check_session(&mut self) -> bool {
        let cooldown = match self.phase {
            AuthPhase::AwaitingOtp { cooldown } => cooldown,
            AuthPhase::Idle | AuthPhase::Submitting | AuthPhase::CheckingSession { .. } => {
                debug!(phase = ?self.phase, "Ignoring session check outside AwaitingOtp");
                return false;
            }
        };

        self.notice = None;
        let max = SESSION_CHECK_MAX_ATTEMPTS;

        for attempt in 1..=max {
            self.phase = AuthPhase::CheckingSession { attempt, max };

            match self.backend.get_session().await {
                Ok(Some(_)) => {
                    self.phase = AuthPhase::Idle;
                    self.set_info("Session detected. You will be redirected shortly...");
                    return true;
                }
                Ok(None) => {}
                Err(e) => {
                    // Treated the same as "no session yet"; the poll is
                    // the retry mechanism.
                    warn!(error = %e, attempt, "Session check failed");
                }
            }

            if attempt < max {
                self.set_info(format!(
                    "Checking for session... (Attempt {}/{})",
                    attempt + 1,
                    max
                ));
                tokio::time::sleep(SESSION_CHECK_DELAY).await;
            }
        }

        self.phase = AuthPhase::AwaitingOtp { cooldown };
        self.set_error(
            "No active session found. Please ensure you:\n\
             1. Clicked the most recent verification link\n\
             2. Used the link on this same device\n\
             You can try requesting a new code if needed.",
        );
        false
    }
}
