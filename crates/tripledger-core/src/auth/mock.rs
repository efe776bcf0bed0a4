//! In-memory identity backend for state-machine and context tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::broadcast;

use crate::api::BackendError;
use crate::auth::backend::{AuthResponse, IdentityBackend, OtpPurpose, SessionChange};
use crate::auth::session::{SessionData, UserIdentity};

type Scripted<T> = Mutex<VecDeque<Result<T, BackendError>>>;

/// Scripted backend: each operation pops its next queued answer. An empty
/// queue means "succeed with nothing" for get_session and "reject" for the
/// credential operations, which keeps unscripted paths loud in tests.
pub struct MockBackend {
    sign_in: Scripted<AuthResponse>,
    sign_up: Scripted<AuthResponse>,
    otp: Scripted<()>,
    verify: Scripted<AuthResponse>,
    sessions: Scripted<Option<SessionData>>,
    calls: Mutex<Vec<String>>,
    emails: Mutex<Vec<String>>,
    changes: broadcast::Sender<SessionChange>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            sign_in: Mutex::new(VecDeque::new()),
            sign_up: Mutex::new(VecDeque::new()),
            otp: Mutex::new(VecDeque::new()),
            verify: Mutex::new(VecDeque::new()),
            sessions: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            emails: Mutex::new(Vec::new()),
            changes,
        })
    }

    pub fn sample_session() -> SessionData {
        SessionData {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            user: UserIdentity {
                id: "u-1".to_string(),
                email: "jane@x.com".to_string(),
                full_name: Some("Jane Doe".to_string()),
            },
            expires_at: Utc::now() + Duration::hours(1),
            created_at: Utc::now(),
        }
    }

    pub fn push_sign_in(&self, result: Result<AuthResponse, BackendError>) {
        self.sign_in.lock().unwrap().push_back(result);
    }

    pub fn push_sign_up(&self, result: Result<AuthResponse, BackendError>) {
        self.sign_up.lock().unwrap().push_back(result);
    }

    pub fn push_otp(&self, result: Result<(), BackendError>) {
        self.otp.lock().unwrap().push_back(result);
    }

    pub fn push_verify(&self, result: Result<AuthResponse, BackendError>) {
        self.verify.lock().unwrap().push_back(result);
    }

    pub fn push_session(&self, session: Option<SessionData>) {
        self.sessions.lock().unwrap().push_back(Ok(session));
    }

    pub fn push_session_err(&self, error: BackendError) {
        self.sessions.lock().unwrap().push_back(Err(error));
    }

    /// Emit a session-change notification as the provider would.
    pub fn emit(&self, change: SessionChange) {
        let _ = self.changes.send(change);
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    /// Email passed to the most recent credential operation.
    pub fn last_email(&self) -> Option<String> {
        self.emails.lock().unwrap().last().cloned()
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }

    fn record_email(&self, email: &str) {
        self.emails.lock().unwrap().push(email.to_string());
    }

    fn unscripted(op: &str) -> BackendError {
        BackendError::Api {
            status: 500,
            message: format!("unscripted {op} call"),
        }
    }
}

#[async_trait]
impl IdentityBackend for MockBackend {
    async fn sign_up_start(
        &self,
        _full_name: &str,
        email: &str,
        _password: &str,
    ) -> Result<AuthResponse, BackendError> {
        self.record("sign_up_start");
        self.record_email(email);
        self.sign_up
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("sign_up_start")))
    }

    async fn send_login_otp(&self, email: &str) -> Result<(), BackendError> {
        self.record("send_login_otp");
        self.record_email(email);
        self.otp
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("send_login_otp")))
    }

    async fn verify_otp(
        &self,
        email: &str,
        _code: &str,
        _purpose: OtpPurpose,
    ) -> Result<AuthResponse, BackendError> {
        self.record("verify_otp");
        self.record_email(email);
        self.verify
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("verify_otp")))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<AuthResponse, BackendError> {
        self.record("sign_in_with_password");
        self.record_email(email);
        self.sign_in
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("sign_in_with_password")))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.record("sign_out");
        let _ = self.changes.send(SessionChange::SignedOut);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<SessionData>, BackendError> {
        self.record("get_session");
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}
