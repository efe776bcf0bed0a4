//! Process-wide "current user" view.
//!
//! `AuthContext` owns a listener task that bootstraps from the persisted
//! session and then follows the backend's session-change notifications.
//! The listener is the sole writer of the shared snapshot; screens and
//! flows only read it. Consumers must not branch on `user` while `loading`
//! is still true.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::BackendError;
use crate::auth::backend::{AuthResponse, IdentityBackend, SessionChange};
use crate::auth::flow::normalize_email;
use crate::auth::session::{SessionData, UserIdentity};

/// Read-only view of the current authentication state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthSnapshot {
    pub user: Option<UserIdentity>,
    pub session: Option<SessionData>,
    /// True from initialization until the first of (initial session fetch
    /// resolves) or (first change notification fires).
    pub loading: bool,
}

impl AuthSnapshot {
    fn from_session(session: Option<SessionData>) -> Self {
        Self {
            user: session.as_ref().map(|s| s.user.clone()),
            session,
            loading: false,
        }
    }
}

/// Owned state cell for the current user, injected into consumers instead
/// of being reached for as an ambient global.
pub struct AuthContext<B: IdentityBackend + ?Sized> {
    backend: Arc<B>,
    rx: watch::Receiver<AuthSnapshot>,
    listener: JoinHandle<()>,
}

impl<B: IdentityBackend + ?Sized + 'static> AuthContext<B> {
    /// Initialize the context: subscribe to change notifications first so
    /// none are missed, then fetch the persisted session.
    pub fn init(backend: Arc<B>) -> Self {
        let (tx, rx) = watch::channel(AuthSnapshot {
            user: None,
            session: None,
            loading: true,
        });

        let changes = backend.subscribe();
        let task_backend = Arc::clone(&backend);
        let listener = tokio::spawn(Self::run_listener(task_backend, changes, tx));

        Self {
            backend,
            rx,
            listener,
        }
    }

    async fn run_listener(
        backend: Arc<B>,
        mut changes: broadcast::Receiver<SessionChange>,
        tx: watch::Sender<AuthSnapshot>,
    ) {
        match backend.get_session().await {
            Ok(session) => {
                Self::publish(&tx, AuthSnapshot::from_session(session));
            }
            Err(e) => {
                warn!(error = %e, "Initial session fetch failed");
                Self::publish(&tx, AuthSnapshot::from_session(None));
            }
        }

        loop {
            match changes.recv().await {
                Ok(SessionChange::SignedIn(session))
                | Ok(SessionChange::TokenRefreshed(session)) => {
                    Self::publish(&tx, AuthSnapshot::from_session(Some(session)));
                }
                Ok(SessionChange::SignedOut) => {
                    Self::publish(&tx, AuthSnapshot::from_session(None));
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Fall back to the durable store to resynchronize
                    warn!(missed, "Session change listener lagged");
                    if let Ok(session) = backend.get_session().await {
                        Self::publish(&tx, AuthSnapshot::from_session(session));
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Session change channel closed");
                    break;
                }
            }
        }
    }

    /// Publish a snapshot, suppressing no-op updates so a duplicate
    /// notification cannot cause a double transition downstream.
    fn publish(tx: &watch::Sender<AuthSnapshot>, next: AuthSnapshot) {
        tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn current(&self) -> AuthSnapshot {
        self.rx.borrow().clone()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.rx.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.rx.borrow().loading
    }

    pub fn is_authenticated(&self) -> bool {
        let snapshot = self.rx.borrow();
        !snapshot.loading && snapshot.user.is_some()
    }

    /// A receiver for awaiting snapshot updates.
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.rx.clone()
    }

    // ------------------------------------------------------------------
    // Backend delegation (never writes the snapshot directly)
    // ------------------------------------------------------------------

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        self.backend
            .sign_in_with_password(&normalize_email(email), password)
            .await
    }

    /// Backward-compatible two-argument sign-up; passes an empty full
    /// name. The dedicated sign-up screen calls `AuthFlow::sign_up` with
    /// the full set of fields instead.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        self.backend
            .sign_up_start("", &normalize_email(email), password)
            .await
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        self.backend.sign_out().await
    }
}

impl<B: IdentityBackend + ?Sized> Drop for AuthContext<B> {
    fn drop(&mut self) {
        // Teardown: stop listening for change notifications
        self.listener.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::mock::MockBackend;
    use std::time::Duration;

    async fn settled(ctx: &AuthContext<MockBackend>) -> AuthSnapshot {
        let mut rx = ctx.watch();
        // Wait out the bootstrap
        while rx.borrow().loading {
            rx.changed().await.unwrap();
        }
        let snapshot = rx.borrow().clone();
        snapshot
    }

    #[tokio::test]
    async fn test_loading_clears_after_bootstrap_without_session() {
        let backend = MockBackend::new();
        let ctx = AuthContext::init(backend);

        let snapshot = settled(&ctx).await;
        assert!(!snapshot.loading);
        assert!(snapshot.user.is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_restores_persisted_session() {
        let backend = MockBackend::new();
        backend.push_session(Some(MockBackend::sample_session()));
        let ctx = AuthContext::init(backend);

        let snapshot = settled(&ctx).await;
        assert_eq!(snapshot.user.unwrap().email, "jane@x.com");
    }

    #[tokio::test]
    async fn test_sign_in_notification_updates_snapshot() {
        let backend = MockBackend::new();
        let ctx = AuthContext::init(backend.clone());
        settled(&ctx).await;

        let mut rx = ctx.watch();
        backend.emit(SessionChange::SignedIn(MockBackend::sample_session()));
        rx.changed().await.unwrap();

        assert!(ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_duplicate_notification_is_not_a_second_transition() {
        let backend = MockBackend::new();
        let ctx = AuthContext::init(backend.clone());
        settled(&ctx).await;

        let session = MockBackend::sample_session();
        let mut rx = ctx.watch();
        backend.emit(SessionChange::SignedIn(session.clone()));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().user.is_some());

        // Identical second emission must not re-notify consumers
        backend.emit(SessionChange::SignedIn(session));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_notification_clears_user() {
        let backend = MockBackend::new();
        backend.push_session(Some(MockBackend::sample_session()));
        let ctx = AuthContext::init(backend.clone());
        settled(&ctx).await;
        assert!(ctx.is_authenticated());

        let mut rx = ctx.watch();
        ctx.sign_out().await.unwrap();
        rx.changed().await.unwrap();

        assert!(ctx.user().is_none());
        assert_eq!(backend.call_count("sign_out"), 1);
    }

    #[tokio::test]
    async fn test_context_delegates_compat_sign_up_with_empty_name() {
        let backend = MockBackend::new();
        backend.push_sign_up(Ok(Default::default()));
        let ctx = AuthContext::init(backend.clone());
        settled(&ctx).await;

        ctx.sign_up(" Jane@X.com ", "Secret123").await.unwrap();

        assert_eq!(backend.call_count("sign_up_start"), 1);
        assert_eq!(backend.last_email(), Some("jane@x.com".to_string()));
    }
}
