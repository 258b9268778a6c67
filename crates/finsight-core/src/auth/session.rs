//! The authentication state machine.
//!
//! `AuthSession` is the only writer of `SessionState` and of the session
//! store. Every transition takes one lock, writes the store, then publishes
//! the new state, so observers never see a state the store disagrees with.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, AuthorizedClient};
use crate::models::{Credential, Identity, Registration};

use super::error::{LoginError, RegisterError};
use super::state::SessionState;
use super::store::SessionStore;

/// Handle to the application's authentication session.
/// Clone is cheap; all clones share one state machine.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Inner>,
}

struct Inner {
    store: SessionStore,
    api: ApiClient,
    state: watch::Sender<SessionState>,
    /// Bumped on every logout/invalidation; in-flight logins compare against it
    epoch: AtomicU64,
    booted: AtomicBool,
    transition: Mutex<()>,
}

impl AuthSession {
    /// Create a session in the `Unresolved` state. Call `boot` to restore.
    pub fn new(store: SessionStore, api: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionState::Unresolved);
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                state,
                epoch: AtomicU64::new(0),
                booted: AtomicBool::new(false),
                transition: Mutex::new(()),
            }),
        }
    }

    /// Create a session and immediately restore it from the store.
    pub fn start(store: SessionStore, api: ApiClient) -> Self {
        let session = Self::new(store, api);
        session.boot();
        session
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a state, notifying observers only when it actually changed.
    fn publish(&self, next: SessionState) {
        self.inner.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                debug!(from = current.label(), to = next.label(), "Session state transition");
                *current = next;
                true
            }
        });
    }

    /// Boot-time restore. Only the first call has an effect, and only while
    /// nothing else has resolved the state yet.
    pub fn boot(&self) -> SessionState {
        if self.inner.booted.swap(true, Ordering::SeqCst) {
            debug!("Session already booted");
            return self.state();
        }

        let _guard = self.lock();
        if self.state().is_resolved() {
            debug!("Session resolved before boot, skipping restore");
            return self.state();
        }

        let next = match self.inner.store.restore() {
            Some(stored) => SessionState::Authenticated(stored.identity),
            None => SessionState::Unauthenticated,
        };
        info!(state = next.label(), "Session restored");
        self.publish(next);
        self.state()
    }

    /// Sign in with a credential. The credential is dropped when this returns.
    pub async fn login(&self, credential: Credential) -> Result<Identity, LoginError> {
        if !credential.is_complete() {
            return Err(LoginError::MissingCredentials);
        }

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        info!(identifier = %credential.identifier.trim(), "Attempting login");

        let result = self.inner.api.login(&credential).await;
        drop(credential);

        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                error!(error = %e, "Login failed");
                return Err(LoginError::from_api(&e));
            }
        };

        let _guard = self.lock();
        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            warn!("Discarding login that completed after the session was ended");
            return Err(LoginError::Superseded);
        }

        if let Err(e) = self.inner.store.save(&grant.token, &grant.identity) {
            error!(error = %e, "Failed to persist session");
            self.reconcile_with_store();
            return Err(LoginError::Storage);
        }

        self.publish(SessionState::Authenticated(grant.identity.clone()));
        info!("Login successful");
        Ok(grant.identity)
    }

    /// After a failed save, adopt whatever the store now restores.
    fn reconcile_with_store(&self) {
        let next = match self.inner.store.restore() {
            Some(stored) => SessionState::Authenticated(stored.identity),
            None => SessionState::Unauthenticated,
        };
        self.publish(next);
    }

    /// End the session locally. Never fails.
    pub fn logout(&self) {
        self.end_session();
        info!("Logged out");
    }

    /// The remote authority rejected the token; end the session.
    pub fn invalidate(&self) {
        self.end_session();
        warn!("Session invalidated by the server");
    }

    fn end_session(&self) {
        let _guard = self.lock();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        self.publish(SessionState::Unauthenticated);
    }

    /// Create an account. Never establishes a session.
    pub async fn register(&self, registration: Registration) -> Result<(), RegisterError> {
        registration.validate()?;
        info!(identifier = %registration.identifier.trim(), "Registering account");

        if let Err(e) = self.inner.api.register(&registration).await {
            error!(error = %e, "Registration failed");
            return Err(RegisterError::from_api(&e));
        }
        info!("Registration succeeded");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    /// Current bearer token, only while authenticated.
    pub fn token(&self) -> Option<String> {
        if !self.is_authenticated() {
            return None;
        }
        self.inner.store.token()
    }

    /// Request layer that attaches this session's token.
    pub fn authorized_client(&self) -> AuthorizedClient {
        AuthorizedClient::new(self.inner.api.clone(), self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::medium::{MemoryMedium, StorageMedium};
    use crate::config::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Memory medium that refuses to write the identity field.
    struct IdentityWritesFail(MemoryMedium);

    impl StorageMedium for IdentityWritesFail {
        fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.read(key)
        }

        fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
            if key == "identity" {
                anyhow::bail!("disk full");
            }
            self.0.write(key, value)
        }

        fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.0.remove(key)
        }
    }

    fn api() -> ApiClient {
        ApiClient::new(&Config::default()).unwrap()
    }

    fn stored_medium() -> MemoryMedium {
        MemoryMedium::new()
            .with_field("token", "t1")
            .with_field("identity", r#"{"email":"a@b.com"}"#)
    }

    #[test]
    fn test_new_session_is_unresolved() {
        let session = AuthSession::new(SessionStore::new(stored_medium()), api());
        assert_eq!(session.state(), SessionState::Unresolved);
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_boot_restores_stored_session() {
        let session = AuthSession::start(SessionStore::new(stored_medium()), api());
        assert_eq!(
            session.state(),
            SessionState::Authenticated(Identity::new("a@b.com"))
        );
        assert_eq!(session.token().as_deref(), Some("t1"));
    }

    #[test]
    fn test_boot_takes_effect_once() {
        let session = AuthSession::start(SessionStore::new(stored_medium()), api());
        session.logout();
        assert_eq!(session.boot(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_logout_before_boot_wins() {
        let session = AuthSession::new(SessionStore::new(stored_medium()), api());
        session.logout();
        assert_eq!(session.boot(), SessionState::Unauthenticated);
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let session = AuthSession::start(SessionStore::new(stored_medium()), api());
        let mut rx = session.subscribe();
        rx.borrow_and_update();

        session.logout();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        session.logout();
        assert!(!rx.has_changed().unwrap());
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_invalidate_clears_store() {
        let session = AuthSession::start(SessionStore::new(stored_medium()), api());
        session.invalidate();
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.inner.store.restore(), None);
    }

    #[tokio::test]
    async fn test_login_with_missing_credentials_fails_locally() {
        let session = AuthSession::start(SessionStore::new(MemoryMedium::new()), api());
        let result = session.login(Credential::new("", "secret")).await;
        assert_eq!(result, Err(LoginError::MissingCredentials));
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_save_failure_reconciles_with_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "t2",
                "identity": { "email": "b@c.com" }
            })))
            .mount(&server)
            .await;

        let config = Config {
            api_url: server.uri(),
            ..Config::default()
        };
        let store = SessionStore::new(IdentityWritesFail(stored_medium()));
        let session = AuthSession::start(store, ApiClient::new(&config).unwrap());
        assert!(session.is_authenticated());

        let result = session.login(Credential::new("b@c.com", "secret")).await;

        assert_eq!(result, Err(LoginError::Storage));
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.inner.store.restore(), None);
        assert_eq!(session.token(), None);
    }

    #[tokio::test]
    async fn test_register_validates_before_sending() {
        let session = AuthSession::start(SessionStore::new(MemoryMedium::new()), api());
        let result = session
            .register(Registration {
                name: "Ana".to_string(),
                identifier: "not-an-email".to_string(),
                secret: "hunter22".to_string(),
                confirmation: "hunter22".to_string(),
            })
            .await;
        assert!(matches!(result, Err(RegisterError::Invalid(_))));
    }
}
