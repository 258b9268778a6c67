//! Route-access gate for protected views.
//!
//! The guard is a pure function of `SessionState`. `AccessGuard` only adds a
//! watch receiver so callers can re-evaluate whenever the state changes.

use futures::stream::{self, Stream};
use tokio::sync::watch;

use crate::models::Identity;

use super::session::AuthSession;
use super::state::SessionState;

/// Outcome of gating a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate<T> {
    /// Boot restore has not finished: show a neutral placeholder, no redirect.
    Pending,
    /// Not signed in: go to the login entry point.
    RedirectToLogin,
    /// Signed in: the rendered protected view.
    Render(T),
}

impl<T> Gate<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Gate::Pending)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Gate::RedirectToLogin)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Gate<U> {
        match self {
            Gate::Pending => Gate::Pending,
            Gate::RedirectToLogin => Gate::RedirectToLogin,
            Gate::Render(view) => Gate::Render(f(view)),
        }
    }
}

/// Gate a protected view on the given state. `render` runs only when
/// the state is authenticated.
pub fn gate<T>(state: &SessionState, render: impl FnOnce(&Identity) -> T) -> Gate<T> {
    match state {
        SessionState::Unresolved => Gate::Pending,
        SessionState::Unauthenticated => Gate::RedirectToLogin,
        SessionState::Authenticated(identity) => Gate::Render(render(identity)),
    }
}

pub struct AccessGuard {
    rx: watch::Receiver<SessionState>,
}

impl AccessGuard {
    pub fn new(session: &AuthSession) -> Self {
        Self {
            rx: session.subscribe(),
        }
    }

    /// Gate against the latest state.
    pub fn check<T>(&self, render: impl FnOnce(&Identity) -> T) -> Gate<T> {
        // Clone first so `render` may call back into the session
        let state = self.rx.borrow().clone();
        gate(&state, render)
    }

    /// True when a transition happened since the last `changed`/`mark_seen`.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    pub fn mark_seen(&mut self) {
        self.rx.mark_unchanged();
    }

    /// Wait for the next transition. `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stream of states: the current one first, then every transition.
    pub fn transitions(&self) -> impl Stream<Item = SessionState> {
        stream::unfold((self.rx.clone(), true), |(mut rx, first)| async move {
            if !first {
                rx.changed().await.ok()?;
            }
            let state = rx.borrow_and_update().clone();
            Some((state, (rx, false)))
        })
    }
}
