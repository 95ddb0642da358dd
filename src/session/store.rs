use tokio::sync::watch;

use crate::models::{identity::Identity, session::Session};
use crate::session::machine::{self, AuthState, AuthTransition};

/// Read side of the process-wide session holder.
///
/// Cheap to clone; every page and service holds one. Changes are published
/// through a `watch` channel, so readers always see the latest state.
#[derive(Clone, Debug)]
pub struct SessionStore {
    rx: watch::Receiver<AuthState>,
}

/// The only handle that can change the auth state. Owned by the auth façade.
#[derive(Debug)]
pub struct SessionWriter {
    tx: watch::Sender<AuthState>,
}

impl SessionStore {
    /// Creates a store in the `Unknown` state and its single writer.
    pub fn channel() -> (SessionStore, SessionWriter) {
        let (tx, rx) = watch::channel(AuthState::Unknown);
        (SessionStore { rx }, SessionWriter { tx })
    }

    pub fn state(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.rx.borrow().session().cloned()
    }

    pub fn user(&self) -> Option<Identity> {
        self.rx.borrow().user().cloned()
    }

    pub fn user_id(&self) -> Option<uuid::Uuid> {
        self.rx.borrow().user().map(|u| u.id)
    }

    pub fn is_loading(&self) -> bool {
        self.rx.borrow().is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.rx.borrow(), AuthState::Authenticated(_))
    }

    /// A receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.rx.clone()
    }

    /// Waits until the state satisfies `predicate` and returns it.
    pub async fn wait_for<F>(&self, predicate: F) -> Option<AuthState>
    where
        F: FnMut(&AuthState) -> bool,
    {
        let mut rx = self.rx.clone();
        let state = rx.wait_for(predicate).await.ok().map(|state| state.clone());
        state
    }
}

impl SessionWriter {
    /// Applies a transition and returns the resulting state.
    pub fn apply(&self, transition: AuthTransition) -> AuthState {
        self.tx.send_modify(|state| {
            let previous = state.as_str();
            *state = machine::next(state, transition);
            tracing::debug!("🔄 Auth state {} -> {}", previous, state.as_str());
        });
        self.tx.borrow().clone()
    }
}
