//! Auth state machine.
//!
//! `Unknown` until the stored session is restored, then `Authenticated` or
//! `Anonymous`. A sign-in passes through `Authenticating`. Remote
//! notifications always win over local assumptions.

use crate::models::{identity::Identity, session::Session};
use crate::remote::api::{AuthChangeEvent, SessionEvent};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// Session restore has not resolved yet.
    #[default]
    Unknown,
    /// A sign-in call is in flight.
    Authenticating,
    Authenticated(Session),
    Anonymous,
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Non-null iff the state is `Authenticated`.
    pub fn user(&self) -> Option<&Identity> {
        self.session().map(|s| &s.user)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Unknown | AuthState::Authenticating)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Unknown => "unknown",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated(_) => "authenticated",
            AuthState::Anonymous => "anonymous",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthTransition {
    /// The provider answered the initial session lookup.
    Restored(Option<Session>),
    SignInStarted,
    SignInSucceeded(Session),
    /// The sign-in call failed; carries the session the service still holds.
    SignInFailed(Option<Session>),
    /// Local sign-out completed.
    SignedOut,
    /// A notification from the provider.
    Remote(SessionEvent),
}

/// Computes the state after `transition`.
pub fn next(state: &AuthState, transition: AuthTransition) -> AuthState {
    match transition {
        AuthTransition::Restored(session) => match state {
            // an in-flight sign-in resolves on its own
            AuthState::Authenticating => state.clone(),
            _ => from_session(session),
        },
        AuthTransition::SignInStarted => AuthState::Authenticating,
        AuthTransition::SignInSucceeded(session) => AuthState::Authenticated(session),
        AuthTransition::SignInFailed(held) => match state {
            AuthState::Authenticating => from_session(held),
            _ => state.clone(),
        },
        AuthTransition::SignedOut => AuthState::Anonymous,
        AuthTransition::Remote(event) => match event.event {
            AuthChangeEvent::SignedOut => AuthState::Anonymous,
            AuthChangeEvent::SignedIn
            | AuthChangeEvent::TokenRefreshed
            | AuthChangeEvent::UserUpdated => match event.session {
                Some(session) => AuthState::Authenticated(session),
                None => AuthState::Anonymous,
            },
        },
    }
}

fn from_session(session: Option<Session>) -> AuthState {
    match session {
        Some(session) => AuthState::Authenticated(session),
        None => AuthState::Anonymous,
    }
}
