use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{
    Mutex,
    broadcast::{self, error::RecvError},
};
use tokio::task::JoinHandle;

use crate::error::{AppError, AuthError, Result};
use crate::models::{
    identity::{Identity, metadata_from},
    profile::{Profile, username_from_name},
    session::Session,
};
use crate::navigation::{Navigator, Route};
use crate::remote::api::{AuthApi, AuthChangeEvent, ProfileTable, RemoteError, SessionEvent};
use crate::session::{
    machine::{AuthState, AuthTransition},
    store::{SessionStore, SessionWriter},
};

/// What a completed sign-up left behind.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpResult {
    /// The service issued a session right away.
    SignedIn(Session),
    /// The account exists but the email address must be confirmed first.
    ConfirmationRequired(Identity),
}

/// Exposes sign-in, sign-out and the current user to the rest of the app.
///
/// The façade is the only holder of the [`SessionWriter`]. Once started it
/// keeps exactly one subscription to the service's session notifications,
/// applies them to the store and redirects on `SIGNED_IN`/`SIGNED_OUT`.
pub struct AuthFacade<R: AuthApi, N: Navigator> {
    remote: Arc<R>,
    navigator: Arc<N>,
    writer: Arc<SessionWriter>,
    store: SessionStore,
    auth_timeout: Duration,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<R: AuthApi, N: Navigator> AuthFacade<R, N> {
    /// Creates a new `AuthFacade` in the `Unknown` state.
    ///
    /// # Arguments
    ///
    /// * `remote` - The auth service.
    /// * `navigator` - Where redirects go.
    /// * `auth_timeout` - Upper bound for each auth call.
    pub fn new(remote: Arc<R>, navigator: Arc<N>, auth_timeout: Duration) -> Self {
        let (store, writer) = SessionStore::channel();
        Self {
            remote,
            navigator,
            writer: Arc::new(writer),
            store,
            auth_timeout,
            listener: Mutex::new(None),
        }
    }

    /// A read handle on the session state.
    pub fn store(&self) -> SessionStore {
        self.store.clone()
    }

    pub fn state(&self) -> AuthState {
        self.store.state()
    }

    pub fn user(&self) -> Option<Identity> {
        self.store.user()
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    /// Restores the stored session and starts listening for remote session
    /// changes. Calling it on a started façade does nothing.
    ///
    /// The listener slot stays locked for the whole call, so overlapping
    /// starts share one subscription.
    pub async fn start(&self) -> AuthState {
        let mut listener = self.listener.lock().await;
        if listener.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::debug!("Auth listener already running");
            return self.store.state();
        }

        // subscribe before restoring so no transition slips between the two
        let events = self.remote.subscribe();
        let state = self.restore().await;

        let handle = tokio::spawn(listen(events, self.writer.clone(), self.navigator.clone()));
        *listener = Some(handle);
        tracing::info!("✅ Auth listener started ({})", state.as_str());

        state
    }

    /// Stops the listener and releases the remote subscription.
    pub async fn stop(&self) {
        let handle = self.listener.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            tracing::debug!("Auth listener stopped");
        }
    }

    /// Reconciles the cached state with the service.
    async fn restore(&self) -> AuthState {
        let session = self.remote_session().await;
        self.writer.apply(AuthTransition::Restored(session))
    }

    /// The session the service currently holds. Failures count as none.
    async fn remote_session(&self) -> Option<Session> {
        match self.bounded(self.remote.get_session()).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                tracing::warn!("❌ Session lookup failed: {}", e);
                None
            }
            Err(AuthError::Timeout) => {
                tracing::warn!("❌ Session lookup timed out");
                None
            }
            Err(_) => None,
        }
    }

    /// Returns the current session.
    ///
    /// While the state is still `Unknown` this asks the service first, so the
    /// first caller after start-up never sees a stale cache.
    pub async fn get_session(&self) -> Option<Session> {
        if matches!(self.store.state(), AuthState::Unknown) {
            self.restore().await;
        }
        self.store.session()
    }

    async fn bounded<F, T>(&self, call: F) -> std::result::Result<T, AuthError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.auth_timeout, call)
            .await
            .map_err(|_| AuthError::Timeout)
    }

    /// Signs a user in with email and password.
    ///
    /// # Arguments
    ///
    /// * `email` - The user's email address.
    /// * `password` - The user's password.
    ///
    /// # Returns
    ///
    /// The new session. A successful call that yields no session is an
    /// `AuthError::Unknown`. On failure the state falls back to whatever
    /// session the service still holds.
    pub async fn sign_in(&self, email: &str, password: &str) -> std::result::Result<Session, AuthError> {
        tracing::debug!("🔐 Signing in: {}", email);
        self.writer.apply(AuthTransition::SignInStarted);

        let result = match self.bounded(self.remote.sign_in_with_password(email, password)).await {
            Err(timeout) => Err(timeout),
            Ok(Err(e)) => Err(classify_auth(&e)),
            Ok(Ok(None)) => {
                tracing::error!("❌ Sign-in reported success without a session");
                Err(AuthError::Unknown)
            }
            Ok(Ok(Some(session))) => Ok(session),
        };

        match &result {
            Ok(session) => {
                self.writer.apply(AuthTransition::SignInSucceeded(session.clone()));
                tracing::info!("✅ User signed in: {}", session.user.id);
            }
            Err(e) => {
                tracing::warn!("❌ Sign-in failed: {}", e);
                let held = self.remote_session().await;
                self.writer.apply(AuthTransition::SignInFailed(held));
            }
        }

        result
    }

    /// Signs the current user out.
    ///
    /// The service is always asked, even when the local state is already
    /// `Anonymous`; both providers treat a missing session as done.
    pub async fn sign_out(&self) -> std::result::Result<(), AuthError> {
        let user_id = self.store.user_id();
        match self.bounded(self.remote.sign_out()).await? {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!("❌ Sign-out failed: {}", e);
                return Err(classify_auth(&e));
            }
        }

        self.writer.apply(AuthTransition::SignedOut);
        if let Some(id) = user_id {
            tracing::info!("✅ User signed out: {}", id);
        }
        Ok(())
    }
}

impl<R: AuthApi + ProfileTable, N: Navigator> AuthFacade<R, N> {
    /// Creates an account and its profile row.
    ///
    /// The username is derived from `name` (lowercased, whitespace replaced
    /// by `_`) and stored both in the user metadata and in `profiles`.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<SignUpResult> {
        let name = name.trim();
        let username = username_from_name(name);
        tracing::debug!("📝 Signing up: {} as {}", email, username);

        let metadata = metadata_from([("full_name", name), ("username", username.as_str())]);
        let outcome = match self.bounded(self.remote.sign_up(email, password, metadata)).await? {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("❌ Sign-up failed: {}", e);
                return Err(AppError::Auth(classify_auth(&e)));
            }
        };

        let Some(user) = outcome.user else {
            tracing::error!("❌ Sign-up returned no user");
            return Err(AuthError::Unknown.into());
        };
        tracing::info!("✅ User registered: {}", user.id);

        let profile = Profile {
            id: user.id,
            username,
            leaderboard_nickname: Some(name.to_string()),
            avatar_url: None,
        };

        match outcome.session {
            Some(session) => {
                self.writer.apply(AuthTransition::SignInSucceeded(session.clone()));
                if let Err(e) = self.remote.upsert_profile(&profile).await {
                    tracing::error!("❌ Profile creation failed: {}", e);
                    return Err(AppError::Validation("Could not complete profile setup".to_string()));
                }
                tracing::info!("✅ Profile created for {}", user.id);
                Ok(SignUpResult::SignedIn(session))
            }
            None => {
                tracing::info!("📧 Email confirmation pending for {}", user.id);
                Ok(SignUpResult::ConfirmationRequired(user))
            }
        }
    }
}

impl<R: AuthApi, N: Navigator> Drop for AuthFacade<R, N> {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

fn classify_auth(err: &RemoteError) -> AuthError {
    let classified = AuthError::classify(err);
    if classified == AuthError::Unknown {
        tracing::debug!(
            "Unclassified auth error (status: {:?}, code: {:?})",
            err.status,
            err.code
        );
    }
    classified
}

/// Applies remote session notifications until the channel closes.
async fn listen<N: Navigator>(
    mut events: broadcast::Receiver<SessionEvent>,
    writer: Arc<SessionWriter>,
    navigator: Arc<N>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let kind = event.event;
                writer.apply(AuthTransition::Remote(event));
                match kind {
                    AuthChangeEvent::SignedIn => navigator.navigate(Route::POST_LOGIN),
                    AuthChangeEvent::SignedOut => navigator.navigate(Route::POST_LOGOUT),
                    AuthChangeEvent::TokenRefreshed | AuthChangeEvent::UserUpdated => {}
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("⚠️ Missed {} session notifications", skipped);
            }
            Err(RecvError::Closed) => {
                tracing::debug!("Session notification channel closed");
                break;
            }
        }
    }
}
