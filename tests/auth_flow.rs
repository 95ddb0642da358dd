use std::sync::Arc;
use std::time::Duration;

use habitforge::{
    AppState, AuthError, Config,
    navigation::{RecordingNavigator, Route},
    remote::{
        api::RemoteError,
        memory::{MemoryBackend, Operation},
    },
    services::auth::SignUpResult,
    session::machine::AuthState,
};

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "hunter22";

// Shared test context
struct TestContext {
    backend: Arc<MemoryBackend>,
    navigator: Arc<RecordingNavigator>,
    state: AppState<MemoryBackend, RecordingNavigator>,
}

impl TestContext {
    fn build(config: Config, backend: MemoryBackend) -> Self {
        let backend = Arc::new(backend);
        let navigator = Arc::new(RecordingNavigator::new());
        let state = AppState::new(&config, backend.clone(), navigator.clone());
        Self {
            backend,
            navigator,
            state,
        }
    }

    async fn start() -> Self {
        let backend = MemoryBackend::new();
        backend.register_user(EMAIL, PASSWORD);
        let context = Self::build(Config::offline(), backend);
        context.state.start().await;
        context
    }

    /// `user` is present exactly when the state is `Authenticated`.
    fn assert_consistent(&self) {
        let authenticated = matches!(self.state.auth.state(), AuthState::Authenticated(_));
        assert_eq!(self.state.auth.user().is_some(), authenticated);
    }

    async fn wait_for_state(&self, predicate: impl FnMut(&AuthState) -> bool) -> AuthState {
        tokio::time::timeout(Duration::from_secs(2), self.state.session().wait_for(predicate))
            .await
            .expect("state change timed out")
            .expect("session store closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_restore_without_session_is_anonymous() {
        let context = TestContext::start().await;

        assert_eq!(context.state.auth.state(), AuthState::Anonymous);
        assert!(!context.state.auth.is_loading());
        assert!(context.state.auth.get_session().await.is_none());
        context.assert_consistent();
    }

    #[tokio::test]
    async fn test_restore_failure_falls_back_to_anonymous() {
        let backend = MemoryBackend::new();
        backend.fail_next(Operation::GetSession, RemoteError::transport("offline"));
        let context = TestContext::build(Config::offline(), backend);

        assert!(context.state.auth.is_loading());
        context.state.start().await;

        assert_eq!(context.state.auth.state(), AuthState::Anonymous);
        context.assert_consistent();
    }

    #[tokio::test]
    async fn test_session_consistency_through_lifecycle() {
        let context = TestContext::start().await;
        context.assert_consistent();

        // Step 1: sign in
        let session = context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
        context.assert_consistent();
        assert_eq!(context.state.auth.user().map(|u| u.id), Some(session.user.id));

        // Step 2: the service revokes the session on its own
        context.backend.revoke_session();
        context
            .wait_for_state(|s| matches!(s, AuthState::Anonymous))
            .await;
        context.assert_consistent();
        assert!(context.state.auth.user().is_none());

        // Step 3: sign in again, then sign out locally
        context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
        context.assert_consistent();
        context.state.auth.sign_out().await.unwrap();
        context.assert_consistent();
        assert_eq!(context.state.auth.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_sign_in_errors_are_classified_by_code() {
        let context = TestContext::start().await;

        let err = context.state.auth.sign_in(EMAIL, "wrong-password").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(context.state.auth.state(), AuthState::Anonymous);

        let err = context.state.auth.sign_in("nobody@example.com", PASSWORD).await.unwrap_err();
        assert_eq!(err, AuthError::UserNotFound);

        context.backend.fail_next(
            Operation::SignIn,
            RemoteError::api(429, Some("over_request_rate_limit".to_string()), "Request rate limit reached"),
        );
        let err = context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap_err();
        assert_eq!(err, AuthError::RateLimited);

        // message text alone never decides the class
        context.backend.fail_next(
            Operation::SignIn,
            RemoteError::api(400, None, "Invalid login credentials"),
        );
        let err = context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap_err();
        assert_eq!(err, AuthError::Unknown);
        context.assert_consistent();
    }

    #[tokio::test]
    async fn test_sign_out_is_idempotent() {
        let context = TestContext::start().await;
        context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap();

        context.state.auth.sign_out().await.unwrap();
        let first = context.state.auth.state();
        context.state.auth.sign_out().await.unwrap();

        assert_eq!(context.state.auth.state(), first);
        assert_eq!(first, AuthState::Anonymous);
        // both calls reach the service, which treats the second as done
        assert_eq!(context.backend.call_count(Operation::SignOut), 2);
        assert!(context.backend.current_session().is_none());
    }

    #[tokio::test]
    async fn test_failed_sign_in_keeps_live_session() {
        let context = TestContext::start().await;
        let session = context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap();

        // Step 1: a second attempt with a wrong password
        let err = context.state.auth.sign_in(EMAIL, "wrong-password").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);

        // Step 2: the service still holds the first session, and so do we
        assert!(context.backend.current_session().is_some());
        assert_eq!(context.state.auth.user().map(|u| u.id), Some(session.user.id));
        context.assert_consistent();

        // Step 3: sign-out still invalidates it
        context.state.auth.sign_out().await.unwrap();
        assert!(context.backend.current_session().is_none());
        assert_eq!(context.state.auth.state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_sign_out_reaches_service_when_locally_anonymous() {
        let context = TestContext::start().await;
        context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap();

        // the local view loses the session while the service keeps it
        context.backend.fail_next(Operation::GetSession, RemoteError::transport("offline"));
        context.backend.fail_next(Operation::SignIn, RemoteError::transport("offline"));
        let err = context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap_err();
        assert_eq!(err, AuthError::Unknown);
        assert_eq!(context.state.auth.state(), AuthState::Anonymous);
        assert!(context.backend.current_session().is_some());

        context.state.auth.sign_out().await.unwrap();
        assert!(context.backend.current_session().is_none());
    }

    #[tokio::test]
    async fn test_redirects_follow_remote_events() {
        let context = TestContext::start().await;

        context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
        let history = context.navigator.wait_for_count(1).await;
        assert_eq!(history, vec![Route::Dashboard]);

        context.state.auth.sign_out().await.unwrap();
        let history = context.navigator.wait_for_count(2).await;
        assert_eq!(history, vec![Route::Dashboard, Route::Login]);
    }

    #[tokio::test]
    async fn test_single_subscription_released_on_stop() {
        let context = TestContext::start().await;
        assert_eq!(context.backend.subscriber_count(), 1);

        // starting twice keeps one listener
        context.state.start().await;
        assert_eq!(context.backend.subscriber_count(), 1);

        context.state.shutdown().await;
        assert_eq!(context.backend.subscriber_count(), 0);

        // no further redirects once stopped
        context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(context.navigator.history().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_starts_share_one_subscription() {
        let backend = MemoryBackend::new();
        backend.register_user(EMAIL, PASSWORD);
        backend.set_latency(Some(Duration::from_millis(20)));
        let context = TestContext::build(Config::offline(), backend);

        let (first, second) = tokio::join!(context.state.start(), context.state.start());

        assert_eq!(first, AuthState::Anonymous);
        assert_eq!(second, AuthState::Anonymous);
        assert_eq!(context.backend.subscriber_count(), 1);
        assert_eq!(context.backend.call_count(Operation::GetSession), 1);

        context.state.shutdown().await;
        assert_eq!(context.backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_state_releases_subscription() {
        let context = TestContext::start().await;
        let backend = context.backend.clone();
        assert_eq!(backend.subscriber_count(), 1);

        drop(context);
        // the aborted listener drops its receiver on the next scheduler pass
        for _ in 0..50 {
            if backend.subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(backend.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_sign_in_timeout_returns_to_anonymous() {
        let backend = MemoryBackend::new();
        backend.register_user(EMAIL, PASSWORD);
        let mut config = Config::offline();
        config.auth_timeout = Duration::from_millis(50);
        let context = TestContext::build(config, backend);
        context.state.start().await;

        context.backend.set_latency(Some(Duration::from_millis(500)));
        let err = context.state.auth.sign_in(EMAIL, PASSWORD).await.unwrap_err();

        assert_eq!(err, AuthError::Timeout);
        assert_eq!(context.state.auth.state(), AuthState::Anonymous);
        context.assert_consistent();
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile() {
        let context = TestContext::start().await;

        let result = context
            .state
            .auth
            .sign_up("Grace Hopper", "grace@example.com", "cobol1959")
            .await
            .unwrap();

        let SignUpResult::SignedIn(session) = result else {
            panic!("expected an immediate session");
        };
        assert_eq!(session.user.metadata_str("username"), Some("grace_hopper"));
        assert_eq!(session.user.metadata_str("full_name"), Some("Grace Hopper"));

        let profile = context.backend.profile(session.user.id).unwrap();
        assert_eq!(profile.username, "grace_hopper");
        assert_eq!(profile.leaderboard_nickname.as_deref(), Some("Grace Hopper"));
        assert!(context.state.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_up_profile_failure_is_reported() {
        let context = TestContext::start().await;
        context.backend.fail_next(
            Operation::UpsertProfile,
            RemoteError::api(409, Some("23505".to_string()), "duplicate key"),
        );

        let err = context
            .state
            .auth
            .sign_up("Grace Hopper", "grace@example.com", "cobol1959")
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Could not complete profile setup");
    }
}
