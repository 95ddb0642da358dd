//! Capability interfaces for the hosted auth/data service.
//!
//! Any provider offering equivalent primitives can stand behind these
//! traits; the crate ships an HTTP client and an in-memory backend.

use std::future::Future;

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{
    habit::{Habit, NewHabit},
    identity::{Identity, Metadata},
    preferences::Preferences,
    profile::Profile,
    session::Session,
};

/// Where a remote failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The service answered with an error body.
    Api,
    /// The request never completed (connect, TLS, timeout).
    Transport,
    /// The service answered but the body could not be decoded.
    Decode,
}

/// A failure reported by the remote service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote error (status: {status:?}, code: {code:?}): {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// HTTP status, when there was a response.
    pub status: Option<u16>,
    /// Structured error code (`invalid_credentials`, `42501`, ...).
    pub code: Option<String>,
    /// Free-text message. For logs only; never used for control flow.
    pub message: String,
}

impl RemoteError {
    pub fn api(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Api,
            status: Some(status),
            code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Transport,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::Decode,
            status: None,
            code: None,
            message: message.into(),
        }
    }
}

/// The kind of session transition the auth service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A session-change notification: the event plus the session after it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

impl SessionEvent {
    pub fn new(event: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Result of a sign-up call. `session` is absent when the service requires
/// email confirmation first.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: Option<Identity>,
    pub session: Option<Session>,
}

/// Hosted identity provider.
pub trait AuthApi: Send + Sync + 'static {
    /// The session the provider currently holds, refreshed if it expired.
    fn get_session(&self) -> impl Future<Output = Result<Option<Session>, RemoteError>> + Send;

    /// Registers a listener for session transitions. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Verifies credentials. `Ok(None)` means the call succeeded but no
    /// session was issued.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<Session>, RemoteError>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Metadata,
    ) -> impl Future<Output = Result<SignUpOutcome, RemoteError>> + Send;

    /// Invalidates the current session. Succeeds when there is none.
    fn sign_out(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn update_user_metadata(
        &self,
        fields: Metadata,
    ) -> impl Future<Output = Result<Identity, RemoteError>> + Send;
}

/// The `habits` table.
pub trait HabitTable: Send + Sync + 'static {
    fn select_habits(&self, user_id: Uuid) -> impl Future<Output = Result<Vec<Habit>, RemoteError>> + Send;

    fn insert_habit(&self, habit: &NewHabit) -> impl Future<Output = Result<Habit, RemoteError>> + Send;

    /// Sets `streak_days` on one row and returns the stored row.
    fn update_streak(
        &self,
        habit_id: Uuid,
        streak_days: u32,
    ) -> impl Future<Output = Result<Habit, RemoteError>> + Send;
}

/// The `profiles` table.
pub trait ProfileTable: Send + Sync + 'static {
    fn select_profile(&self, user_id: Uuid) -> impl Future<Output = Result<Option<Profile>, RemoteError>> + Send;

    /// Inserts or overwrites the row with the same `id`.
    fn upsert_profile(&self, profile: &Profile) -> impl Future<Output = Result<Profile, RemoteError>> + Send;

    fn update_avatar_url(
        &self,
        user_id: Uuid,
        avatar_url: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// The `user_preferences` table.
pub trait PreferencesTable: Send + Sync + 'static {
    fn select_preferences(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<Preferences>, RemoteError>> + Send;

    /// Inserts or overwrites the row with the same `user_id`.
    fn upsert_preferences(
        &self,
        preferences: &Preferences,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Blob storage for avatar images.
pub trait BlobStorage: Send + Sync + 'static {
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Everything the application consumes from the hosted service.
pub trait Backend: AuthApi + HabitTable + ProfileTable + PreferencesTable + BlobStorage {}

impl<T> Backend for T where T: AuthApi + HabitTable + ProfileTable + PreferencesTable + BlobStorage {}
