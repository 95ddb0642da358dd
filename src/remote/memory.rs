//! In-process stand-in for the hosted auth/data service.
//!
//! Enforces the same row-level rule as the hosted store (a caller only sees
//! and writes rows owned by its session identity), emits session-change
//! notifications, and lets tests inject failures and latency.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::models::{
    habit::{Habit, NewHabit},
    identity::{Identity, Metadata},
    preferences::Preferences,
    profile::Profile,
    session::Session,
};
use crate::remote::api::{
    AuthApi, AuthChangeEvent, BlobStorage, HabitTable, PreferencesTable, ProfileTable, RemoteError,
    SessionEvent, SignUpOutcome,
};

const EVENT_BUFFER: usize = 64;

/// Remote operations, for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetSession,
    SignIn,
    SignUp,
    SignOut,
    UpdateUser,
    SelectHabits,
    InsertHabit,
    UpdateHabit,
    SelectProfile,
    UpsertProfile,
    UpdateAvatar,
    SelectPreferences,
    UpsertPreferences,
    Upload,
}

struct Account {
    identity: Identity,
    password: Zeroizing<String>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    habits: Vec<Habit>,
    profiles: HashMap<Uuid, Profile>,
    preferences: HashMap<Uuid, Preferences>,
    blobs: HashMap<String, (Vec<u8>, String)>,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, RemoteError>,
    latency: Option<Duration>,
}

/// A backend that keeps everything in memory.
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a panicking test thread must not poison every later call
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates an account without signing in.
    pub fn register_user(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            user_metadata: Metadata::new(),
        };
        self.lock().accounts.insert(
            email.to_lowercase(),
            Account {
                identity: identity.clone(),
                password: Zeroizing::new(password.to_string()),
            },
        );
        identity
    }

    /// Seeds a habit row directly, bypassing access control.
    pub fn seed_habit(&self, habit: Habit) {
        self.lock().habits.push(habit);
    }

    /// The stored row, bypassing access control.
    pub fn habit(&self, id: Uuid) -> Option<Habit> {
        self.lock().habits.iter().find(|h| h.id == id).cloned()
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.lock().habits.clone()
    }

    pub fn profile(&self, user_id: Uuid) -> Option<Profile> {
        self.lock().profiles.get(&user_id).cloned()
    }

    pub fn preferences(&self, user_id: Uuid) -> Option<Preferences> {
        self.lock().preferences.get(&user_id).copied()
    }

    pub fn blob(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
        self.lock().blobs.get(&format!("{}/{}", bucket, path)).cloned()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Makes the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: Operation, err: RemoteError) {
        self.lock().failures.insert(op, err);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Total calls to the data tables.
    pub fn table_calls(&self) -> usize {
        let inner = self.lock();
        [
            Operation::SelectHabits,
            Operation::InsertHabit,
            Operation::UpdateHabit,
            Operation::SelectProfile,
            Operation::UpsertProfile,
            Operation::UpdateAvatar,
            Operation::SelectPreferences,
            Operation::UpsertPreferences,
        ]
        .iter()
        .map(|op| inner.calls.get(op).copied().unwrap_or(0))
        .sum()
    }

    /// Number of live session-change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Ends the session from the service side (expiry, revocation, another tab).
    pub fn revoke_session(&self) {
        let had_session = self.lock().session.take().is_some();
        if had_session {
            self.emit(AuthChangeEvent::SignedOut, None);
        }
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        // no subscribers is fine
        let _ = self.events.send(SessionEvent::new(event, session));
    }

    /// Records the call, applies latency, and returns an injected failure.
    async fn enter(&self, op: Operation) -> Result<(), RemoteError> {
        let (latency, failure) = {
            let mut inner = self.lock();
            *inner.calls.entry(op).or_default() += 1;
            (inner.latency, inner.failures.remove(&op))
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn caller(&self) -> Option<Uuid> {
        self.lock().session.as_ref().map(|s| s.user.id)
    }

    fn issue_session(identity: &Identity) -> Session {
        let mut session = Session::new(identity.clone(), format!("mem-{}", Uuid::new_v4()));
        session.refresh_token = Some(Zeroizing::new(format!("mem-refresh-{}", Uuid::new_v4())));
        session
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn rls_violation(table: &str) -> RemoteError {
    RemoteError::api(
        403,
        Some("42501".to_string()),
        format!("new row violates row-level security policy for table \"{}\"", table),
    )
}

fn row_not_visible() -> RemoteError {
    RemoteError::api(
        404,
        Some("PGRST116".to_string()),
        "The result contains 0 rows",
    )
}

impl AuthApi for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, RemoteError> {
        self.enter(Operation::GetSession).await?;
        Ok(self.lock().session.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, RemoteError> {
        self.enter(Operation::SignIn).await?;

        let session = {
            let mut inner = self.lock();
            let account = inner.accounts.get(&email.to_lowercase()).ok_or_else(|| {
                RemoteError::api(400, Some("user_not_found".to_string()), "User not found")
            })?;
            if account.password.as_str() != password {
                return Err(RemoteError::api(
                    400,
                    Some("invalid_credentials".to_string()),
                    "Invalid login credentials",
                ));
            }
            let session = Self::issue_session(&account.identity);
            inner.session = Some(session.clone());
            session
        };

        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Metadata,
    ) -> Result<SignUpOutcome, RemoteError> {
        self.enter(Operation::SignUp).await?;

        let session = {
            let mut inner = self.lock();
            let key = email.to_lowercase();
            if inner.accounts.contains_key(&key) {
                return Err(RemoteError::api(
                    422,
                    Some("user_already_exists".to_string()),
                    "User already registered",
                ));
            }
            let identity = Identity {
                id: Uuid::new_v4(),
                email: email.to_string(),
                user_metadata: metadata,
            };
            inner.accounts.insert(
                key,
                Account {
                    identity: identity.clone(),
                    password: Zeroizing::new(password.to_string()),
                },
            );
            let session = Self::issue_session(&identity);
            inner.session = Some(session.clone());
            session
        };

        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(SignUpOutcome {
            user: Some(session.user.clone()),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.enter(Operation::SignOut).await?;
        self.revoke_session();
        Ok(())
    }

    async fn update_user_metadata(&self, fields: Metadata) -> Result<Identity, RemoteError> {
        self.enter(Operation::UpdateUser).await?;

        let session = {
            let mut inner = self.lock();
            let Inner {
                session, accounts, ..
            } = &mut *inner;
            let session = session.as_mut().ok_or_else(|| {
                RemoteError::api(401, Some("no_authorization".to_string()), "Auth session missing")
            })?;
            session.user.user_metadata.extend(fields);
            if let Some(account) = accounts.get_mut(&session.user.email.to_lowercase()) {
                account.identity = session.user.clone();
            }
            session.clone()
        };

        self.emit(AuthChangeEvent::UserUpdated, Some(session.clone()));
        Ok(session.user)
    }
}

impl HabitTable for MemoryBackend {
    async fn select_habits(&self, user_id: Uuid) -> Result<Vec<Habit>, RemoteError> {
        self.enter(Operation::SelectHabits).await?;
        let Some(caller) = self.caller() else {
            return Ok(Vec::new());
        };
        Ok(self
            .lock()
            .habits
            .iter()
            .filter(|h| h.user_id == user_id && h.user_id == caller)
            .cloned()
            .collect())
    }

    async fn insert_habit(&self, habit: &NewHabit) -> Result<Habit, RemoteError> {
        self.enter(Operation::InsertHabit).await?;
        if self.caller() != Some(habit.user_id) {
            return Err(rls_violation("habits"));
        }
        if habit.title.trim().is_empty() {
            return Err(RemoteError::api(
                400,
                Some("23514".to_string()),
                "new row for relation \"habits\" violates check constraint \"habits_title_check\"",
            ));
        }
        let stored = habit.clone().into_habit(Uuid::new_v4());
        self.lock().habits.push(stored.clone());
        Ok(stored)
    }

    async fn update_streak(&self, habit_id: Uuid, streak_days: u32) -> Result<Habit, RemoteError> {
        self.enter(Operation::UpdateHabit).await?;
        let caller = self.caller();
        let mut inner = self.lock();
        let habit = inner
            .habits
            .iter_mut()
            .find(|h| h.id == habit_id && Some(h.user_id) == caller)
            .ok_or_else(row_not_visible)?;
        habit.streak_days = streak_days;
        Ok(habit.clone())
    }
}

impl ProfileTable for MemoryBackend {
    async fn select_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RemoteError> {
        self.enter(Operation::SelectProfile).await?;
        if self.caller() != Some(user_id) {
            return Ok(None);
        }
        Ok(self.lock().profiles.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RemoteError> {
        self.enter(Operation::UpsertProfile).await?;
        if self.caller() != Some(profile.id) {
            return Err(rls_violation("profiles"));
        }
        let mut inner = self.lock();
        let taken = inner
            .profiles
            .values()
            .any(|p| p.id != profile.id && p.username == profile.username);
        if taken {
            return Err(RemoteError::api(
                409,
                Some("23505".to_string()),
                "duplicate key value violates unique constraint \"profiles_username_key\"",
            ));
        }
        inner.profiles.insert(profile.id, profile.clone());
        Ok(profile.clone())
    }

    async fn update_avatar_url(&self, user_id: Uuid, avatar_url: &str) -> Result<(), RemoteError> {
        self.enter(Operation::UpdateAvatar).await?;
        if self.caller() != Some(user_id) {
            return Err(row_not_visible());
        }
        let mut inner = self.lock();
        let profile = inner.profiles.entry(user_id).or_insert_with(|| Profile {
            id: user_id,
            username: String::new(),
            leaderboard_nickname: None,
            avatar_url: None,
        });
        profile.avatar_url = Some(avatar_url.to_string());
        Ok(())
    }
}

impl PreferencesTable for MemoryBackend {
    async fn select_preferences(&self, user_id: Uuid) -> Result<Option<Preferences>, RemoteError> {
        self.enter(Operation::SelectPreferences).await?;
        if self.caller() != Some(user_id) {
            return Ok(None);
        }
        Ok(self.lock().preferences.get(&user_id).copied())
    }

    async fn upsert_preferences(&self, preferences: &Preferences) -> Result<(), RemoteError> {
        self.enter(Operation::UpsertPreferences).await?;
        if self.caller() != Some(preferences.user_id) {
            return Err(rls_violation("user_preferences"));
        }
        self.lock().preferences.insert(preferences.user_id, *preferences);
        Ok(())
    }
}

impl BlobStorage for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), RemoteError> {
        self.enter(Operation::Upload).await?;
        if self.caller().is_none() {
            return Err(rls_violation("objects"));
        }
        let key = format!("{}/{}", bucket, path);
        let mut inner = self.lock();
        if inner.blobs.contains_key(&key) {
            return Err(RemoteError::api(409, Some("Duplicate".to_string()), "The resource already exists"));
        }
        inner.blobs.insert(key, (bytes, content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://storage/{}/{}", bucket, path)
    }
}
