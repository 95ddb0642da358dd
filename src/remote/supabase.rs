//! HTTP client for a Supabase-style hosted service.
//!
//! Auth goes through the GoTrue endpoints (`/auth/v1`), tables through
//! PostgREST (`/rest/v1`), avatars through storage (`/storage/v1`). The
//! client holds the current session itself and broadcasts transitions, the
//! way the hosted JS SDK does.

use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sonic_rs::JsonValueTrait;
use tokio::sync::broadcast;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::Config;
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
const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_REPRESENTATION: &str = "resolution=merge-duplicates,return=representation";

/// GoTrue token grant / session payload.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: Option<UserResponse>,
}

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Metadata,
}

impl From<UserResponse> for Identity {
    fn from(user: UserResponse) -> Self {
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
            user_metadata: user.user_metadata,
        }
    }
}

impl TokenResponse {
    fn into_session(self) -> Option<Session> {
        let access_token = self.access_token?;
        let user = self.user?;
        Some(Session {
            user: user.into(),
            access_token: Zeroizing::new(access_token),
            refresh_token: self.refresh_token.map(Zeroizing::new),
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a Metadata,
}

#[derive(Serialize)]
struct UserUpdate<'a> {
    data: &'a Metadata,
}

#[derive(Serialize)]
struct StreakUpdate {
    streak_days: u32,
}

#[derive(Serialize)]
struct AvatarUpdate<'a> {
    avatar_url: &'a str,
}

/// HTTP client for the hosted auth/data service.
pub struct SupabaseClient {
    pub base_url: String,
    anon_key: Zeroizing<String>,
    client: ReqwestClient,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SupabaseClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL (e.g., "https://xyz.supabase.co").
    /// * `anon_key` - Public API key sent as `apikey`.
    /// * `request_timeout` - Upper bound for every HTTP request.
    pub fn new(base_url: &str, anon_key: &str, request_timeout: Duration) -> Result<Self, RemoteError> {
        let client = ReqwestClient::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RemoteError::transport(format!("Failed to build HTTP client: {}", e)))?;
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: Zeroizing::new(anon_key.to_string()),
            client,
            session: RwLock::new(None),
            events,
        })
    }

    /// Creates a client from the application's configuration.
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Self::new(&config.supabase_url, &config.anon_key, config.request_timeout)
    }

    fn current(&self) -> Option<Session> {
        self.session.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn store(&self, session: Option<Session>) {
        match self.session.write() {
            Ok(mut slot) => *slot = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        let _ = self.events.send(SessionEvent::new(event, session));
    }

    /// Build a request carrying the API key and the caller's bearer token.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let bearer = self
            .current()
            .map(|s| s.access_token.to_string())
            .unwrap_or_else(|| self.anon_key.to_string());

        self.client
            .request(method, &url)
            .header("apikey", self.anon_key.as_str())
            .header("Authorization", format!("Bearer {}", bearer))
    }

    fn json_body<T: Serialize>(req: RequestBuilder, body: &T) -> Result<RequestBuilder, RemoteError> {
        let encoded = sonic_rs::to_string(body)
            .map_err(|e| RemoteError::decode(format!("Request serialization failed: {}", e)))?;
        Ok(req.header("Content-Type", "application/json").body(encoded))
    }

    /// Execute request and turn error bodies into `RemoteError`.
    async fn execute(&self, req: RequestBuilder) -> Result<String, RemoteError> {
        let response = req.send().await.map_err(|e| {
            tracing::warn!("❌ Request to auth/data service failed: {}", e);
            RemoteError::transport(e.to_string())
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::transport(e.to_string()))?;

        if !status.is_success() {
            let err = parse_error(status.as_u16(), &body);
            tracing::debug!("Remote returned {} (code: {:?})", status, err.code);
            return Err(err);
        }

        Ok(body)
    }

    async fn execute_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, RemoteError> {
        let body = self.execute(req).await?;
        decode(&body)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, RemoteError> {
        tracing::debug!("🔄 Refreshing expired session");
        let req = self.request(Method::POST, "/auth/v1/token?grant_type=refresh_token");
        let req = Self::json_body(req, &RefreshGrant { refresh_token })?;
        let token: TokenResponse = self.execute_json(req).await?;
        let session = token.into_session();
        self.store(session.clone());
        self.emit(AuthChangeEvent::TokenRefreshed, session.clone());
        Ok(session)
    }
}

/// Pull the structured code out of a GoTrue or PostgREST error body.
fn parse_error(status: u16, body: &str) -> RemoteError {
    let Ok(value) = sonic_rs::from_str::<sonic_rs::Value>(body) else {
        return RemoteError::api(status, None, body.to_string());
    };

    let str_field = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);

    // GoTrue puts the machine code in `error_code` and a numeric `code`;
    // PostgREST uses a string `code`; legacy GoTrue uses `error`.
    let code = str_field("error_code")
        .or_else(|| str_field("code"))
        .or_else(|| str_field("error"));
    let message = str_field("msg")
        .or_else(|| str_field("message"))
        .or_else(|| str_field("error_description"))
        .unwrap_or_default();

    RemoteError::api(status, code, message)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RemoteError> {
    sonic_rs::from_str(body).map_err(|e| RemoteError::decode(format!("Invalid response body: {}", e)))
}

fn first_row<T>(rows: Vec<T>) -> Result<T, RemoteError> {
    rows.into_iter().next().ok_or_else(|| {
        RemoteError::api(404, Some("PGRST116".to_string()), "The result contains 0 rows")
    })
}

fn eq(id: Uuid) -> String {
    format!("eq.{}", id)
}

impl AuthApi for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Session>, RemoteError> {
        let Some(session) = self.current() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }
        match session.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(refresh_token).await,
            None => {
                self.store(None);
                self.emit(AuthChangeEvent::SignedOut, None);
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, RemoteError> {
        tracing::debug!("🔐 Password grant for {}", email);
        let req = self.request(Method::POST, "/auth/v1/token?grant_type=password");
        let req = Self::json_body(req, &PasswordGrant { email, password })?;
        let token: TokenResponse = self.execute_json(req).await?;

        let session = token.into_session();
        if let Some(session) = &session {
            self.store(Some(session.clone()));
            self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        }
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Metadata,
    ) -> Result<SignUpOutcome, RemoteError> {
        let req = self.request(Method::POST, "/auth/v1/signup");
        let req = Self::json_body(
            req,
            &SignUpRequest {
                email,
                password,
                data: &metadata,
            },
        )?;
        let body = self.execute(req).await?;

        // with autoconfirm the service answers with a session, otherwise
        // with the bare user awaiting email confirmation
        let value: sonic_rs::Value = decode(&body)?;
        if value.get("access_token").is_some() {
            let token: TokenResponse = decode(&body)?;
            let session = token.into_session();
            if let Some(session) = &session {
                self.store(Some(session.clone()));
                self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
            }
            return Ok(SignUpOutcome {
                user: session.as_ref().map(|s| s.user.clone()),
                session,
            });
        }

        let user: UserResponse = decode(&body)?;
        Ok(SignUpOutcome {
            user: Some(user.into()),
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        if self.current().is_none() {
            return Ok(());
        }

        let req = self.request(Method::POST, "/auth/v1/logout");
        match self.execute(req).await {
            Ok(_) => {}
            // the service already forgot this session
            Err(e) if matches!(e.status, Some(401 | 403 | 404)) => {
                tracing::debug!("Session already gone remotely: {:?}", e.code);
            }
            Err(e) => return Err(e),
        }

        self.store(None);
        self.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn update_user_metadata(&self, fields: Metadata) -> Result<Identity, RemoteError> {
        let req = self.request(Method::PUT, "/auth/v1/user");
        let req = Self::json_body(req, &UserUpdate { data: &fields })?;
        let user: UserResponse = self.execute_json(req).await?;
        let identity: Identity = user.into();

        if let Some(mut session) = self.current() {
            session.user = identity.clone();
            self.store(Some(session.clone()));
            self.emit(AuthChangeEvent::UserUpdated, Some(session));
        }
        Ok(identity)
    }
}

impl HabitTable for SupabaseClient {
    async fn select_habits(&self, user_id: Uuid) -> Result<Vec<Habit>, RemoteError> {
        let req = self
            .request(Method::GET, "/rest/v1/habits")
            .query(&[("select", "*".to_string()), ("user_id", eq(user_id))]);
        self.execute_json(req).await
    }

    async fn insert_habit(&self, habit: &NewHabit) -> Result<Habit, RemoteError> {
        let req = self
            .request(Method::POST, "/rest/v1/habits")
            .header("Prefer", RETURN_REPRESENTATION);
        let req = Self::json_body(req, habit)?;
        let rows: Vec<Habit> = self.execute_json(req).await?;
        first_row(rows)
    }

    async fn update_streak(&self, habit_id: Uuid, streak_days: u32) -> Result<Habit, RemoteError> {
        let req = self
            .request(Method::PATCH, "/rest/v1/habits")
            .query(&[("id", eq(habit_id))])
            .header("Prefer", RETURN_REPRESENTATION);
        let req = Self::json_body(req, &StreakUpdate { streak_days })?;
        let rows: Vec<Habit> = self.execute_json(req).await?;
        first_row(rows)
    }
}

impl ProfileTable for SupabaseClient {
    async fn select_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RemoteError> {
        let req = self
            .request(Method::GET, "/rest/v1/profiles")
            .query(&[("select", "*".to_string()), ("id", eq(user_id))]);
        let rows: Vec<Profile> = self.execute_json(req).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RemoteError> {
        let req = self
            .request(Method::POST, "/rest/v1/profiles")
            .query(&[("on_conflict", "id")])
            .header("Prefer", UPSERT_REPRESENTATION);
        let req = Self::json_body(req, profile)?;
        let rows: Vec<Profile> = self.execute_json(req).await?;
        first_row(rows)
    }

    async fn update_avatar_url(&self, user_id: Uuid, avatar_url: &str) -> Result<(), RemoteError> {
        let req = self
            .request(Method::PATCH, "/rest/v1/profiles")
            .query(&[("id", eq(user_id))]);
        let req = Self::json_body(req, &AvatarUpdate { avatar_url })?;
        self.execute(req).await.map(|_| ())
    }
}

impl PreferencesTable for SupabaseClient {
    async fn select_preferences(&self, user_id: Uuid) -> Result<Option<Preferences>, RemoteError> {
        let req = self
            .request(Method::GET, "/rest/v1/user_preferences")
            .query(&[("select", "*".to_string()), ("user_id", eq(user_id))]);
        let rows: Vec<Preferences> = self.execute_json(req).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_preferences(&self, preferences: &Preferences) -> Result<(), RemoteError> {
        let req = self
            .request(Method::POST, "/rest/v1/user_preferences")
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates");
        let req = Self::json_body(req, preferences)?;
        self.execute(req).await.map(|_| ())
    }
}

impl BlobStorage for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), RemoteError> {
        let req = self
            .request(Method::POST, &format!("/storage/v1/object/{}/{}", bucket, path))
            .header("Content-Type", content_type)
            .body(bytes);
        self.execute(req).await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }
}
