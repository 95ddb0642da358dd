use thiserror::Error;
use uuid::Uuid;

use crate::remote::api::{RemoteError, RemoteErrorKind};

/// Failures of the auth service, classified by structured error code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Email and password do not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No account exists for the email address.
    #[error("User not found")]
    UserNotFound,

    /// The auth service is throttling this client.
    #[error("Rate limited")]
    RateLimited,

    /// The operation needs a signed-in user and there is none.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The auth service did not answer in time.
    #[error("Auth request timed out")]
    Timeout,

    /// Anything the auth service reported that we do not recognize.
    #[error("Unknown auth error")]
    Unknown,
}

impl AuthError {
    /// Classifies a remote auth failure.
    ///
    /// Only the structured code and HTTP status are inspected; the free-text
    /// message is not a stable contract.
    pub fn classify(err: &RemoteError) -> Self {
        match err.code.as_deref() {
            Some("invalid_credentials" | "invalid_grant") => AuthError::InvalidCredentials,
            Some("user_not_found") => AuthError::UserNotFound,
            Some("too_many_requests" | "over_request_rate_limit" | "over_email_send_rate_limit") => {
                AuthError::RateLimited
            }
            Some(_) => AuthError::Unknown,
            None if err.status == Some(429) => AuthError::RateLimited,
            None => AuthError::Unknown,
        }
    }

    /// The text shown in the page banner for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Incorrect email or password. Please try again.",
            AuthError::UserNotFound => "No account found. Please sign up.",
            AuthError::RateLimited => "Too many attempts. Try again later or reset password.",
            AuthError::NotAuthenticated => "Please sign in to continue.",
            AuthError::Timeout => "The sign-in service is not responding. Please try again.",
            AuthError::Unknown => "Login failed. Please try again.",
        }
    }
}

/// Failures of the data service, classified by structured error code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataError {
    /// The row-level access policy rejected the request.
    #[error("Permission denied")]
    PermissionDenied,

    /// The store rejected the record's contents.
    #[error("Validation failed")]
    ValidationFailed,

    /// The request never got a response.
    #[error("Network failure")]
    NetworkFailure,

    /// Anything else.
    #[error("Unknown data error")]
    Unknown,
}

impl DataError {
    /// Classifies a remote data failure by transport kind, Postgres/PostgREST
    /// code and HTTP status.
    pub fn classify(err: &RemoteError) -> Self {
        if err.kind == RemoteErrorKind::Transport {
            return DataError::NetworkFailure;
        }

        match err.code.as_deref() {
            // insufficient_privilege, JWT rejected, row not visible to caller
            Some("42501" | "PGRST301" | "PGRST302" | "PGRST116") => DataError::PermissionDenied,
            // not_null, foreign_key, unique, check violations, bad input, unknown column
            Some("23502" | "23503" | "23505" | "23514" | "22P02" | "PGRST102" | "PGRST204") => {
                DataError::ValidationFailed
            }
            Some(_) => DataError::Unknown,
            None => match err.status {
                Some(401 | 403) => DataError::PermissionDenied,
                Some(400 | 422) => DataError::ValidationFailed,
                _ => DataError::Unknown,
            },
        }
    }

    /// The text shown in the page banner for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            DataError::PermissionDenied => "You don't have permission to change this. Please sign in again.",
            DataError::ValidationFailed => "Some details were rejected. Please check the form and try again.",
            DataError::NetworkFailure => "Network error. Check your connection and try again.",
            DataError::Unknown => "Something went wrong. Please try again.",
        }
    }
}

/// The application's error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// An auth failure.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// A data failure.
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// A form input was rejected before any remote call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A write for the same record is still in flight.
    #[error("A write for {0} is already in progress")]
    WriteInFlight(Uuid),

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        AppError::Data(DataError::classify(&err))
    }
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// The text rendered inline or in the page banner.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Auth(e) => {
                tracing::warn!("Authentication failed: {}", e);
                e.user_message().to_string()
            }
            AppError::Data(e) => {
                tracing::warn!("Data error: {}", e);
                e.user_message().to_string()
            }
            AppError::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }
            AppError::WriteInFlight(id) => {
                tracing::debug!("Write already in flight for {}", id);
                "Still saving your last change...".to_string()
            }
            AppError::NotFound => {
                tracing::debug!("Resource not found");
                "That item no longer exists.".to_string()
            }
        }
    }
}
