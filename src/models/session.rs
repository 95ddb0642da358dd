use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroizing;

use crate::models::identity::Identity;

/// Represents the live proof of authentication.
///
/// ⚠️ Tokens are kept in zeroizing buffers and never printed; the `Debug`
/// impl redacts them.
#[derive(Clone, PartialEq)]
pub struct Session {
    /// The identity this session belongs to.
    pub user: Identity,
    /// Bearer token sent with every data request.
    pub access_token: Zeroizing<String>,
    /// Token used to obtain a fresh access token.
    pub refresh_token: Option<Zeroizing<String>>,
    /// When the access token stops being accepted.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session without a refresh token or expiry.
    pub fn new(user: Identity, access_token: impl Into<String>) -> Self {
        Self {
            user,
            access_token: Zeroizing::new(access_token.into()),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Returns `true` if the access token is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::Metadata;
    use uuid::Uuid;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            user_metadata: Metadata::new(),
        }
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let session = Session::new(identity(), "secret-token");
        let printed = format!("{:?}", session);
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn expiry() {
        let mut session = Session::new(identity(), "t");
        assert!(!session.is_expired());
        session.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(session.is_expired());
    }
}
