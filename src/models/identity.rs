use serde::{Deserialize, Serialize};
use sonic_rs::{JsonValueTrait, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form user metadata as stored by the auth service.
pub type Metadata = BTreeMap<String, Value>;

/// Represents an authenticated user as issued by the auth service.
///
/// The application holds a read-only copy for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// The server-assigned identifier for the user.
    pub id: Uuid,
    /// The user's email address.
    #[serde(default)]
    pub email: String,
    /// Arbitrary metadata attached to the user (avatar URL, full name, ...).
    #[serde(default)]
    pub user_metadata: Metadata,
}

impl Identity {
    /// Looks up a string-valued metadata field.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(|v| v.as_str())
    }

    /// The part of the email address before the `@`, used as a greeting.
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

/// Builds a metadata map from string pairs.
pub fn metadata_from<'a, I>(pairs: I) -> Metadata
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::from(v)))
        .collect()
}
