use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a row in the remote `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// The ID of the user this profile belongs to.
    pub id: Uuid,
    /// Unique handle shown on the profile page.
    #[serde(default)]
    pub username: String,
    /// Name shown on the leaderboard.
    #[serde(default)]
    pub leaderboard_nickname: Option<String>,
    /// Public URL of the avatar image.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// What the profile page displays: the profile row merged with the identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileView {
    pub username: String,
    pub leaderboard_nickname: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// Editable profile fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileUpdate {
    pub username: String,
    pub leaderboard_nickname: String,
}

/// Derives a username from a display name: lowercased, whitespace runs
/// collapsed to `_`.
pub fn username_from_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_derivation() {
        assert_eq!(username_from_name("Ada Lovelace"), "ada_lovelace");
        assert_eq!(username_from_name("  Grace   Brewster Hopper "), "grace_brewster_hopper");
        assert_eq!(username_from_name(""), "");
    }
}
