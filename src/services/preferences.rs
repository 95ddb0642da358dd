use crate::error::{AppError, AuthError, Result};
use crate::models::preferences::Preferences;
use crate::navigation::Navigator;
use crate::remote::api::Backend;
use crate::state::AppState;

/// Loads the signed-in user's notification preferences, falling back to the
/// defaults when nothing has been saved yet.
pub async fn load_preferences<R: Backend, N: Navigator>(state: &AppState<R, N>) -> Result<Preferences> {
    let user_id = state
        .session()
        .user_id()
        .ok_or(AppError::Auth(AuthError::NotAuthenticated))?;

    let stored = state.remote.select_preferences(user_id).await.map_err(|e| {
        tracing::error!("❌ Failed to load preferences: {}", e);
        AppError::from(e)
    })?;

    Ok(stored.unwrap_or_else(|| Preferences::defaults_for(user_id)))
}

/// Saves notification preferences for the signed-in user.
///
/// The row is always written for the live session's user, whatever
/// `preferences.user_id` says.
pub async fn save_preferences<R: Backend, N: Navigator>(
    state: &AppState<R, N>,
    preferences: Preferences,
) -> Result<Preferences> {
    let user_id = state
        .session()
        .user_id()
        .ok_or(AppError::Auth(AuthError::NotAuthenticated))?;

    let preferences = Preferences {
        user_id,
        ..preferences
    };

    state
        .remote
        .upsert_preferences(&preferences)
        .await
        .map_err(|e| {
            tracing::error!("❌ Failed to save preferences: {}", e);
            AppError::from(e)
        })?;
    tracing::info!("✅ Preferences saved for {}", user_id);

    Ok(preferences)
}
