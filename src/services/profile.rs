use std::path::Path;

use crate::error::{AppError, AuthError, Result};
use crate::models::{
    identity::{Identity, metadata_from},
    profile::{Profile, ProfileUpdate, ProfileView},
};
use crate::navigation::Navigator;
use crate::remote::api::Backend;
use crate::state::AppState;
use crate::validation::profile::{validate_nickname, validate_username};

/// Storage bucket for profile pictures.
pub const AVATAR_BUCKET: &str = "avatars";

fn current_user<R: Backend, N: Navigator>(state: &AppState<R, N>) -> Result<Identity> {
    state
        .session()
        .user()
        .ok_or(AppError::Auth(AuthError::NotAuthenticated))
}

/// Loads the profile page contents for the signed-in user.
///
/// A user without a `profiles` row gets the values from their metadata.
pub async fn fetch_profile<R: Backend, N: Navigator>(state: &AppState<R, N>) -> Result<ProfileView> {
    let user = current_user(state)?;

    let profile = state.remote.select_profile(user.id).await.map_err(|e| {
        tracing::error!("❌ Failed to fetch profile: {}", e);
        AppError::from(e)
    })?;

    let (username, nickname, avatar_url) = match profile {
        Some(p) => (p.username, p.leaderboard_nickname, p.avatar_url),
        None => (String::new(), None, None),
    };

    Ok(ProfileView {
        username: if username.is_empty() {
            user.metadata_str("username").unwrap_or_default().to_string()
        } else {
            username
        },
        leaderboard_nickname: nickname.unwrap_or_default(),
        email: user.email.clone(),
        avatar_url: avatar_url.or_else(|| user.metadata_str("avatar_url").map(str::to_string)),
    })
}

/// Saves the editable profile fields.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `update` - The new username and leaderboard nickname.
///
/// # Returns
///
/// The stored profile row.
pub async fn save_profile<R: Backend, N: Navigator>(
    state: &AppState<R, N>,
    update: ProfileUpdate,
) -> Result<Profile> {
    let username = update.username.trim().to_string();
    validate_username(&username)?;
    let nickname = update.leaderboard_nickname.trim().to_string();
    validate_nickname(&nickname)?;

    let user = current_user(state)?;

    // the upsert overwrites every column, so carry the avatar over
    let avatar_url = state
        .remote
        .select_profile(user.id)
        .await?
        .and_then(|p| p.avatar_url);

    let profile = Profile {
        id: user.id,
        username,
        leaderboard_nickname: (!nickname.is_empty()).then_some(nickname),
        avatar_url,
    };

    let stored = state.remote.upsert_profile(&profile).await.map_err(|e| {
        tracing::error!("❌ Failed to save profile: {}", e);
        AppError::from(e)
    })?;
    tracing::info!("✅ Profile saved for {}", user.id);

    Ok(stored)
}

/// Uploads a new profile picture and points the profile at it.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `file_name` - The picked file's name; its extension names the object.
/// * `bytes` - The file contents. Must be an image.
///
/// # Returns
///
/// The public URL of the uploaded image.
pub async fn upload_avatar<R: Backend, N: Navigator>(
    state: &AppState<R, N>,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<String> {
    let user = current_user(state)?;

    let kind = match infer::get(&bytes) {
        Some(kind) if infer::is_image(&bytes) => kind,
        _ => {
            tracing::warn!("❌ Rejected avatar upload: not an image");
            return Err(AppError::Validation("Avatar must be an image".to_string()));
        }
    };

    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| kind.extension().to_string());
    let path = format!("{}-{}.{}", user.id, rand::random::<u32>(), extension);

    tracing::debug!("Uploading avatar {} ({} bytes)", path, bytes.len());
    state
        .remote
        .upload(AVATAR_BUCKET, &path, bytes, kind.mime_type())
        .await
        .map_err(|e| {
            tracing::error!("❌ Avatar upload failed: {}", e);
            AppError::from(e)
        })?;

    let url = state.remote.public_url(AVATAR_BUCKET, &path);
    state
        .remote
        .update_user_metadata(metadata_from([("avatar_url", url.as_str())]))
        .await?;
    state.remote.update_avatar_url(user.id, &url).await?;
    tracing::info!("✅ Avatar updated for {}", user.id);

    Ok(url)
}
