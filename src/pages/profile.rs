use crate::error::AppError;
use crate::models::profile::{ProfileUpdate, ProfileView};
use crate::navigation::{Navigator, Route};
use crate::pages::banner::Banner;
use crate::remote::api::Backend;
use crate::services::profile::{fetch_profile, save_profile, upload_avatar};
use crate::state::AppState;

/// The profile page: current values, the edit form and a banner.
#[derive(Debug, Clone, Default)]
pub struct ProfilePage {
    pub view: ProfileView,
    pub form: ProfileUpdate,
    pub banner: Option<Banner>,
}

impl ProfilePage {
    /// Loads the page. Anonymous visitors are sent to the login page.
    pub async fn load<R: Backend, N: Navigator>(state: &AppState<R, N>) -> Self {
        let mut page = Self::default();
        match fetch_profile(state).await {
            Ok(view) => {
                page.form = ProfileUpdate {
                    username: view.username.clone(),
                    leaderboard_nickname: view.leaderboard_nickname.clone(),
                };
                page.view = view;
            }
            Err(AppError::Auth(_)) => state.navigator.navigate(Route::Login),
            Err(e) => page.banner = Some(Banner::error(format!("Could not load profile: {}", e.user_message()))),
        }
        page
    }

    pub async fn save<R: Backend, N: Navigator>(&mut self, state: &AppState<R, N>) {
        self.banner = Some(match save_profile(state, self.form.clone()).await {
            Ok(profile) => {
                self.view.username = profile.username;
                self.view.leaderboard_nickname = profile.leaderboard_nickname.unwrap_or_default();
                Banner::success("Profile updated successfully")
            }
            Err(AppError::Validation(msg)) => Banner::error(msg),
            Err(_) => Banner::error("Could not update profile"),
        });
    }

    pub async fn upload_avatar<R: Backend, N: Navigator>(
        &mut self,
        state: &AppState<R, N>,
        file_name: &str,
        bytes: Vec<u8>,
    ) {
        self.banner = Some(match upload_avatar(state, file_name, bytes).await {
            Ok(url) => {
                self.view.avatar_url = Some(url);
                Banner::success("Avatar uploaded successfully")
            }
            Err(AppError::Validation(msg)) => Banner::error(msg),
            Err(_) => Banner::error("Could not upload avatar"),
        });
    }
}
