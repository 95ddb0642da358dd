use chrono::NaiveTime;

use crate::error::{AppError, Result};
use crate::models::preferences::Preferences;
use crate::navigation::{Navigator, Route};
use crate::pages::banner::Banner;
use crate::remote::api::Backend;
use crate::services::preferences::{load_preferences, save_preferences};
use crate::state::AppState;

/// The notification preferences page.
#[derive(Debug, Clone, Default)]
pub struct PreferencesPage {
    /// `None` until loaded.
    pub preferences: Option<Preferences>,
    pub banner: Option<Banner>,
}

impl PreferencesPage {
    pub async fn load<R: Backend, N: Navigator>(state: &AppState<R, N>) -> Self {
        let mut page = Self::default();
        match load_preferences(state).await {
            Ok(preferences) => page.preferences = Some(preferences),
            Err(AppError::Auth(_)) => state.navigator.navigate(Route::Login),
            Err(e) => page.banner = Some(Banner::error(e.user_message())),
        }
        page
    }

    /// Sets the daily reminder from an `HH:MM` string.
    pub fn set_reminder_time(&mut self, value: &str) -> Result<()> {
        let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|_| AppError::Validation("Reminder time must be HH:MM".to_string()))?;
        if let Some(preferences) = self.preferences.as_mut() {
            preferences.daily_reminder_time = time;
        }
        Ok(())
    }

    pub async fn save<R: Backend, N: Navigator>(&mut self, state: &AppState<R, N>) {
        let Some(preferences) = self.preferences else {
            return;
        };
        self.banner = Some(match save_preferences(state, preferences).await {
            Ok(saved) => {
                self.preferences = Some(saved);
                Banner::success("Preferences saved successfully!")
            }
            Err(_) => Banner::error("Failed to save preferences"),
        });
    }
}
