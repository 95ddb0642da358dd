use std::fmt;

use crate::models::habit::HabitStats;
use crate::navigation::{Navigator, Route};
use crate::remote::api::Backend;
use crate::services::habits::{HabitListView, ListStatus};
use crate::session::machine::AuthState;
use crate::state::AppState;

/// What the dashboard shows for the current auth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    /// The session has not been resolved yet.
    Loading,
    /// Nobody is signed in; the user was sent to the login page.
    Redirected,
    Ready(Dashboard),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub greeting: String,
    pub list: HabitListView,
    pub stats: HabitStats,
}

/// Renders the dashboard, fetching the habits the first time round.
pub async fn render<R: Backend, N: Navigator>(state: &AppState<R, N>) -> DashboardView {
    let session = match state.session().state() {
        AuthState::Unknown | AuthState::Authenticating => return DashboardView::Loading,
        AuthState::Anonymous => {
            state.navigator.navigate(Route::Login);
            return DashboardView::Redirected;
        }
        AuthState::Authenticated(session) => session,
    };

    if state.habits.status() == ListStatus::Loading {
        state.habits.load_habits(Some(session.user.id)).await;
    }

    DashboardView::Ready(Dashboard {
        greeting: format!("Welcome, {}", session.user.display_name()),
        list: state.habits.view(),
        stats: state.habits.stats(),
    })
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.greeting)?;
        writeln!(f)?;
        match &self.list {
            HabitListView::Loading => writeln!(f, "Loading habits...")?,
            HabitListView::Empty => writeln!(f, "No habits yet. Create one to get started.")?,
            HabitListView::Error(msg) => writeln!(f, "⚠️ {}", msg)?,
            HabitListView::Habits(habits) => {
                for habit in habits {
                    writeln!(
                        f,
                        "  {}  {} ({}) 🔥 {} days",
                        habit.id,
                        habit.title,
                        habit.schedule.frequency.as_str(),
                        habit.streak_days
                    )?;
                }
            }
        }
        writeln!(f)?;
        write!(
            f,
            "{} habits, longest streak {} days, {} streak days in total",
            self.stats.total_habits, self.stats.longest_streak, self.stats.total_streak_days
        )
    }
}
