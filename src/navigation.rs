use std::sync::Mutex;

use tokio::sync::watch;

/// User-facing routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Signup,
    Dashboard,
    Profile,
    Preferences,
    Learn,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Dashboard => "/dashboard",
            Route::Profile => "/profile",
            Route::Preferences => "/preferences",
            Route::Learn => "/learn",
        }
    }

    /// Where a `SIGNED_IN` transition lands.
    pub const POST_LOGIN: Route = Route::Dashboard;
    /// Where a `SIGNED_OUT` transition lands.
    pub const POST_LOGOUT: Route = Route::Login;
}

/// Navigation capability injected into the auth façade and pages.
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, route: Route);
}

/// Navigator for headless use: records the current route and logs moves.
#[derive(Debug)]
pub struct LogNavigator {
    current: Mutex<Route>,
}

impl LogNavigator {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Route::Home),
        }
    }

    pub fn current(&self) -> Route {
        self.current.lock().map(|r| *r).unwrap_or(Route::Home)
    }
}

impl Default for LogNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for LogNavigator {
    fn navigate(&self, route: Route) {
        tracing::info!("🧭 Navigating to {}", route.path());
        if let Ok(mut current) = self.current.lock() {
            *current = route;
        }
    }
}

/// Navigator that keeps every route it was sent to. Used by tests to
/// observe redirects.
#[derive(Debug)]
pub struct RecordingNavigator {
    history: watch::Sender<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        let (history, _) = watch::channel(Vec::new());
        Self { history }
    }

    pub fn history(&self) -> Vec<Route> {
        self.history.borrow().clone()
    }

    pub fn last(&self) -> Option<Route> {
        self.history.borrow().last().copied()
    }

    /// Waits until at least `count` navigations happened.
    pub async fn wait_for_count(&self, count: usize) -> Vec<Route> {
        let mut rx = self.history.subscribe();
        match rx.wait_for(|h| h.len() >= count).await {
            Ok(history) => history.clone(),
            Err(_) => self.history(),
        }
    }
}

impl Default for RecordingNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.history.send_modify(|h| h.push(route));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_paths() {
        assert_eq!(Route::POST_LOGIN.path(), "/dashboard");
        assert_eq!(Route::POST_LOGOUT.path(), "/login");
        assert_eq!(Route::Learn.path(), "/learn");
    }

    #[tokio::test]
    async fn recording_navigator_waits() {
        let nav = RecordingNavigator::new();
        nav.navigate(Route::Login);
        nav.navigate(Route::Dashboard);
        assert_eq!(nav.wait_for_count(2).await, vec![Route::Login, Route::Dashboard]);
        assert_eq!(nav.last(), Some(Route::Dashboard));
    }

    #[test]
    fn log_navigator_tracks_current() {
        let nav = LogNavigator::new();
        nav.navigate(Route::Profile);
        assert_eq!(nav.current(), Route::Profile);
    }
}
