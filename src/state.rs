use std::sync::Arc;

use crate::config::Config;
use crate::navigation::Navigator;
use crate::remote::api::Backend;
use crate::services::{auth::AuthFacade, habits::HabitManager};
use crate::session::store::SessionStore;

/// The application's state.
pub struct AppState<R: Backend, N: Navigator> {
    /// The application's configuration.
    pub config: Config,
    /// The hosted auth/data service.
    pub remote: Arc<R>,
    /// Where pages send the user.
    pub navigator: Arc<N>,
    /// The auth façade; sole writer of the session store.
    pub auth: Arc<AuthFacade<R, N>>,
    /// The signed-in user's habits.
    pub habits: Arc<HabitManager<R>>,
}

impl<R: Backend, N: Navigator> AppState<R, N> {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    /// * `remote` - The hosted service, or an in-memory stand-in.
    /// * `navigator` - The navigation capability.
    ///
    /// The auth listener is not running yet; call `start` before use.
    pub fn new(config: &Config, remote: Arc<R>, navigator: Arc<N>) -> Self {
        let auth = Arc::new(AuthFacade::new(
            remote.clone(),
            navigator.clone(),
            config.auth_timeout,
        ));
        tracing::info!("✅ Auth façade initialized");

        let habits = Arc::new(HabitManager::new(remote.clone(), auth.store()));
        tracing::info!("✅ Habit manager initialized");

        Self {
            config: config.clone(),
            remote,
            navigator,
            auth,
            habits,
        }
    }

    /// A read handle on the session state.
    pub fn session(&self) -> SessionStore {
        self.auth.store()
    }

    /// Restores the session and subscribes to remote session changes.
    pub async fn start(&self) {
        self.auth.start().await;
    }

    /// Releases the remote subscription.
    pub async fn shutdown(&self) {
        self.auth.stop().await;
        tracing::info!("👋 Shut down");
    }
}
