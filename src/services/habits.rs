use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::{AppError, AuthError, DataError, Result};
use crate::models::habit::{Habit, HabitInput, HabitStats, NewHabit};
use crate::remote::api::{HabitTable, RemoteError};
use crate::session::store::SessionStore;
use crate::validation::habit::validate_habit_input;

/// Where the collection is in its fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    Loading,
    Loaded,
    Failed(DataError),
}

/// The four ways the habit list can be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitListView {
    Loading,
    Empty,
    Error(String),
    Habits(Vec<Habit>),
}

struct Collection {
    owner: Option<Uuid>,
    status: ListStatus,
    habits: Vec<Habit>,
    in_flight: HashSet<Uuid>,
    form: HabitInput,
}

impl Collection {
    fn new() -> Self {
        Self {
            owner: None,
            status: ListStatus::Loading,
            habits: Vec::new(),
            in_flight: HashSet::new(),
            form: HabitInput::default(),
        }
    }

    fn reset_for(&mut self, owner: Option<Uuid>) {
        self.owner = owner;
        self.status = ListStatus::Loading;
        self.habits.clear();
        self.form = HabitInput::default();
    }
}

/// Releases a habit's write slot when the toggle finishes, however it ends.
struct InFlight {
    collection: Arc<Mutex<Collection>>,
    habit_id: Uuid,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut collection = self.collection.lock().unwrap_or_else(|e| e.into_inner());
        collection.in_flight.remove(&self.habit_id);
    }
}

/// Holds the signed-in user's habits and performs all reads and writes of
/// the `habits` table.
///
/// Every record in the collection belongs to the identity the session store
/// reports; when that identity changes the collection is cleared.
pub struct HabitManager<R: HabitTable> {
    remote: Arc<R>,
    store: SessionStore,
    collection: Arc<Mutex<Collection>>,
    creating: tokio::sync::Mutex<()>,
}

impl<R: HabitTable> HabitManager<R> {
    pub fn new(remote: Arc<R>, store: SessionStore) -> Self {
        Self {
            remote,
            store,
            collection: Arc::new(Mutex::new(Collection::new())),
            creating: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Collection> {
        self.collection.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Locks the collection, clearing it first if the live user changed.
    fn synced(&self) -> MutexGuard<'_, Collection> {
        let live = self.store.user_id();
        let mut collection = self.lock();
        if collection.owner != live {
            if collection.owner.is_some() {
                tracing::debug!("Session user changed, clearing habits");
            }
            collection.reset_for(live);
        }
        collection
    }

    /// Fetches the habits owned by `user_id`.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The owner to fetch for. `None` makes no remote call.
    ///
    /// # Returns
    ///
    /// The fetched habits. A failed fetch yields an empty list and leaves
    /// the collection in the `Failed` state.
    pub async fn load_habits(&self, user_id: Option<Uuid>) -> Vec<Habit> {
        let Some(user_id) = user_id else {
            let mut collection = self.lock();
            collection.reset_for(None);
            collection.status = ListStatus::Loaded;
            return Vec::new();
        };

        {
            let mut collection = self.lock();
            if collection.owner != Some(user_id) {
                collection.reset_for(Some(user_id));
            }
            collection.status = ListStatus::Loading;
        }

        tracing::debug!("Loading habits for {}", user_id);
        let result = self.remote.select_habits(user_id).await;

        let mut collection = self.lock();
        if self.store.user_id() != Some(user_id) || collection.owner != Some(user_id) {
            tracing::debug!("Discarding habits fetched for a previous session");
            return Vec::new();
        }

        match result {
            Ok(habits) => {
                tracing::info!("✅ Loaded {} habits", habits.len());
                collection.habits = habits.clone();
                collection.status = ListStatus::Loaded;
                habits
            }
            Err(e) => {
                let error = classify_data(&e);
                tracing::error!("❌ Failed to load habits: {}", e);
                collection.habits.clear();
                collection.status = ListStatus::Failed(error);
                Vec::new()
            }
        }
    }

    /// Reloads the live user's habits.
    pub async fn refresh(&self) -> Vec<Habit> {
        self.load_habits(self.store.user_id()).await
    }

    /// Marks a habit done for today.
    ///
    /// The streak is incremented locally before the write is sent and rolled
    /// back if the write fails. A second toggle of the same habit while the
    /// first is outstanding is rejected with `AppError::WriteInFlight`.
    pub async fn toggle_habit(&self, habit_id: Uuid) -> Result<Habit> {
        let (owner, previous, target, _slot) = {
            let mut collection = self.synced();
            let index = collection
                .habits
                .iter()
                .position(|h| h.id == habit_id)
                .ok_or(AppError::NotFound)?;
            if !collection.in_flight.insert(habit_id) {
                tracing::debug!("Toggle for {} already in flight", habit_id);
                return Err(AppError::WriteInFlight(habit_id));
            }
            let slot = InFlight {
                collection: self.collection.clone(),
                habit_id,
            };
            let habit = &mut collection.habits[index];
            let previous = habit.streak_days;
            let target = previous.saturating_add(1);
            habit.streak_days = target;
            (collection.owner, previous, target, slot)
        };

        tracing::debug!("Toggling habit {}: {} -> {}", habit_id, previous, target);
        let result = self.remote.update_streak(habit_id, target).await;

        let mut collection = self.lock();
        let current_owner = collection.owner == owner;
        let local = collection.habits.iter_mut().find(|h| h.id == habit_id);

        match result {
            Ok(stored) => {
                if let (true, Some(local)) = (current_owner, local) {
                    *local = stored.clone();
                }
                tracing::info!("✅ Habit {} streak now {}", habit_id, stored.streak_days);
                Ok(stored)
            }
            Err(e) => {
                if let (true, Some(local)) = (current_owner, local) {
                    if local.streak_days == target {
                        local.streak_days = previous;
                    }
                }
                tracing::error!("❌ Failed to toggle habit {}: {}", habit_id, e);
                Err(classify_data(&e).into())
            }
        }
    }

    /// Creates a habit owned by the live user.
    ///
    /// # Arguments
    ///
    /// * `input` - The form contents.
    ///
    /// # Returns
    ///
    /// The stored habit, which is also appended to the collection.
    pub async fn create_habit(&self, input: HabitInput) -> Result<Habit> {
        validate_habit_input(&input)?;

        let _serial = self.creating.lock().await;
        let Some(user_id) = self.store.user_id() else {
            tracing::warn!("❌ Habit creation without a session");
            return Err(AuthError::NotAuthenticated.into());
        };
        drop(self.synced());

        let new_habit = NewHabit::new(user_id, &input);
        tracing::debug!("Creating habit '{}' for {}", new_habit.title, user_id);
        let stored = self.remote.insert_habit(&new_habit).await.map_err(|e| {
            tracing::error!("❌ Failed to create habit: {}", e);
            AppError::from(classify_data(&e))
        })?;

        let mut collection = self.lock();
        if collection.owner == Some(user_id) {
            collection.habits.push(stored.clone());
            if collection.status == ListStatus::Loading {
                collection.status = ListStatus::Loaded;
            }
            collection.form = HabitInput::default();
        }
        tracing::info!("✅ Habit created: {}", stored.id);

        Ok(stored)
    }

    /// The current "add habit" draft.
    pub fn form(&self) -> HabitInput {
        self.synced().form.clone()
    }

    pub fn set_form(&self, form: HabitInput) {
        self.synced().form = form;
    }

    /// Submits the current draft.
    pub async fn submit_form(&self) -> Result<Habit> {
        let form = self.form();
        self.create_habit(form).await
    }

    pub fn status(&self) -> ListStatus {
        self.synced().status
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.synced().habits.clone()
    }

    pub fn stats(&self) -> HabitStats {
        HabitStats::from_habits(&self.synced().habits)
    }

    pub fn is_in_flight(&self, habit_id: Uuid) -> bool {
        self.lock().in_flight.contains(&habit_id)
    }

    /// How the list should be rendered right now.
    pub fn view(&self) -> HabitListView {
        let collection = self.synced();
        match collection.status {
            ListStatus::Loading => HabitListView::Loading,
            ListStatus::Failed(e) => HabitListView::Error(e.user_message().to_string()),
            ListStatus::Loaded if collection.habits.is_empty() => HabitListView::Empty,
            ListStatus::Loaded => HabitListView::Habits(collection.habits.clone()),
        }
    }
}

fn classify_data(err: &RemoteError) -> DataError {
    DataError::classify(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{identity::{Identity, Metadata}, session::Session};
    use crate::remote::memory::MemoryBackend;
    use crate::session::machine::AuthTransition;

    fn session_for(id: Uuid) -> Session {
        Session::new(
            Identity {
                id,
                email: "ada@example.com".to_string(),
                user_metadata: Metadata::new(),
            },
            "token",
        )
    }

    #[tokio::test]
    async fn starts_loading_then_empty() {
        let (store, writer) = SessionStore::channel();
        let manager = HabitManager::new(Arc::new(MemoryBackend::new()), store);
        assert_eq!(manager.view(), HabitListView::Loading);

        let id = Uuid::new_v4();
        writer.apply(AuthTransition::Restored(Some(session_for(id))));
        manager.load_habits(Some(id)).await;
        assert_eq!(manager.view(), HabitListView::Empty);
    }

    #[tokio::test]
    async fn absent_user_makes_no_call() {
        let backend = Arc::new(MemoryBackend::new());
        let (store, _writer) = SessionStore::channel();
        let manager = HabitManager::new(backend.clone(), store);

        assert!(manager.load_habits(None).await.is_empty());
        assert_eq!(backend.table_calls(), 0);
    }

    #[tokio::test]
    async fn toggle_unknown_habit_is_not_found() {
        let (store, _writer) = SessionStore::channel();
        let manager = HabitManager::new(Arc::new(MemoryBackend::new()), store);
        assert_eq!(manager.toggle_habit(Uuid::new_v4()).await, Err(AppError::NotFound));
    }

    #[tokio::test]
    async fn blank_title_is_rejected_locally() {
        let backend = Arc::new(MemoryBackend::new());
        let (store, _writer) = SessionStore::channel();
        let manager = HabitManager::new(backend.clone(), store);

        let err = manager.create_habit(HabitInput::titled("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(backend.table_calls(), 0);
    }
}
