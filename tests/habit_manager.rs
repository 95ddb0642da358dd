use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use habitforge::{
    AppError, AppState, AuthError, Config, DataError,
    models::habit::{Frequency, Habit, HabitInput, NewHabit},
    navigation::RecordingNavigator,
    remote::{
        api::RemoteError,
        memory::{MemoryBackend, Operation},
    },
    services::habits::{HabitListView, ListStatus},
};

const ADA: (&str, &str) = ("ada@example.com", "hunter22");
const GRACE: (&str, &str) = ("grace@example.com", "cobol1959");

// Shared test context
struct TestContext {
    backend: Arc<MemoryBackend>,
    state: AppState<MemoryBackend, RecordingNavigator>,
    ada: Uuid,
    grace: Uuid,
}

impl TestContext {
    async fn start() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let ada = backend.register_user(ADA.0, ADA.1).id;
        let grace = backend.register_user(GRACE.0, GRACE.1).id;
        let state = AppState::new(
            &Config::offline(),
            backend.clone(),
            Arc::new(RecordingNavigator::new()),
        );
        state.start().await;
        Self {
            backend,
            state,
            ada,
            grace,
        }
    }

    async fn sign_in(&self, (email, password): (&str, &str)) {
        self.state.auth.sign_in(email, password).await.unwrap();
    }

    fn seed(&self, owner: Uuid, title: &str, streak_days: u32) -> Habit {
        let mut habit = NewHabit::new(owner, &HabitInput::titled(title)).into_habit(Uuid::new_v4());
        habit.streak_days = streak_days;
        self.backend.seed_habit(habit.clone());
        habit
    }
}

fn api_error(status: u16, code: &str) -> RemoteError {
    RemoteError::api(status, Some(code.to_string()), "rejected")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_is_scoped_to_user() {
        let context = TestContext::start().await;
        context.seed(context.ada, "Read", 3);
        context.seed(context.ada, "Run", 1);
        context.seed(context.grace, "Compile", 9);
        context.sign_in(ADA).await;

        let habits = context.state.habits.load_habits(Some(context.ada)).await;

        assert_eq!(habits.len(), 2);
        assert!(habits.iter().all(|h| h.user_id == context.ada));
    }

    #[tokio::test]
    async fn test_absent_user_makes_no_request() {
        let context = TestContext::start().await;

        let habits = context.state.habits.load_habits(None).await;

        assert!(habits.is_empty());
        assert_eq!(context.backend.call_count(Operation::SelectHabits), 0);
    }

    #[tokio::test]
    async fn test_created_habit_is_owned_by_live_user() {
        let context = TestContext::start().await;
        context.sign_in(ADA).await;
        context.state.habits.load_habits(Some(context.ada)).await;

        let habit = context
            .state
            .habits
            .create_habit(HabitInput {
                title: "Stretch".to_string(),
                frequency: Frequency::Weekly,
                why: Some("Back pain".to_string()),
                reminder_interval: 7,
            })
            .await
            .unwrap();

        assert_eq!(habit.user_id, context.ada);
        assert_eq!(habit.streak_days, 0);
        assert_eq!(context.state.habits.habits(), vec![habit.clone()]);
        assert_eq!(context.backend.habit(habit.id), Some(habit));
        // the draft is cleared after a successful submit
        assert_eq!(context.state.habits.form(), HabitInput::default());
    }

    #[tokio::test]
    async fn test_session_switch_clears_collection() {
        let context = TestContext::start().await;
        context.seed(context.ada, "Read", 3);
        context.sign_in(ADA).await;
        context.state.habits.load_habits(Some(context.ada)).await;
        assert_eq!(context.state.habits.habits().len(), 1);

        context.state.auth.sign_out().await.unwrap();
        context.sign_in(GRACE).await;

        assert!(context.state.habits.habits().is_empty());
        let habit = context
            .state
            .habits
            .create_habit(HabitInput::titled("Compile"))
            .await
            .unwrap();
        assert_eq!(habit.user_id, context.grace);
        assert!(context.state.habits.habits().iter().all(|h| h.user_id == context.grace));
    }

    #[tokio::test]
    async fn test_create_ownership_across_session_switch() {
        // the switch starts before, during and after the insert lands
        for offset in [0u64, 15, 30, 45] {
            let context = TestContext::start().await;
            context.sign_in(ADA).await;
            context.state.habits.load_habits(Some(context.ada)).await;
            context.backend.set_latency(Some(Duration::from_millis(30)));

            let create = context.state.habits.create_habit(HabitInput::titled("Stretch"));
            let switch = async {
                tokio::time::sleep(Duration::from_millis(offset)).await;
                context.state.auth.sign_out().await.unwrap();
                context.state.auth.sign_in(GRACE.0, GRACE.1).await.unwrap();
            };
            let (created, ()) = tokio::join!(create, switch);

            match created {
                Ok(habit) => assert_eq!(habit.user_id, context.ada, "offset {}", offset),
                Err(err) => assert_eq!(err, AppError::Data(DataError::PermissionDenied), "offset {}", offset),
            }
            assert!(context.backend.habits().iter().all(|h| h.user_id == context.ada));

            let grace = context.grace;
            tokio::time::timeout(
                Duration::from_secs(2),
                context.state.session().wait_for(|s| s.user().is_some_and(|u| u.id == grace)),
            )
            .await
            .unwrap()
            .unwrap();
            assert!(context.state.habits.habits().is_empty(), "offset {}", offset);
        }
    }

    #[tokio::test]
    async fn test_failed_sign_in_keeps_collection() {
        let context = TestContext::start().await;
        context.seed(context.ada, "Read", 3);
        context.sign_in(ADA).await;
        context.state.habits.load_habits(Some(context.ada)).await;

        let err = context.state.auth.sign_in(GRACE.0, "wrong-password").await.unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(context.state.auth.user().map(|u| u.id), Some(context.ada));
        assert_eq!(context.state.habits.habits().len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_identity() {
        let context = TestContext::start().await;

        let err = context
            .state
            .habits
            .create_habit(HabitInput::titled("Read"))
            .await
            .unwrap_err();

        assert_eq!(err, AppError::Auth(AuthError::NotAuthenticated));
        assert_eq!(context.backend.call_count(Operation::InsertHabit), 0);
        assert!(context.backend.habits().is_empty());
    }

    #[tokio::test]
    async fn test_blank_title_never_reaches_service() {
        let context = TestContext::start().await;
        context.sign_in(ADA).await;
        context.state.habits.set_form(HabitInput::titled("   "));

        let err = context.state.habits.submit_form().await.unwrap_err();

        assert_eq!(err, AppError::Validation("Habit title is required".to_string()));
        assert_eq!(context.backend.call_count(Operation::InsertHabit), 0);
    }

    #[tokio::test]
    async fn test_toggle_is_serialized_per_habit() {
        let context = TestContext::start().await;
        let seeded = context.seed(context.ada, "Read", 5);
        context.sign_in(ADA).await;
        context.state.habits.load_habits(Some(context.ada)).await;

        context.backend.set_latency(Some(Duration::from_millis(50)));
        let (first, second) = tokio::join!(
            context.state.habits.toggle_habit(seeded.id),
            context.state.habits.toggle_habit(seeded.id),
        );

        assert_eq!(first.unwrap().streak_days, 6);
        assert_eq!(second, Err(AppError::WriteInFlight(seeded.id)));
        assert_eq!(context.backend.habit(seeded.id).unwrap().streak_days, 6);
        assert_eq!(context.state.habits.habits()[0].streak_days, 6);
        assert!(!context.state.habits.is_in_flight(seeded.id));
    }

    #[tokio::test]
    async fn test_failed_toggle_rolls_back() {
        let context = TestContext::start().await;
        let seeded = context.seed(context.ada, "Read", 5);
        context.sign_in(ADA).await;
        context.state.habits.load_habits(Some(context.ada)).await;

        context.backend.fail_next(Operation::UpdateHabit, api_error(403, "42501"));
        let err = context.state.habits.toggle_habit(seeded.id).await.unwrap_err();

        assert_eq!(err, AppError::Data(DataError::PermissionDenied));
        assert_eq!(context.state.habits.habits()[0].streak_days, 5);
        assert_eq!(context.backend.habit(seeded.id).unwrap().streak_days, 5);

        // the slot is free again
        let habit = context.state.habits.toggle_habit(seeded.id).await.unwrap();
        assert_eq!(habit.streak_days, 6);
    }

    #[tokio::test]
    async fn test_toggle_of_foreign_row_is_denied() {
        let context = TestContext::start().await;
        context.seed(context.ada, "Read", 5);
        context.sign_in(ADA).await;
        context.state.habits.load_habits(Some(context.ada)).await;

        // another habit the store will not show to this caller
        let foreign = context.seed(context.grace, "Compile", 2);
        let err = context.state.habits.toggle_habit(foreign.id).await.unwrap_err();

        assert_eq!(err, AppError::NotFound);
        assert_eq!(context.backend.habit(foreign.id).unwrap().streak_days, 2);
    }

    #[tokio::test]
    async fn test_create_errors_are_classified() {
        let context = TestContext::start().await;
        context.sign_in(ADA).await;

        let cases = [
            (api_error(403, "42501"), DataError::PermissionDenied),
            (api_error(400, "23514"), DataError::ValidationFailed),
            (api_error(500, "XX000"), DataError::Unknown),
            (RemoteError::transport("connection reset"), DataError::NetworkFailure),
        ];

        let mut messages = Vec::new();
        for (remote, expected) in cases {
            context.backend.fail_next(Operation::InsertHabit, remote);
            let err = context
                .state
                .habits
                .create_habit(HabitInput::titled("Read"))
                .await
                .unwrap_err();
            assert_eq!(err, AppError::Data(expected));
            messages.push(err.user_message());
        }

        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), 4);
        assert!(context.backend.habits().is_empty());
    }

    #[tokio::test]
    async fn test_loading_empty_and_error_are_distinct() {
        let context = TestContext::start().await;
        context.sign_in(ADA).await;
        assert_eq!(context.state.habits.view(), HabitListView::Loading);

        context.state.habits.load_habits(Some(context.ada)).await;
        assert_eq!(context.state.habits.view(), HabitListView::Empty);

        context.backend.fail_next(Operation::SelectHabits, api_error(401, "PGRST301"));
        let habits = context.state.habits.refresh().await;
        assert!(habits.is_empty());
        assert_eq!(
            context.state.habits.status(),
            ListStatus::Failed(DataError::PermissionDenied)
        );
        assert_eq!(
            context.state.habits.view(),
            HabitListView::Error(DataError::PermissionDenied.user_message().to_string())
        );

        context.seed(context.ada, "Read", 1);
        context.state.habits.refresh().await;
        assert!(matches!(context.state.habits.view(), HabitListView::Habits(h) if h.len() == 1));
    }

    #[tokio::test]
    async fn test_stats_cover_collection() {
        let context = TestContext::start().await;
        context.seed(context.ada, "Read", 3);
        context.seed(context.ada, "Run", 10);
        context.sign_in(ADA).await;
        context.state.habits.load_habits(Some(context.ada)).await;

        let stats = context.state.habits.stats();
        assert_eq!(stats.total_habits, 2);
        assert_eq!(stats.longest_streak, 10);
        assert_eq!(stats.total_streak_days, 13);
    }
}
