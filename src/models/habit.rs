use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How often a habit is meant to be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            _ => None,
        }
    }
}

/// The `schedule` jsonb column of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: Frequency,
}

/// Represents a habit row in the remote `habits` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    /// The unique identifier for the habit.
    pub id: Uuid,
    /// The ID of the user who owns the habit.
    pub user_id: Uuid,
    /// The habit's title.
    pub title: String,
    /// How often the habit repeats.
    pub schedule: Schedule,
    /// Why the user wants to keep this habit.
    #[serde(default)]
    pub why: Option<String>,
    /// Consecutive completions.
    #[serde(default)]
    pub streak_days: u32,
    /// Days between reminders.
    #[serde(default = "default_reminder_interval")]
    pub reminder_interval: u32,
    /// Remaining days of a pause, if any.
    #[serde(default)]
    pub paused_days_remaining: u32,
}

fn default_reminder_interval() -> u32 {
    1
}

/// The user-editable part of a habit, as captured by the "add habit" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitInput {
    pub title: String,
    pub frequency: Frequency,
    pub why: Option<String>,
    pub reminder_interval: u32,
}

impl Default for HabitInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            frequency: Frequency::Daily,
            why: None,
            reminder_interval: default_reminder_interval(),
        }
    }
}

impl HabitInput {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Insert payload for the `habits` table; the row id is assigned remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewHabit {
    pub user_id: Uuid,
    pub title: String,
    pub schedule: Schedule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    pub streak_days: u32,
    pub reminder_interval: u32,
    pub paused_days_remaining: u32,
}

impl NewHabit {
    /// Builds an insert payload owned by `user_id`.
    pub fn new(user_id: Uuid, input: &HabitInput) -> Self {
        let why = input
            .why
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string);

        Self {
            user_id,
            title: input.title.trim().to_string(),
            schedule: Schedule {
                frequency: input.frequency,
            },
            why,
            streak_days: 0,
            reminder_interval: input.reminder_interval,
            paused_days_remaining: 0,
        }
    }

    /// Turns the payload into a stored row with the given id.
    pub fn into_habit(self, id: Uuid) -> Habit {
        Habit {
            id,
            user_id: self.user_id,
            title: self.title,
            schedule: self.schedule,
            why: self.why,
            streak_days: self.streak_days,
            reminder_interval: self.reminder_interval,
            paused_days_remaining: self.paused_days_remaining,
        }
    }
}

/// Streak statistics shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HabitStats {
    pub total_habits: usize,
    pub longest_streak: u32,
    pub total_streak_days: u64,
}

impl HabitStats {
    pub fn from_habits(habits: &[Habit]) -> Self {
        Self {
            total_habits: habits.len(),
            longest_streak: habits.iter().map(|h| h.streak_days).max().unwrap_or(0),
            total_streak_days: habits.iter().map(|h| u64::from(h.streak_days)).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_remote_row() {
        let row = r#"{
            "id": "6f1c2a52-8d4e-4b8e-9a57-0d8f1c6f9e11",
            "user_id": "0b7e4a37-52b1-4a4c-a3e5-2c1c5d7e8f90",
            "title": "Read 30 minutes",
            "schedule": {"frequency": "weekly"},
            "why": null,
            "streak_days": 12,
            "reminder_interval": 2,
            "paused_days_remaining": 0
        }"#;
        let habit: Habit = sonic_rs::from_str(row).unwrap();
        assert_eq!(habit.schedule.frequency, Frequency::Weekly);
        assert_eq!(habit.streak_days, 12);
        assert!(habit.why.is_none());
    }

    #[test]
    fn new_habit_trims_and_starts_at_zero() {
        let input = HabitInput {
            title: "  Meditate ".to_string(),
            frequency: Frequency::Daily,
            why: Some("   ".to_string()),
            reminder_interval: 3,
        };
        let new = NewHabit::new(Uuid::nil(), &input);
        assert_eq!(new.title, "Meditate");
        assert_eq!(new.why, None);
        assert_eq!(new.streak_days, 0);

        let json = sonic_rs::to_string(&new).unwrap();
        assert!(json.contains(r#""schedule":{"frequency":"daily"}"#));
        assert!(!json.contains("why"));
    }

    #[test]
    fn stats_over_collection() {
        let mk = || NewHabit::new(Uuid::nil(), &HabitInput::titled("x")).into_habit(Uuid::new_v4());
        let mut habits = vec![mk(), mk(), mk()];
        habits[0].streak_days = 7;
        habits[1].streak_days = 5;
        habits[2].streak_days = 12;

        let stats = HabitStats::from_habits(&habits);
        assert_eq!(stats.total_habits, 3);
        assert_eq!(stats.longest_streak, 12);
        assert_eq!(stats.total_streak_days, 24);
        assert_eq!(HabitStats::from_habits(&[]), HabitStats::default());
    }

    #[test]
    fn frequency_parse() {
        assert_eq!(Frequency::parse("Weekly"), Some(Frequency::Weekly));
        assert_eq!(Frequency::parse("yearly"), None);
    }
}
