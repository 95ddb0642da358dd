use garde::Validate;

use crate::error::{AppError, Result};
use crate::models::habit::HabitInput;

#[derive(Validate)]
struct HabitForm {
    #[garde(custom(title_present), length(max = 200))]
    title: String,
    #[garde(length(max = 500))]
    why: Option<String>,
    #[garde(range(min = 1, max = 365))]
    reminder_interval: u32,
}

fn title_present(value: &str, _: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Habit title is required"));
    }
    Ok(())
}

/// Validates the "add habit" form before anything is sent.
pub fn validate_habit_input(input: &HabitInput) -> Result<()> {
    let form = HabitForm {
        title: input.title.clone(),
        why: input.why.clone(),
        reminder_interval: input.reminder_interval,
    };

    form.validate().map_err(|report| {
        let message = report
            .iter()
            .next()
            .map(|(path, error)| match path.to_string().as_str() {
                "title" => error.to_string(),
                "why" => "Reason must be at most 500 characters".to_string(),
                "reminder_interval" => "Reminder interval must be between 1 and 365 days".to_string(),
                other => format!("{}: {}", other, error),
            })
            .unwrap_or_else(|| "Invalid habit".to_string());
        AppError::Validation(message)
    })
}
