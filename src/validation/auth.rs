use garde::Validate;

use crate::error::{AppError, Result};

/// Minimum password length accepted by the auth service.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Validate)]
struct Credentials {
    #[garde(email)]
    email: String,
    #[garde(length(min = 6, max = 128))]
    password: String,
}

#[derive(Validate)]
struct Registration {
    #[garde(custom(not_blank), length(max = 100))]
    name: String,
    #[garde(dive)]
    credentials: Credentials,
}

fn not_blank(value: &str, _: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Name is required"));
    }
    Ok(())
}

/// Per-field errors rendered inline under a login or signup form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

fn email_message(email: &str) -> String {
    if email.is_empty() {
        "Email is required".to_string()
    } else {
        "Email address is invalid".to_string()
    }
}

fn password_message(password: &str) -> String {
    if password.is_empty() {
        "Password is required".to_string()
    } else if password.len() < MIN_PASSWORD_LEN {
        format!("Password must be at least {} characters", MIN_PASSWORD_LEN)
    } else {
        "Password must be at most 128 characters".to_string()
    }
}

fn collect(report: &garde::Report, email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::default();
    for (path, error) in report.iter() {
        let path = path.to_string();
        if path.ends_with("email") {
            errors.email.get_or_insert_with(|| email_message(email));
        } else if path.ends_with("password") {
            errors.password.get_or_insert_with(|| password_message(password));
        } else if path.ends_with("name") {
            errors.name.get_or_insert_with(|| error.to_string());
        }
    }
    errors
}

/// Validates login input.
///
/// # Arguments
///
/// * `email` - The email address as typed.
/// * `password` - The password as typed.
///
/// # Returns
///
/// The inline errors; empty when the form may be submitted.
pub fn validate_credentials(email: &str, password: &str) -> FieldErrors {
    let input = Credentials {
        email: email.trim().to_string(),
        password: password.to_string(),
    };
    match input.validate() {
        Ok(()) => FieldErrors::default(),
        Err(report) => collect(&report, &input.email, password),
    }
}

/// Validates signup input.
pub fn validate_registration(name: &str, email: &str, password: &str) -> FieldErrors {
    let input = Registration {
        name: name.to_string(),
        credentials: Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        },
    };
    match input.validate() {
        Ok(()) => FieldErrors::default(),
        Err(report) => collect(&report, &input.credentials.email, password),
    }
}

/// Validates an email/password pair, failing with the first inline error.
pub fn require_credentials(email: &str, password: &str) -> Result<()> {
    let errors = validate_credentials(email, password);
    match errors.email.or(errors.password) {
        Some(msg) => Err(AppError::Validation(msg)),
        None => Ok(()),
    }
}
