use zeroize::Zeroizing;

use crate::error::AuthError;
use crate::navigation::Navigator;
use crate::pages::banner::Banner;
use crate::remote::api::Backend;
use crate::state::AppState;
use crate::validation::auth::{FieldErrors, validate_credentials};

/// The general banner text for a failed sign-in.
pub fn login_message(err: AuthError) -> &'static str {
    match err {
        AuthError::InvalidCredentials | AuthError::UserNotFound | AuthError::RateLimited => {
            err.user_message()
        }
        _ => "Login failed. Please try again.",
    }
}

/// The login form.
#[derive(Default)]
pub struct LoginPage {
    pub email: String,
    pub password: Zeroizing<String>,
    /// Inline errors under each field.
    pub errors: FieldErrors,
    pub banner: Option<Banner>,
    /// Show a link to the signup page next to the banner.
    pub offer_signup: bool,
    pub submitting: bool,
}

impl LoginPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Zeroizing::new(password.into()),
            ..Self::default()
        }
    }

    /// Validates the form and signs in.
    ///
    /// Nothing is sent while a field error is showing. Redirecting on success
    /// is left to the auth listener.
    ///
    /// # Returns
    ///
    /// `true` if the user is now signed in.
    pub async fn submit<R: Backend, N: Navigator>(&mut self, state: &AppState<R, N>) -> bool {
        self.banner = None;
        self.offer_signup = false;

        self.errors = validate_credentials(&self.email, &self.password);
        if !self.errors.is_empty() {
            return false;
        }

        self.submitting = true;
        let result = state.auth.sign_in(self.email.trim(), &self.password).await;
        self.submitting = false;

        match result {
            Ok(_) => {
                self.password = Zeroizing::new(String::new());
                true
            }
            Err(e) => {
                self.offer_signup = e == AuthError::UserNotFound;
                self.banner = Some(Banner::error(login_message(e)));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_texts() {
        assert_eq!(
            login_message(AuthError::InvalidCredentials),
            "Incorrect email or password. Please try again."
        );
        assert_eq!(login_message(AuthError::UserNotFound), "No account found. Please sign up.");
        assert_eq!(
            login_message(AuthError::RateLimited),
            "Too many attempts. Try again later or reset password."
        );
        assert_eq!(login_message(AuthError::Unknown), "Login failed. Please try again.");
        assert_eq!(login_message(AuthError::Timeout), "Login failed. Please try again.");
    }
}
