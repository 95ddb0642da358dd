use zeroize::Zeroizing;

use crate::navigation::Navigator;
use crate::pages::banner::Banner;
use crate::remote::api::Backend;
use crate::services::auth::SignUpResult;
use crate::state::AppState;
use crate::validation::auth::{FieldErrors, validate_registration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    SignedIn,
    ConfirmationRequired,
}

/// The signup form.
#[derive(Default)]
pub struct SignupPage {
    pub name: String,
    pub email: String,
    pub password: Zeroizing<String>,
    pub errors: FieldErrors,
    pub banner: Option<Banner>,
}

impl SignupPage {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: Zeroizing::new(password.into()),
            ..Self::default()
        }
    }

    /// Validates the form and creates the account. The `SIGNED_IN`
    /// notification that follows takes the user to the dashboard.
    pub async fn submit<R: Backend, N: Navigator>(&mut self, state: &AppState<R, N>) -> Option<SignupOutcome> {
        self.banner = None;
        self.errors = validate_registration(&self.name, &self.email, &self.password);
        if !self.errors.is_empty() {
            return None;
        }

        match state
            .auth
            .sign_up(&self.name, self.email.trim(), &self.password)
            .await
        {
            Ok(SignUpResult::SignedIn(_)) => {
                self.password = Zeroizing::new(String::new());
                Some(SignupOutcome::SignedIn)
            }
            Ok(SignUpResult::ConfirmationRequired(_)) => {
                self.banner = Some(Banner::success(
                    "Check your email to confirm your account, then sign in.",
                ));
                Some(SignupOutcome::ConfirmationRequired)
            }
            Err(e) => {
                self.banner = Some(Banner::error(e.user_message()));
                None
            }
        }
    }
}
