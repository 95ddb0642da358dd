//! Client core for the HabitForge habit tracker.
//!
//! Authentication, persistence and row-level access control live in a hosted
//! auth/data service. This crate keeps the local auth session, the habit
//! collection and the page controllers consistent with that service.

pub mod config;
pub mod error;
pub mod navigation;
pub mod state;

pub mod models {
    pub mod habit;
    pub mod identity;
    pub mod preferences;
    pub mod profile;
    pub mod session;
}

pub mod remote {
    pub mod api;
    pub mod memory;
    pub mod supabase;
}

pub mod session {
    pub mod machine;
    pub mod store;
}

pub mod services {
    pub mod auth;
    pub mod habits;
    pub mod preferences;
    pub mod profile;
}

pub mod validation {
    pub mod auth;
    pub mod habit;
    pub mod profile;
}

pub mod pages {
    pub mod banner;
    pub mod dashboard;
    pub mod login;
    pub mod preferences;
    pub mod profile;
    pub mod signup;
}

pub use config::Config;
pub use error::{AppError, AuthError, DataError, Result};
pub use state::AppState;
