use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The project URL of the hosted auth/data service.
    pub supabase_url: String,
    /// The public API key of the hosted service.
    pub anon_key: Zeroizing<String>,
    /// Upper bound for sign-in, sign-up, sign-out and session restore.
    pub auth_timeout: Duration,
    /// Upper bound for any single HTTP request.
    pub request_timeout: Duration,
    /// Run against the in-memory backend instead of the hosted service.
    pub offline: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let offline = env::var("HABITFORGE_OFFLINE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let (supabase_url, anon_key) = if offline {
            (
                env::var("SUPABASE_URL").unwrap_or_else(|_| "memory://local".to_string()),
                Zeroizing::new(env::var("SUPABASE_ANON_KEY").unwrap_or_default()),
            )
        } else {
            (
                env::var("SUPABASE_URL").context("SUPABASE_URL must be set")?,
                Zeroizing::new(env::var("SUPABASE_ANON_KEY").context("SUPABASE_ANON_KEY must be set")?),
            )
        };

        if !offline && !supabase_url.starts_with("http") {
            anyhow::bail!("SUPABASE_URL must be an http(s) URL");
        }

        Ok(Self {
            supabase_url,
            anon_key,
            auth_timeout: Duration::from_secs(
                env::var("AUTH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .context("Invalid AUTH_TIMEOUT_SECS")?,
            ),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid REQUEST_TIMEOUT_SECS")?,
            ),
            offline,
        })
    }

    /// Offline configuration with default timeouts.
    pub fn offline() -> Self {
        Self {
            supabase_url: "memory://local".to_string(),
            anon_key: Zeroizing::new(String::new()),
            auth_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            offline: true,
        }
    }
}
