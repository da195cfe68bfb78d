//! Shared state for the auth handlers.

use crate::auth::SessionManager;

const DEFAULT_COOKIE_MAX_AGE_SECONDS: i64 = 24 * 60 * 60;

/// HTTP-facing knobs for the refresh cookie.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    cookie_max_age_seconds: i64,
    cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cookie_max_age_seconds: DEFAULT_COOKIE_MAX_AGE_SECONDS,
            cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_cookie_max_age_seconds(mut self, seconds: i64) -> Self {
        self.cookie_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn cookie_max_age_seconds(&self) -> i64 {
        self.cookie_max_age_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AuthState {
    sessions: SessionManager,
    config: AuthConfig,
}

impl AuthState {
    #[must_use]
    pub fn new(sessions: SessionManager, config: AuthConfig) -> Self {
        Self { sessions, config }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}
