//! Records owned by the credential store.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity record.
///
/// A user is verified iff `email_verified_at` is set; once set it is never
/// cleared. `refresh_token` holds the single active session, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub refresh_token: Option<String>,
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl User {
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Fields supplied when creating a user; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial user update. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserUpdate {
    /// `Some(None)` clears the stored refresh token.
    pub refresh_token: Option<Option<String>>,
    /// Applied only when the stored value is still null.
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl UserUpdate {
    #[must_use]
    pub fn set_refresh_token(token: String) -> Self {
        Self {
            refresh_token: Some(Some(token)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn clear_refresh_token() -> Self {
        Self {
            refresh_token: Some(None),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_email_verified_at(mut self, at: DateTime<Utc>) -> Self {
        self.email_verified_at = Some(at);
        self
    }

    /// Apply the update onto an in-memory record.
    pub fn apply(&self, user: &mut User) {
        if let Some(token) = &self.refresh_token {
            user.refresh_token.clone_from(token);
        }
        if let Some(at) = self.email_verified_at {
            if user.email_verified_at.is_none() {
                user.email_verified_at = Some(at);
            }
        }
    }
}

/// Kinds of single-use actions an [`ActionToken`] can authorize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    VerifyEmail,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify email",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "verify email" => Ok(Self::VerifyEmail),
            other => Err(anyhow::anyhow!("unknown action name: {other}")),
        }
    }
}

/// Single-use, time-boxed capability bound to one entity and one action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionToken {
    pub id: String,
    pub entity_id: Uuid,
    pub action: Action,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl ActionToken {
    #[must_use]
    pub fn is_executed(&self) -> bool {
        self.executed_at.is_some()
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Usable iff never executed and not yet expired.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_executed() && !self.is_expired(now)
    }
}
