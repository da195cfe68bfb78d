//! Credential store abstraction.
//!
//! The store is the single source of truth for users and action tokens and
//! the only synchronization point between concurrent requests. Two
//! implementations ship with the crate: [`MemoryStore`] for tests and local
//! runs, and [`PgStore`] backed by Postgres.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{ActionToken, NewUser, User, UserUpdate};

/// Outcome when inserting a user.
#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(User),
    /// Username or email already taken.
    Conflict,
}

/// Outcome when redeeming an action token together with its user update.
#[derive(Debug)]
pub enum RedeemOutcome {
    Redeemed(User),
    /// The token is missing or was already executed; nothing changed.
    AlreadyExecuted,
    /// The bound user is gone; the claim was rolled back.
    UserMissing,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_refresh_token(&self, token: &str) -> Result<Option<User>>;

    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome>;

    /// Apply a partial update; returns the updated record or `None` if the
    /// user does not exist.
    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>>;

    async fn create_action_token(&self, token: &ActionToken) -> Result<()>;

    async fn find_action_token(&self, id: &str) -> Result<Option<ActionToken>>;

    /// Atomically set `executed_at` if it is still null.
    ///
    /// Returns `false` when the token is missing or was already executed.
    async fn claim_action_token(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Claim the token and apply `update` to `user_id` as one unit: either
    /// both happen or neither does.
    async fn redeem_action_token(
        &self,
        id: &str,
        at: DateTime<Utc>,
        user_id: Uuid,
        update: &UserUpdate,
    ) -> Result<RedeemOutcome>;

    /// All tokens ever issued for an entity, oldest first.
    async fn action_tokens_for(&self, entity_id: Uuid) -> Result<Vec<ActionToken>>;

    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<()>;
}
