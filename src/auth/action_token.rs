//! Single-use, expiring action tokens.
//!
//! The token id is the bearer credential itself: it is embedded verbatim in
//! the link sent to the user. Lookups never apply the usability predicate;
//! callers decide how "missing", "used" and "expired" are reported.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::model::{Action, ActionToken, UserUpdate};
use super::store::{CredentialStore, RedeemOutcome};

const DEFAULT_ACTION_TOKEN_TTL_SECONDS: i64 = 15 * 60;

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|poisoned| *poisoned.into_inner(), |now| *now)
    }
}

/// Generate an unguessable token id (32 random bytes, base64url).
pub(crate) fn generate_token_id() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate action token id")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

pub struct ActionTokenService {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ActionTokenService {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::seconds(DEFAULT_ACTION_TOKEN_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl = Duration::seconds(seconds);
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create and persist a fresh token for `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if id generation or the store insert fails.
    #[instrument(skip(self))]
    pub async fn issue(&self, entity_id: Uuid, action: Action) -> Result<ActionToken> {
        let created_at = self.clock.now();
        let token = ActionToken {
            id: generate_token_id()?,
            entity_id,
            action,
            created_at,
            expires_at: created_at + self.ttl,
            executed_at: None,
        };
        self.store.create_action_token(&token).await?;
        debug!(expires_at = %token.expires_at, "action token issued");
        Ok(token)
    }

    /// Plain lookup; `None` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails.
    pub async fn validate(&self, id: &str) -> Result<Option<ActionToken>> {
        self.store.find_action_token(id).await
    }

    /// Atomically mark the token executed; `false` if someone else already did.
    ///
    /// # Errors
    ///
    /// Returns an error if the store update fails.
    pub async fn mark_executed(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        self.store.claim_action_token(id, at).await
    }

    /// Mark the token executed and apply `update` to its entity in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the store transaction fails; nothing is changed then.
    pub async fn redeem(
        &self,
        token: &ActionToken,
        at: DateTime<Utc>,
        update: &UserUpdate,
    ) -> Result<RedeemOutcome> {
        self.store
            .redeem_action_token(&token.id, at, token.entity_id, update)
            .await
    }
}
