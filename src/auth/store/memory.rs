//! In-memory credential store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CreateUserOutcome, CredentialStore, RedeemOutcome};
use crate::auth::model::{ActionToken, NewUser, User, UserUpdate};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    action_tokens: HashMap<String, ActionToken>,
}

/// Process-local store; every operation holds the lock for a single step,
/// which gives the same per-record atomicity a document store would.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn find_user<F>(&self, predicate: F) -> Option<User>
    where
        F: Fn(&User) -> bool + Send,
    {
        let tables = self.tables.read().await;
        tables.users.values().find(|user| predicate(user)).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.find_user(|user| user.username == username).await)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find_user(|user| user.email == email).await)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_refresh_token(&self, token: &str) -> Result<Option<User>> {
        Ok(self
            .find_user(|user| user.refresh_token.as_deref() == Some(token))
            .await)
    }

    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .users
            .values()
            .any(|existing| existing.username == user.username || existing.email == user.email);
        if taken {
            return Ok(CreateUserOutcome::Conflict);
        }

        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            refresh_token: None,
            email_verified_at: None,
        };
        tables.users.insert(record.id, record.clone());
        Ok(CreateUserOutcome::Created(record))
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            update.apply(user);
            user.clone()
        }))
    }

    async fn create_action_token(&self, token: &ActionToken) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.action_tokens.contains_key(&token.id) {
            return Err(anyhow::anyhow!("duplicate action token id"));
        }
        tables
            .action_tokens
            .insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn find_action_token(&self, id: &str) -> Result<Option<ActionToken>> {
        Ok(self.tables.read().await.action_tokens.get(id).cloned())
    }

    async fn claim_action_token(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.action_tokens.get_mut(id) {
            Some(token) if token.executed_at.is_none() => {
                token.executed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn redeem_action_token(
        &self,
        id: &str,
        at: DateTime<Utc>,
        user_id: Uuid,
        update: &UserUpdate,
    ) -> Result<RedeemOutcome> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let Some(token) = tables
            .action_tokens
            .get_mut(id)
            .filter(|token| token.executed_at.is_none())
        else {
            return Ok(RedeemOutcome::AlreadyExecuted);
        };
        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(RedeemOutcome::UserMissing);
        };

        token.executed_at = Some(at);
        update.apply(user);
        Ok(RedeemOutcome::Redeemed(user.clone()))
    }

    async fn action_tokens_for(&self, entity_id: Uuid) -> Result<Vec<ActionToken>> {
        let tables = self.tables.read().await;
        let mut tokens: Vec<ActionToken> = tables
            .action_tokens
            .values()
            .filter(|token| token.entity_id == entity_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|token| token.created_at);
        Ok(tokens)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::model::Action;
    use anyhow::{Context, Result};
    use chrono::Duration;
    use std::sync::Arc;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    async fn created(store: &MemoryStore, username: &str, email: &str) -> Result<User> {
        match store.create_user(new_user(username, email)).await? {
            CreateUserOutcome::Created(user) => Ok(user),
            CreateUserOutcome::Conflict => Err(anyhow::anyhow!("unexpected conflict")),
        }
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_username_or_email() -> Result<()> {
        let store = MemoryStore::new();
        created(&store, "alice", "alice@example.com").await?;

        let outcome = store
            .create_user(new_user("alice", "other@example.com"))
            .await?;
        assert!(matches!(outcome, CreateUserOutcome::Conflict));

        let outcome = store
            .create_user(new_user("other", "alice@example.com"))
            .await?;
        assert!(matches!(outcome, CreateUserOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn lookups_by_every_unique_field() -> Result<()> {
        let store = MemoryStore::new();
        let user = created(&store, "bob", "bob@example.com").await?;
        store
            .update_user(user.id, &UserUpdate::set_refresh_token("rt".to_string()))
            .await?;

        let by_name = store.find_user_by_username("bob").await?.context("name")?;
        let by_email = store
            .find_user_by_email("bob@example.com")
            .await?
            .context("email")?;
        let by_id = store.find_user_by_id(user.id).await?.context("id")?;
        let by_token = store
            .find_user_by_refresh_token("rt")
            .await?
            .context("token")?;

        for found in [by_name, by_email, by_id, by_token] {
            assert_eq!(found.id, user.id);
        }
        assert!(store.find_user_by_refresh_token("other").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn update_missing_user_returns_none() -> Result<()> {
        let store = MemoryStore::new();
        let updated = store
            .update_user(Uuid::new_v4(), &UserUpdate::clear_refresh_token())
            .await?;
        assert!(updated.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_claims_have_a_single_winner() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let token = ActionToken {
            id: "claim-me".to_string(),
            entity_id: Uuid::new_v4(),
            action: Action::VerifyEmail,
            created_at: now,
            expires_at: now + Duration::minutes(15),
            executed_at: None,
        };
        store.create_action_token(&token).await?;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.claim_action_token("claim-me", Utc::now()).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await?? {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(!store.claim_action_token("missing", now).await?);
        Ok(())
    }

    #[tokio::test]
    async fn redeem_claims_and_updates_together() -> Result<()> {
        let store = MemoryStore::new();
        let user = created(&store, "carol", "carol@example.com").await?;
        let now = Utc::now();
        let token = ActionToken {
            id: "redeem-me".to_string(),
            entity_id: user.id,
            action: Action::VerifyEmail,
            created_at: now,
            expires_at: now + Duration::minutes(15),
            executed_at: None,
        };
        store.create_action_token(&token).await?;
        let update = UserUpdate::set_refresh_token("rt".to_string()).with_email_verified_at(now);

        // A missing user leaves the token untouched.
        let outcome = store
            .redeem_action_token("redeem-me", now, Uuid::new_v4(), &update)
            .await?;
        assert!(matches!(outcome, RedeemOutcome::UserMissing));
        let stored = store.find_action_token("redeem-me").await?.context("token")?;
        assert!(!stored.is_executed());

        match store
            .redeem_action_token("redeem-me", now, user.id, &update)
            .await?
        {
            RedeemOutcome::Redeemed(updated) => {
                assert!(updated.is_verified());
                assert_eq!(updated.refresh_token.as_deref(), Some("rt"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let again = store
            .redeem_action_token("redeem-me", now, user.id, &update)
            .await?;
        assert!(matches!(again, RedeemOutcome::AlreadyExecuted));
        Ok(())
    }
}
