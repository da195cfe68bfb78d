//! Exercises `PgStore` against a live Postgres.
//!
//! Set `LINKGATE_TEST_DSN` to run; the tests are skipped otherwise.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use linkgate::auth::{
    model::{Action, ActionToken, NewUser, UserUpdate},
    store::{CreateUserOutcome, RedeemOutcome},
    CredentialStore, PgStore,
};
use uuid::Uuid;

async fn store() -> Result<Option<PgStore>> {
    let Ok(dsn) = std::env::var("LINKGATE_TEST_DSN") else {
        eprintln!("Skipping Postgres test: LINKGATE_TEST_DSN not set");
        return Ok(None);
    };
    Ok(Some(PgStore::connect(&dsn).await?))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

async fn create_user(store: &PgStore) -> Result<linkgate::auth::User> {
    let username = unique("user");
    let outcome = store
        .create_user(NewUser {
            email: format!("{username}@example.com"),
            username,
            password_hash: "hash".to_string(),
        })
        .await?;
    match outcome {
        CreateUserOutcome::Created(user) => Ok(user),
        CreateUserOutcome::Conflict => anyhow::bail!("unexpected conflict"),
    }
}

#[tokio::test]
async fn users_round_trip_and_conflict() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    store.ping().await?;

    let user = create_user(&store).await?;
    let by_email = store
        .find_user_by_email(&user.email)
        .await?
        .context("by email")?;
    assert_eq!(by_email.id, user.id);

    let duplicate = store
        .create_user(NewUser {
            username: user.username.clone(),
            email: unique("other"),
            password_hash: "hash".to_string(),
        })
        .await?;
    assert!(matches!(duplicate, CreateUserOutcome::Conflict));
    Ok(())
}

#[tokio::test]
async fn refresh_token_set_and_clear() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let user = create_user(&store).await?;
    let token = unique("refresh");

    store
        .update_user(user.id, &UserUpdate::set_refresh_token(token.clone()))
        .await?;
    let found = store
        .find_user_by_refresh_token(&token)
        .await?
        .context("by refresh token")?;
    assert_eq!(found.id, user.id);

    store
        .update_user(user.id, &UserUpdate::clear_refresh_token())
        .await?;
    assert!(store.find_user_by_refresh_token(&token).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn verified_timestamp_is_monotonic() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let user = create_user(&store).await?;
    let first = Utc::now();

    store
        .update_user(user.id, &UserUpdate::default().with_email_verified_at(first))
        .await?;
    let updated = store
        .update_user(
            user.id,
            &UserUpdate::default().with_email_verified_at(first + Duration::hours(1)),
        )
        .await?
        .context("user")?;

    let stored = updated.email_verified_at.context("verified")?;
    assert!((stored - first).num_milliseconds().abs() < 1);
    Ok(())
}

#[tokio::test]
async fn action_token_claim_is_single_use() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let user = create_user(&store).await?;
    let now = Utc::now();
    let token = ActionToken {
        id: unique("action"),
        entity_id: user.id,
        action: Action::VerifyEmail,
        created_at: now,
        expires_at: now + Duration::minutes(15),
        executed_at: None,
    };
    store.create_action_token(&token).await?;

    assert!(store.claim_action_token(&token.id, now).await?);
    assert!(!store.claim_action_token(&token.id, now).await?);

    let tokens = store.action_tokens_for(user.id).await?;
    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].is_executed());
    Ok(())
}

#[tokio::test]
async fn redeem_rolls_back_when_user_is_missing() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };
    let user = create_user(&store).await?;
    let now = Utc::now();
    let token = ActionToken {
        id: unique("redeem"),
        entity_id: user.id,
        action: Action::VerifyEmail,
        created_at: now,
        expires_at: now + Duration::minutes(15),
        executed_at: None,
    };
    store.create_action_token(&token).await?;
    let update = UserUpdate::set_refresh_token(unique("refresh")).with_email_verified_at(now);

    let outcome = store
        .redeem_action_token(&token.id, now, Uuid::new_v4(), &update)
        .await?;
    assert!(matches!(outcome, RedeemOutcome::UserMissing));
    let stored = store
        .find_action_token(&token.id)
        .await?
        .context("token")?;
    assert!(!stored.is_executed());

    let outcome = store
        .redeem_action_token(&token.id, now, user.id, &update)
        .await?;
    let updated = match outcome {
        RedeemOutcome::Redeemed(updated) => updated,
        other => anyhow::bail!("expected a redeemed token, got {other:?}"),
    };
    assert!(updated.email_verified_at.is_some());
    assert_eq!(updated.refresh_token, update.refresh_token.clone().flatten());

    let again = store
        .redeem_action_token(&token.id, now, user.id, &update)
        .await?;
    assert!(matches!(again, RedeemOutcome::AlreadyExecuted));
    Ok(())
}
