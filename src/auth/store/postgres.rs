//! Postgres-backed credential store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgArguments, PgPoolOptions, PgRow},
    query::Query,
    Connection, PgPool, Postgres, Row,
};
use std::time::Duration;
use tracing::{info_span, instrument, Instrument, Span};
use uuid::Uuid;

use super::{CreateUserOutcome, CredentialStore, RedeemOutcome};
use crate::auth::model::{Action, ActionToken, NewUser, User, UserUpdate};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, username, email, password_hash, refresh_token, email_verified_at";
const TOKEN_COLUMNS: &str = "id, entity_id, action_name, created_at, expires_at, executed_at";

const CLAIM_TOKEN_SQL: &str =
    "UPDATE action_tokens SET executed_at = $2 WHERE id = $1 AND executed_at IS NULL";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or the schema fails to apply.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        let store = Self::from_pool(pool);
        store.apply_schema().await?;
        Ok(store)
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(query_span("DDL", statement))
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }

    async fn find_user_where(&self, column: &str, value: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .with_context(|| format!("failed to lookup user by {column}"))?;
        row.map(|row| user_from_row(&row)).transpose()
    }
}

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

// email_verified_at only moves from null to a value, never back.
fn update_user_sql() -> String {
    format!(
        "UPDATE users SET \
            refresh_token = CASE WHEN $2 THEN $3 ELSE refresh_token END, \
            email_verified_at = COALESCE(email_verified_at, $4) \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    )
}

fn bind_user_update<'q>(
    query: &'q str,
    id: Uuid,
    update: &UserUpdate,
) -> Query<'q, Postgres, PgArguments> {
    sqlx::query(query)
        .bind(id)
        .bind(update.refresh_token.is_some())
        .bind(update.refresh_token.clone().flatten())
        .bind(update.email_verified_at)
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        refresh_token: row.try_get("refresh_token")?,
        email_verified_at: row.try_get("email_verified_at")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<ActionToken> {
    let action: String = row.try_get("action_name")?;
    Ok(ActionToken {
        id: row.try_get("id")?,
        entity_id: row.try_get("entity_id")?,
        action: action.parse::<Action>()?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        executed_at: row.try_get("executed_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[async_trait]
impl CredentialStore for PgStore {
    #[instrument(skip(self))]
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_user_where("username", username).await
    }

    #[instrument(skip(self))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_user_where("email", email).await
    }

    #[instrument(skip(self))]
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup user by id")?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    #[instrument(skip_all)]
    async fn find_user_by_refresh_token(&self, token: &str) -> Result<Option<User>> {
        self.find_user_where("refresh_token", token).await
    }

    #[instrument(skip_all, fields(username = %user.username))]
    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome> {
        let query = format!(
            "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;

        match row {
            Ok(row) => Ok(CreateUserOutcome::Created(user_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(CreateUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    #[instrument(skip(self, update))]
    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<Option<User>> {
        let query = update_user_sql();
        let row = bind_user_update(&query, id, update)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to update user")?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    #[instrument(skip_all, fields(entity_id = %token.entity_id, action = %token.action))]
    async fn create_action_token(&self, token: &ActionToken) -> Result<()> {
        let query = format!("INSERT INTO action_tokens ({TOKEN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)");
        sqlx::query(&query)
            .bind(&token.id)
            .bind(token.entity_id)
            .bind(token.action.as_str())
            .bind(token.created_at)
            .bind(token.expires_at)
            .bind(token.executed_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .context("failed to insert action token")?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn find_action_token(&self, id: &str) -> Result<Option<ActionToken>> {
        let query = format!("SELECT {TOKEN_COLUMNS} FROM action_tokens WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup action token")?;
        row.map(|row| token_from_row(&row)).transpose()
    }

    #[instrument(skip(self, id))]
    async fn claim_action_token(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(CLAIM_TOKEN_SQL)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", CLAIM_TOKEN_SQL))
            .await
            .context("failed to claim action token")?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, id, update))]
    async fn redeem_action_token(
        &self,
        id: &str,
        at: DateTime<Utc>,
        user_id: Uuid,
        update: &UserUpdate,
    ) -> Result<RedeemOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin redeem transaction")?;

        let claimed = sqlx::query(CLAIM_TOKEN_SQL)
            .bind(id)
            .bind(at)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE", CLAIM_TOKEN_SQL))
            .await
            .context("failed to claim action token")?;
        if claimed.rows_affected() != 1 {
            tx.rollback().await.context("failed to roll back redeem")?;
            return Ok(RedeemOutcome::AlreadyExecuted);
        }

        let query = update_user_sql();
        let row = bind_user_update(&query, user_id, update)
            .fetch_optional(&mut *tx)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to update user")?;
        let Some(row) = row else {
            tx.rollback().await.context("failed to roll back redeem")?;
            return Ok(RedeemOutcome::UserMissing);
        };
        let user = user_from_row(&row)?;

        tx.commit().await.context("failed to commit redeem")?;
        Ok(RedeemOutcome::Redeemed(user))
    }

    #[instrument(skip(self))]
    async fn action_tokens_for(&self, entity_id: Uuid) -> Result<Vec<ActionToken>> {
        let query =
            format!("SELECT {TOKEN_COLUMNS} FROM action_tokens WHERE entity_id = $1 ORDER BY created_at");
        let rows = sqlx::query(&query)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to list action tokens")?;
        rows.iter().map(token_from_row).collect()
    }

    async fn ping(&self) -> Result<()> {
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await?;
            Ok::<(), anyhow::Error>(())
        }
        .instrument(span)
        .await
    }
}
