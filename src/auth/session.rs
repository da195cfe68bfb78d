//! Session manager: registration, login, logout, refresh and email verification.
//!
//! Flow Overview: `register` creates an unverified user and mails a
//! single-use link; following the link (`verify_email`) marks the email as
//! verified and logs the user in. `login` only succeeds for verified users.
//! The stored refresh token is the single active session for a user; a new
//! login overwrites it and `logout` clears it.

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::action_token::ActionTokenService;
use super::model::{Action, ActionToken, NewUser, User, UserUpdate};
use super::notifier::{build_verify_url, Notifier, VerificationMessage};
use super::password::PasswordHasher;
use super::store::{CreateUserOutcome, CredentialStore, RedeemOutcome};
use super::token::{TokenIssuer, TokenKind};
use crate::error::AuthError;

pub const MSG_USERNAME_EXISTS: &str = "Username already exists!";
pub const MSG_EMAIL_EXISTS: &str = "Email already exists!";
pub const MSG_ACCOUNT_EXISTS: &str = "Username or email already exists!";
pub const MSG_WRONG_CREDENTIALS: &str = "Wrong credentials!";
pub const MSG_EMAIL_NOT_VERIFIED: &str = "Email not verified!";
pub const MSG_UNAUTHORIZED: &str = "Unauthorized!";
pub const MSG_FORBIDDEN: &str = "Forbidden!";
pub const MSG_LINK_INVALID: &str =
    "Can't verify your email, the link is invalid. Resend the verification email!";
pub const MSG_LINK_USED: &str =
    "Can't verify your email, the link has already been used. Resend the verification email!";
pub const MSG_LINK_EXPIRED: &str =
    "Can't verify your email, the link has expired. Resend the verification email!";
pub const MSG_ALREADY_VERIFIED: &str = "Email is already verified!";
pub const MSG_WRONG_EMAIL: &str = "Wrong email!";

const DUMMY_PASSWORD: &str = "linkgate-dummy-password";

/// Freshly minted token pair. The refresh token only ever leaves the server
/// inside the HTTP-only cookie.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: TokenIssuer,
    action_tokens: ActionTokenService,
    notifier: Arc<dyn Notifier>,
    public_base_url: String,
    // Digest checked for unknown emails so login costs the same either way.
    dummy_digest: OnceCell<String>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: TokenIssuer,
        action_tokens: ActionTokenService,
        notifier: Arc<dyn Notifier>,
        public_base_url: String,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            action_tokens,
            notifier,
            public_base_url,
            dummy_digest: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Create an unverified user and send the first verification link.
    ///
    /// # Errors
    ///
    /// `Conflict` when the username or email is taken; `Internal` on store,
    /// hashing or delivery failures.
    #[instrument(skip(self, email, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        let email = normalize_email(email);

        if self.store.find_user_by_username(username).await?.is_some() {
            return Err(AuthError::Conflict(MSG_USERNAME_EXISTS.to_string()));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict(MSG_EMAIL_EXISTS.to_string()));
        }

        let password_hash = self.hash_password(password).await?;
        let new_user = NewUser {
            username: username.to_string(),
            email,
            password_hash,
        };

        // A concurrent signup can still win between the checks and the insert.
        let user = match self.store.create_user(new_user).await? {
            CreateUserOutcome::Created(user) => user,
            CreateUserOutcome::Conflict => {
                return Err(AuthError::Conflict(MSG_ACCOUNT_EXISTS.to_string()))
            }
        };

        self.send_verification(&user).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Exchange verified credentials for a new session.
    ///
    /// # Errors
    ///
    /// `Authentication` for unknown email, wrong password (same message for
    /// both) or an unverified email.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            let digest = self
                .dummy_digest
                .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD))
                .await?;
            self.verify_password(password, digest).await?;
            return Err(AuthError::Authentication(MSG_WRONG_CREDENTIALS.to_string()));
        };

        if !self.verify_password(password, &user.password_hash).await? {
            return Err(AuthError::Authentication(MSG_WRONG_CREDENTIALS.to_string()));
        }

        if !user.is_verified() {
            return Err(AuthError::Authentication(
                MSG_EMAIL_NOT_VERIFIED.to_string(),
            ));
        }

        let session = self.mint_session(user.id)?;
        self.store
            .update_user(
                user.id,
                &UserUpdate::set_refresh_token(session.refresh_token.clone()),
            )
            .await?
            .ok_or_else(|| AuthError::internal("user disappeared during login"))?;

        info!(user_id = %user.id, "user logged in");
        Ok(session)
    }

    /// End the session identified by the presented refresh token.
    ///
    /// # Errors
    ///
    /// `Authentication` without a cookie; `Internal` when no user holds the
    /// presented token.
    #[instrument(skip_all)]
    pub async fn logout(&self, presented_refresh_token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = presented_refresh_token.filter(|token| !token.is_empty()) else {
            return Err(AuthError::Authentication(MSG_UNAUTHORIZED.to_string()));
        };

        let Some(user) = self.store.find_user_by_refresh_token(token).await? else {
            return Err(AuthError::internal(
                "logout with a refresh token no user holds",
            ));
        };

        self.store
            .update_user(user.id, &UserUpdate::clear_refresh_token())
            .await?;

        info!(user_id = %user.id, "user logged out");
        Ok(())
    }

    /// Mint a new access token for the holder of a valid refresh token.
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    ///
    /// `Authentication` without a cookie; `Forbidden` when no user holds the
    /// token, the token fails verification, or its subject is another user.
    #[instrument(skip_all)]
    pub async fn refresh(&self, presented_refresh_token: Option<&str>) -> Result<String, AuthError> {
        let Some(token) = presented_refresh_token.filter(|token| !token.is_empty()) else {
            return Err(AuthError::Authentication(MSG_UNAUTHORIZED.to_string()));
        };

        let Some(user) = self.store.find_user_by_refresh_token(token).await? else {
            return Err(AuthError::Forbidden(MSG_FORBIDDEN.to_string()));
        };

        match self.tokens.verify(token, TokenKind::Refresh) {
            Ok(subject) if subject == user.id => {}
            Ok(subject) => {
                warn!(user_id = %user.id, %subject, "refresh token subject mismatch");
                return Err(AuthError::Forbidden(MSG_FORBIDDEN.to_string()));
            }
            Err(err) => {
                warn!(user_id = %user.id, "refresh token rejected: {err}");
                return Err(AuthError::Forbidden(MSG_FORBIDDEN.to_string()));
            }
        }

        self.tokens
            .issue_access(user.id)
            .map_err(|err| AuthError::Internal(err.into()))
    }

    /// Consume a verification link: verify the email and log the user in.
    ///
    /// The token claim and the user update are a single store operation, so
    /// concurrent clicks on one link produce one success and a failed update
    /// leaves the link redeemable.
    ///
    /// # Errors
    ///
    /// `Forbidden` for unknown, used, expired or foreign-action tokens and for
    /// users that are already verified; `Internal` when the bound user is gone.
    #[instrument(skip_all)]
    pub async fn verify_email(&self, action_token_id: &str) -> Result<IssuedSession, AuthError> {
        let now = self.action_tokens.now();

        let Some(token) = self.action_tokens.validate(action_token_id).await? else {
            return Err(AuthError::Forbidden(MSG_LINK_INVALID.to_string()));
        };
        if token.action != Action::VerifyEmail {
            return Err(AuthError::Forbidden(MSG_LINK_INVALID.to_string()));
        }
        if token.is_executed() {
            return Err(AuthError::Forbidden(MSG_LINK_USED.to_string()));
        }
        if token.is_expired(now) {
            return Err(AuthError::Forbidden(MSG_LINK_EXPIRED.to_string()));
        }

        let Some(user) = self.store.find_user_by_id(token.entity_id).await? else {
            return Err(AuthError::internal(
                "action token bound to a missing user",
            ));
        };
        if user.is_verified() {
            return Err(AuthError::Forbidden(MSG_ALREADY_VERIFIED.to_string()));
        }

        let session = self.mint_session(user.id)?;
        let update = UserUpdate::set_refresh_token(session.refresh_token.clone())
            .with_email_verified_at(now);
        match self.action_tokens.redeem(&token, now, &update).await? {
            RedeemOutcome::Redeemed(_) => {}
            RedeemOutcome::AlreadyExecuted => {
                warn!(user_id = %user.id, "verification link claimed concurrently");
                return Err(AuthError::Forbidden(MSG_LINK_USED.to_string()));
            }
            RedeemOutcome::UserMissing => {
                return Err(AuthError::internal("user disappeared during verification"));
            }
        }

        info!(user_id = %user.id, "email verified");
        Ok(session)
    }

    /// Issue and send a new verification link. Earlier links stay valid
    /// until they expire.
    ///
    /// # Errors
    ///
    /// `Authentication` for unknown emails; `Forbidden` when already verified.
    #[instrument(skip_all)]
    pub async fn resend_verification(&self, email: &str) -> Result<ActionToken, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            return Err(AuthError::Authentication(MSG_WRONG_EMAIL.to_string()));
        };
        if user.is_verified() {
            return Err(AuthError::Forbidden(MSG_ALREADY_VERIFIED.to_string()));
        }

        let token = self.send_verification(&user).await?;
        info!(user_id = %user.id, "verification email resent");
        Ok(token)
    }

    async fn send_verification(&self, user: &User) -> Result<ActionToken, AuthError> {
        let token = self
            .action_tokens
            .issue(user.id, Action::VerifyEmail)
            .await?;
        let message = VerificationMessage {
            to_email: user.email.clone(),
            verify_url: build_verify_url(&self.public_base_url, &token.id),
        };
        self.notifier
            .send(&message)
            .await
            .context("failed to send verification email")?;
        Ok(token)
    }

    fn mint_session(&self, user_id: Uuid) -> Result<IssuedSession, AuthError> {
        let access_token = self
            .tokens
            .issue_access(user_id)
            .map_err(|err| AuthError::Internal(err.into()))?;
        let refresh_token = self
            .tokens
            .issue_refresh(user_id)
            .map_err(|err| AuthError::Internal(err.into()))?;
        Ok(IssuedSession {
            user_id,
            access_token,
            refresh_token,
        })
    }

    // Hashing is CPU-bound; keep it off the async workers.
    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("password hashing task failed")??;
        Ok(digest)
    }

    async fn verify_password(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        let digest = digest.to_string();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .context("password verification task failed")?;
        Ok(matches)
    }
}
