use crate::api::{self, AuthConfig, AuthState};
use crate::auth::{
    ActionTokenService, Argon2Hasher, CredentialStore, LogNotifier, MemoryStore, PgStore,
    SessionManager, SystemClock, TokenIssuer,
};
use crate::cli::actions::Action;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            tokens,
            action_token_ttl_seconds,
            public_base_url,
            cookie_secure,
        } => {
            let store: Arc<dyn CredentialStore> = match dsn {
                Some(dsn) => Arc::new(
                    PgStore::connect(&dsn)
                        .await
                        .context("Failed to connect to database")?,
                ),
                None => {
                    warn!("No DSN configured, credentials are kept in memory only");
                    Arc::new(MemoryStore::new())
                }
            };

            let auth_config = AuthConfig::new()
                .with_cookie_max_age_seconds(tokens.refresh_ttl_seconds())
                .with_cookie_secure(cookie_secure);

            let action_tokens = ActionTokenService::new(Arc::clone(&store), Arc::new(SystemClock))
                .with_ttl_seconds(action_token_ttl_seconds);

            let sessions = SessionManager::new(
                store,
                Arc::new(Argon2Hasher::new()),
                TokenIssuer::new(tokens),
                action_tokens,
                Arc::new(LogNotifier),
                public_base_url,
            );

            info!(port, "starting server");

            api::new(port, Arc::new(AuthState::new(sessions, auth_config))).await?;
        }
    }

    Ok(())
}
