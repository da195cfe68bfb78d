//! Out-of-band delivery of verification links.
//!
//! Delivery transport is pluggable: anything implementing [`Notifier`] can
//! carry the message (SMTP relay, HTTP mail API, queue). The default
//! [`LogNotifier`] writes the link to the log for local development.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Message handed to a notifier for one verification request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationMessage {
    pub to_email: String,
    pub verify_url: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the message or return an error.
    async fn send(&self, message: &VerificationMessage) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &VerificationMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            verify_url = %message.verify_url,
            "verification email send stub"
        );
        Ok(())
    }
}

/// Link carrying the action token id as its last path segment.
#[must_use]
pub fn build_verify_url(public_base_url: &str, action_token_id: &str) -> String {
    let base = public_base_url.trim_end_matches('/');
    format!("{base}/auth/verify-email/{action_token_id}")
}
