//! Request-boundary access-token check.
//!
//! Flow Overview: read `Authorization: Bearer <token>`, verify it against the
//! access-signing secret, and attach the embedded user id to the request as a
//! [`Principal`]. No store lookup happens here: the claim is trusted for the
//! lifetime of the access token.
//!
//! A missing or malformed header is `401`; a token that is present but
//! invalid or expired is `403`.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;
use uuid::Uuid;

use super::session::{MSG_FORBIDDEN, MSG_UNAUTHORIZED};
use super::token::{TokenIssuer, TokenKind};
use crate::error::AuthError;

/// Authenticated caller resolved from the access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
}

/// Extract the bearer token from the `Authorization` header.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Resolve the caller from request headers.
///
/// # Errors
///
/// `Unauthorized` when no bearer token is presented, `Forbidden` when it does
/// not verify.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenIssuer) -> Result<Principal, AuthError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(AuthError::Unauthorized(MSG_UNAUTHORIZED.to_string()));
    };
    match tokens.verify(token, TokenKind::Access) {
        Ok(user_id) => Ok(Principal { user_id }),
        Err(err) => {
            debug!("access token rejected: {err}");
            Err(AuthError::Forbidden(MSG_FORBIDDEN.to_string()))
        }
    }
}

/// axum middleware guarding every protected route.
pub async fn require_access_token(
    State(tokens): State<TokenIssuer>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &tokens) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or_else(|| AuthError::Unauthorized(MSG_UNAUTHORIZED.to_string()))
    }
}
