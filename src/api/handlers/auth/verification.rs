//! Email verification link redemption and resend.

use anyhow::Context;
use axum::{
    extract::{Extension, Path},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    session::refresh_cookie,
    state::AuthState,
    types::{AccessTokenResponse, MessageResponse, ResendVerificationRequest, SuccessResponse},
    validation::validate_resend,
};
use crate::error::AuthError;

const MSG_VERIFICATION_SENT: &str = "New verification mail sent!";

#[utoipa::path(
    get,
    path = "/auth/verify-email/{action_token_id}",
    params(
        ("action_token_id" = String, Path, description = "Action token id from the verification link")
    ),
    responses(
        (status = 200, description = "Email verified and session opened", body = AccessTokenResponse),
        (status = 403, description = "Link invalid, used or expired, or email already verified", body = MessageResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn verify_email(
    Path(action_token_id): Path<String>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let session = auth_state.sessions().verify_email(&action_token_id).await?;
    debug!(user_id = %session.user_id, "email verified");

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        refresh_cookie(auth_state.config(), &session.refresh_token)
            .context("Failed to build refresh cookie")?,
    );

    Ok((
        StatusCode::OK,
        headers,
        Json(AccessTokenResponse {
            access_token: session.access_token,
        }),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/auth/verify-email/resend",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "A fresh verification link was sent", body = SuccessResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "No account for that email", body = MessageResponse),
        (status = 403, description = "Email already verified", body = MessageResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn resend_verification(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendVerificationRequest>>,
) -> Result<Response, AuthError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    validate_resend(&request)?;

    let token = auth_state
        .sessions()
        .resend_verification(&request.email)
        .await?;
    debug!(expires_at = %token.expires_at, "verification link re-sent");

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(MSG_VERIFICATION_SENT)),
    )
        .into_response())
}
