use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::auth::AuthState;
use crate::{auth::Principal, error::AuthError};

const MSG_USER_NOT_FOUND: &str = "User not found!";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Caller resolved from the access token", body = MeResponse),
        (status = 401, description = "Missing bearer token"),
        (status = 403, description = "Invalid or expired access token"),
        (status = 404, description = "Account no longer exists")
    ),
    security(("bearer" = [])),
    tag = "api"
)]
pub async fn me(
    principal: Principal,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<MeResponse>, AuthError> {
    let user = auth_state
        .sessions()
        .store()
        .find_user_by_id(principal.user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound(MSG_USER_NOT_FOUND.to_string()))?;

    Ok(Json(MeResponse {
        user_id: user.id.to_string(),
        email_verified: user.is_verified(),
        username: user.username,
        email: user.email,
    }))
}
