use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    state::AuthState,
    types::{MessageResponse, RegisterRequest, SuccessResponse},
    validation::validate_register,
};
use crate::error::AuthError;

const MSG_USER_CREATED: &str = "New user created!";

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User created; verification link sent", body = SuccessResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already exists", body = MessageResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Response, AuthError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    validate_register(&request)?;

    let user = auth_state
        .sessions()
        .register(request.username.trim(), &request.email, &request.password)
        .await?;
    debug!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(MSG_USER_CREATED)),
    )
        .into_response())
}
