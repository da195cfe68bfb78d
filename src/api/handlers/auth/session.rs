//! Login, logout and access-token refresh.
//!
//! The refresh token only ever travels in the `jwt` cookie; the access token
//! only ever travels in the response body.

use anyhow::Context;
use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    state::{AuthConfig, AuthState},
    types::{AccessTokenResponse, LoginRequest, MessageResponse, SuccessResponse},
    validation::validate_login,
};
use crate::error::AuthError;

const REFRESH_COOKIE_NAME: &str = "jwt";

const MSG_LOGGED_OUT: &str = "User logged out!";

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened; refresh token set in the `jwt` cookie", body = AccessTokenResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Wrong credentials or email not verified", body = MessageResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, AuthError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    validate_login(&request)?;

    let session = auth_state
        .sessions()
        .login(&request.email, &request.password)
        .await?;

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
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session closed; cookie cleared", body = SuccessResponse),
        (status = 401, description = "No refresh cookie presented", body = MessageResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let token = extract_refresh_cookie(&headers);
    auth_state.sessions().logout(token.as_deref()).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        SET_COOKIE,
        clear_refresh_cookie(auth_state.config()).context("Failed to build refresh cookie")?,
    );

    Ok((
        StatusCode::OK,
        response_headers,
        Json(SuccessResponse::new(MSG_LOGGED_OUT)),
    )
        .into_response())
}

#[utoipa::path(
    get,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "No refresh cookie presented", body = MessageResponse),
        (status = 403, description = "Refresh token rejected", body = MessageResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let token = extract_refresh_cookie(&headers);
    let access_token = auth_state.sessions().refresh(token.as_deref()).await?;

    Ok((StatusCode::OK, Json(AccessTokenResponse { access_token })).into_response())
}

/// Build the `HttpOnly` cookie carrying the refresh token.
pub(super) fn refresh_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = config.cookie_max_age_seconds();
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=None; Max-Age={max_age}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_refresh_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{REFRESH_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=None; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pull the refresh token out of the `Cookie` header, if any.
fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == REFRESH_COOKIE_NAME {
                let val = val.trim();
                return if val.is_empty() {
                    None
                } else {
                    Some(val.to_string())
                };
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn cookie_headers(value: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value)?);
        Ok(headers)
    }

    #[test]
    fn refresh_cookie_attributes() -> Result<()> {
        let cookie = refresh_cookie(&AuthConfig::new(), "abc")?;
        assert_eq!(
            cookie.to_str()?,
            "jwt=abc; Path=/; HttpOnly; SameSite=None; Max-Age=86400"
        );

        let secure = AuthConfig::new()
            .with_cookie_secure(true)
            .with_cookie_max_age_seconds(60);
        let cookie = refresh_cookie(&secure, "abc")?;
        assert_eq!(
            cookie.to_str()?,
            "jwt=abc; Path=/; HttpOnly; SameSite=None; Max-Age=60; Secure"
        );
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_immediately() -> Result<()> {
        let cookie = clear_refresh_cookie(&AuthConfig::new())?;
        assert!(cookie.to_str()?.starts_with("jwt=;"));
        assert!(cookie.to_str()?.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn extracts_jwt_cookie_among_others() -> Result<()> {
        let headers = cookie_headers("theme=dark; jwt=a.b.c; lang=en")?;
        assert_eq!(extract_refresh_cookie(&headers), Some("a.b.c".to_string()));

        assert_eq!(extract_refresh_cookie(&cookie_headers("theme=dark")?), None);
        assert_eq!(extract_refresh_cookie(&cookie_headers("jwt=")?), None);
        assert_eq!(extract_refresh_cookie(&HeaderMap::new()), None);
        Ok(())
    }
}
