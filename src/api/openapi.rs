use super::handlers::{self, auth};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::me::me,
        auth::register,
        auth::login,
        auth::logout,
        auth::refresh,
        auth::verify_email,
        auth::resend_verification,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::me::MeResponse,
        auth::types::RegisterRequest,
        auth::types::LoginRequest,
        auth::types::ResendVerificationRequest,
        auth::types::AccessTokenResponse,
        auth::types::SuccessResponse,
        auth::types::MessageResponse,
        crate::error::FieldError,
    )),
    modifiers(&BearerSecurity),
    tags(
        (name = "auth", description = "Registration, sessions and email verification"),
        (name = "api", description = "Resources behind the access-token gate"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/me",
            "/auth/register",
            "/auth/login",
            "/auth/logout",
            "/auth/refresh",
            "/auth/verify-email/{action_token_id}",
            "/auth/verify-email/resend",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let has_bearer = doc
            .components
            .as_ref()
            .is_some_and(|components| components.security_schemes.contains_key("bearer"));
        assert!(has_bearer);
    }
}
