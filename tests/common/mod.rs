//! Shared fixtures for the HTTP integration tests.

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::Utc;
use linkgate::{
    api::{self, AuthConfig, AuthState},
    auth::{
        ActionTokenService, Argon2Hasher, ManualClock, MemoryStore, Notifier, SessionManager,
        TokenConfig, TokenIssuer, VerificationMessage,
    },
};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<VerificationMessage>>,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<VerificationMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &VerificationMessage) -> Result<()> {
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.body.get("accessToken").and_then(Value::as_str)
    }

    /// `jwt=<value>` pair from `Set-Cookie`, ready to send back.
    pub fn refresh_cookie(&self) -> Option<String> {
        let cookie = self.headers.get(header::SET_COOKIE)?.to_str().ok()?;
        cookie.split(';').next().map(str::to_string)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let tokens = TokenIssuer::new(TokenConfig::new(
            SecretString::from("integration-access-secret"),
            SecretString::from("integration-refresh-secret"),
        ));
        let action_tokens = ActionTokenService::new(store.clone(), clock.clone());
        let sessions = SessionManager::new(
            store.clone(),
            Arc::new(Argon2Hasher::with_cost(64, 1, 1)?),
            tokens,
            action_tokens,
            notifier.clone(),
            "http://localhost:8080".to_string(),
        );
        let router = api::router(Arc::new(AuthState::new(sessions, AuthConfig::new())));

        Ok(Self {
            router,
            store,
            notifier,
            clock,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Result<TestResponse> {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> Result<TestResponse> {
        self.send(Request::get(uri).body(Body::empty())?).await
    }

    pub async fn with_cookie(&self, method: &str, uri: &str, cookie: &str) -> Result<TestResponse> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())?;
        self.send(request).await
    }

    pub async fn with_bearer(&self, uri: &str, token: &str) -> Result<TestResponse> {
        let request = Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())?;
        self.send(request).await
    }

    /// Action token id from the most recent verification link.
    pub async fn last_link_id(&self) -> Result<String> {
        let sent = self.notifier.sent().await;
        let url = &sent.last().context("no verification link sent")?.verify_url;
        let id = url.rsplit('/').next().context("verification link has no id")?;
        Ok(id.to_string())
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<TestResponse> {
        self.post_json(
            "/auth/register",
            serde_json::json!({ "username": username, "email": email, "password": password }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TestResponse> {
        self.post_json(
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Register and follow the verification link; returns the verify response.
    pub async fn register_verified(&self, username: &str, email: &str) -> Result<TestResponse> {
        let registered = self.register(username, email, "password").await?;
        anyhow::ensure!(registered.status == StatusCode::OK, "register failed");
        let id = self.last_link_id().await?;
        self.get(&format!("/auth/verify-email/{id}")).await
    }
}
