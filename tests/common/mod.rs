#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use servicehub_api::config::AppConfig;
use servicehub_api::database::{MemoryStore, Store};
use servicehub_api::mail::{MailError, MailMessage, Mailer};
use servicehub_api::models::{Category, Identity, Profile};
use servicehub_api::{app, AppState};

pub const SECRET: &str = "integration-test-secret-integration-test";

/// Keeps every message so tests can read the login codes
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    /// While set, every send is rejected the way a mail API outage would be
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent_to(&self, email: &str) -> usize {
        self.sent.lock().unwrap().iter().filter(|m| m.to == email).count()
    }

    /// Most recent code mailed to `email`
    pub fn last_code(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let message = sent.iter().rev().find(|m| m.to == email)?;
        let (_, rest) = message.body.split_once("code is ")?;
        Some(rest.chars().take(6).collect())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Rejected(503));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of the `token` cookie set by this response, if any
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("token="))
            .map(|v| v.to_string())
    }

    pub fn token(&self) -> Option<String> {
        let cookie = self.session_cookie()?;
        let value = cookie.trim_start_matches("token=").split(';').next()?.to_string();
        Some(value).filter(|v| !v.is_empty())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.url = "memory://".to_string();
    config.security.session_secret = SECRET.to_string();
    config.security.otp_resend_seconds = 0;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());

        let state = AppState::new(config, store.clone(), mailer.clone()).expect("test state");
        Self {
            router: app(state),
            store,
            mailer,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("token={}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response was not JSON")?
        };

        Ok(TestResponse { status, headers, body })
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post(&self, path: &str, body: Value, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::POST, path, Some(body), token).await
    }

    pub async fn put(&self, path: &str, body: Value, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::PUT, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::DELETE, path, None, token).await
    }

    /// Request a code on `prefix` (e.g. `/api/user`) and trade it for a session token
    pub async fn login(&self, prefix: &str, email: &str) -> Result<String> {
        let login_path = if prefix == "/api/admin" { "signin" } else { "login" };
        let res = self
            .post(&format!("{}/{}", prefix, login_path), serde_json::json!({ "email": email }), None)
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "login failed: {} {}", res.status, res.body);

        self.verify(prefix, email).await
    }

    /// Verify the most recently mailed code
    pub async fn verify(&self, prefix: &str, email: &str) -> Result<String> {
        let code = self.mailer.last_code(email).context("no code was mailed")?;
        let res = self
            .post(&format!("{}/verify", prefix), serde_json::json!({ "email": email, "otp": code }), None)
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "verify failed: {} {}", res.status, res.body);
        res.token().context("verify did not set a session cookie")
    }

    pub async fn seed(&self, email: &str, name: &str, profile: Profile) -> Result<Identity> {
        let mut identity = Identity::new(email, name, "9876543210", profile, Utc::now());
        identity.is_verified = true;
        Ok(self.store.create_identity(identity).await?)
    }

    pub async fn seed_category(&self, name: &str, min_price: i64, max_price: i64) -> Result<Category> {
        let category = Category::new(name, "", min_price, max_price, Utc::now());
        Ok(self.store.create_category(category).await?)
    }

    /// Seeded user plus a live session
    pub async fn user_session(&self, email: &str) -> Result<(Identity, String)> {
        let user = self.seed(email, "Test User", Profile::User { address: None }).await?;
        let token = self.login("/api/user", email).await?;
        Ok((user, token))
    }

    pub async fn employee_session(&self, email: &str, category: &Category) -> Result<(Identity, String)> {
        let employee = self
            .seed(
                email,
                "Test Employee",
                Profile::Employee { category_id: Some(category.id), recruited_by: None, bank: None },
            )
            .await?;
        let token = self.login("/api/employee", email).await?;
        Ok((employee, token))
    }

    pub async fn admin_session(&self, email: &str) -> Result<(Identity, String)> {
        let admin = self.seed(email, "Test Admin", Profile::Admin { superadmin: true }).await?;
        let token = self.login("/api/admin", email).await?;
        Ok((admin, token))
    }
}
