//! End-to-end tests for the Shonifity storefront API.
//!
//! Every test drives the real router with `tower::ServiceExt::oneshot` over
//! in-memory stores and the mock payment provider; no database or network is
//! needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shonifity-integration-tests
//! ```
//!
//! Signed-in users are simulated the way the auth service does it: a session
//! record holding the user is written to the session store and its cookie is
//! sent with the request.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_sessions::cookie::time::{Duration, OffsetDateTime};
use tower_sessions::session::{Id, Record};
use tower_sessions::{MemoryStore, SessionStore};

use shonifity_core::{Product, UserId, UserRole};
use shonifity_storefront::config::{
    ChatbotSettings, CheckoutConfig, LogFormat, StorefrontConfig, StripeConfig,
};
use shonifity_storefront::db::{InMemoryStore, NewProduct, ProductStore};
use shonifity_storefront::middleware::{SESSION_COOKIE_NAME, session_layer};
use shonifity_storefront::models::session::keys;
use shonifity_storefront::payments::MockPaymentProvider;
use shonifity_storefront::services::ChatbotConfig;
use shonifity_storefront::state::{AppState, Backends};

/// SPA origin used by the test configuration.
pub const CLIENT_URL: &str = "http://localhost:3000";

/// A fully wired application over in-memory backends.
pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub payments: Arc<MockPaymentProvider>,
    sessions: MemoryStore,
    router: Router,
}

/// Status and decoded body of one response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// JSON body, or `Value::String` for non-JSON bodies.
    pub body: Value,
}

/// Configuration with defaults and a throwaway Stripe key.
#[must_use]
pub fn test_config(checkout: CheckoutConfig) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        client_url: CLIENT_URL.to_string(),
        log_format: LogFormat::Pretty,
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_unused"),
            api_base: "http://127.0.0.1:9".to_string(),
        },
        checkout,
        chatbot: ChatbotSettings::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_traces_sample_rate: 0.0,
    }
}

impl TestContext {
    /// Application with the default checkout policy.
    pub fn new() -> Self {
        Self::with_checkout(CheckoutConfig::default())
    }

    /// Application with a custom checkout policy.
    pub fn with_checkout(checkout: CheckoutConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let payments = Arc::new(MockPaymentProvider::new());
        let sessions = MemoryStore::default();

        let state = AppState::new(
            test_config(checkout),
            Backends::in_memory(store.clone(), payments.clone()),
            ChatbotConfig::default(),
        )
        .unwrap();
        let router = shonifity_storefront::app(state, session_layer(sessions.clone(), false));

        Self {
            store,
            payments,
            sessions,
            router,
        }
    }

    /// Register a user and return a session cookie for them.
    pub async fn sign_up(&self, name: &str, role: UserRole) -> (UserId, String) {
        let email = format!("{}@example.com", name.to_lowercase());
        let id = self.store.add_user(name, &email, role).await;
        let cookie = self.sign_in(id, role).await;
        (id, cookie)
    }

    /// Write a session for `user` and return the `Cookie` header value.
    pub async fn sign_in(&self, user: UserId, role: UserRole) -> String {
        let mut record = Record {
            id: Id::default(),
            data: HashMap::from([(
                keys::CURRENT_USER.to_string(),
                json!({ "id": user, "role": role }),
            )]),
            expiry_date: OffsetDateTime::now_utc() + Duration::days(1),
        };
        self.sessions.create(&mut record).await.unwrap();
        format!("{SESSION_COOKIE_NAME}={}", record.id)
    }

    /// Add a product to the catalog.
    pub async fn add_product(
        &self,
        name: &str,
        price: Decimal,
        category: &str,
        featured: bool,
    ) -> Product {
        self.store
            .upsert(NewProduct {
                name: name.to_string(),
                description: format!("{name} description"),
                price,
                category: category.to_string(),
                image: format!("https://cdn.example.com/{}.jpg", name.to_lowercase()),
                is_featured: featured,
            })
            .await
            .unwrap()
    }

    /// Send a request; `body` is sent as JSON when present.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            // Keys the chatbot rate limiter
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, cookie, None).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, cookie, Some(body)).await
    }
}

/// Read a money field, serialised as a decimal string.
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
