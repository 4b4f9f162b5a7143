//! Integration tests for the Forkful cart API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p forkful-integration-tests
//! ```
//!
//! No database or cart API is needed: sessions use
//! `tower_sessions::MemoryStore`, the pool connects lazily and is never
//! touched by cart routes, and the remote cart API points at a closed port.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use forkful_storefront::cart::CartLimits;
use forkful_storefront::config::{CartApiConfig, StorefrontConfig};
use forkful_storefront::middleware::create_session_layer;
use forkful_storefront::state::AppState;
use reqwest::{Client, Response};
use secrecy::SecretString;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower_sessions::MemoryStore;
use url::Url;

/// Cart API address nothing listens on.
pub const UNREACHABLE_CART_API: &str = "http://127.0.0.1:9";

/// Configuration for a storefront under test.
///
/// # Panics
///
/// Panics if the fixed test URLs fail to parse.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/forkful_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        cart_api: CartApiConfig {
            base_url: Url::parse(UNREACHABLE_CART_API).unwrap(),
            token: SecretString::from("kT9#vQ2!pL7@xM4$"),
            timeout: Duration::from_secs(2),
        },
        cart_limits: CartLimits::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Build application state and router for tests.
///
/// # Panics
///
/// Panics if the lazy pool or the remote client cannot be created.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_app() -> (AppState, Router) {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/forkful_test")
        .unwrap();
    let state = AppState::new(config, pool).unwrap();
    let router = forkful_storefront::app(
        state.clone(),
        create_session_layer(MemoryStore::default(), false),
        None,
    );
    (state, router)
}

/// A storefront served on an ephemeral port plus a cookie-keeping client.
pub struct TestContext {
    pub state: AppState,
    pub base_url: String,
    pub client: Client,
}

impl TestContext {
    /// Serve a fresh storefront.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind or the client cannot be built.
    #[allow(clippy::unwrap_used)]
    pub async fn spawn() -> Self {
        let (state, router) = test_app();
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            state,
            base_url: format!("http://{addr}"),
            client: new_client(),
        }
    }

    /// A second visitor on the same server, with its own cookies.
    #[must_use]
    pub fn other_visitor(&self) -> Client {
        new_client()
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` as the default visitor.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::unwrap_used)]
    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    /// POST a JSON body to `path` as the default visitor.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::unwrap_used)]
    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }
}

#[allow(clippy::unwrap_used)]
fn new_client() -> Client {
    Client::builder().cookie_store(true).build().unwrap()
}

/// Decode a response body as JSON.
///
/// # Panics
///
/// Panics if the body is not JSON.
#[allow(clippy::unwrap_used)]
pub async fn json_body(response: Response) -> Value {
    response.json().await.unwrap()
}
