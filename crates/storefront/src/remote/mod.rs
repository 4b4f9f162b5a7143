//! Remote cart API client and reconciliation.
//!
//! # Architecture
//!
//! - The remote API keeps an eventually-consistent mirror of each cart and
//!   prices it; the local [`CartStore`](crate::cart::CartStore) stays
//!   authoritative for the UI
//! - Local mutations never wait on this client
//! - [`Reconciler`] pushes the local cart and writes the server-confirmed
//!   state back through [`CartService::replace`](crate::cart::CartService::replace)
//! - Price quotes are cached via `moka` (30 second TTL) keyed by cart contents
//!
//! # Endpoints
//!
//! ```text
//! POST /carts         - create a mirror from a cart
//! GET  /carts/{id}    - fetch a mirror
//! PUT  /carts/{id}    - overwrite a mirror
//! POST /carts/quote   - price a cart
//! ```

mod reconcile;
pub mod types;

pub use reconcile::{ReconcileError, Reconciler};
pub use types::{CartTotals, RemoteCart};

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use forkful_core::{Cart, RemoteCartId};
use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::CartApiConfig;
use types::ApiErrorBody;

/// Time-to-live of cached price quotes.
const QUOTE_TTL: Duration = Duration::from_secs(30);

/// Maximum number of cached price quotes.
const QUOTE_CACHE_CAPACITY: u64 = 1000;

/// Errors that can occur when calling the remote cart API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the remote API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The remote API rejected the request.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The remote API returned a cart that cannot be adopted locally.
    #[error("Invalid remote cart: {0}")]
    InvalidCart(String),
}

// =============================================================================
// RemoteCartClient
// =============================================================================

/// Client for the remote cart API.
#[derive(Clone)]
pub struct RemoteCartClient {
    inner: Arc<RemoteCartClientInner>,
}

struct RemoteCartClientInner {
    client: reqwest::Client,
    base_url: String,
    token: String,
    quotes: Cache<String, CartTotals>,
}

impl RemoteCartClient {
    /// Create a new remote cart API client.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built.
    pub fn new(config: &CartApiConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let quotes = Cache::builder()
            .max_capacity(QUOTE_CACHE_CAPACITY)
            .time_to_live(QUOTE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(RemoteCartClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                token: config.token.expose_secret().to_string(),
                quotes,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Create a server-side mirror of `cart`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, cart), fields(lines = cart.len()))]
    pub async fn create_cart(&self, cart: &Cart) -> Result<RemoteCart, RemoteError> {
        let response = self
            .inner
            .client
            .post(self.url("/carts"))
            .bearer_auth(&self.inner.token)
            .json(cart)
            .send()
            .await?;
        read_json(response, "cart").await
    }

    /// Fetch a server-side mirror.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` if the mirror no longer exists.
    #[instrument(skip(self), fields(remote_cart = %id))]
    pub async fn fetch_cart(&self, id: &RemoteCartId) -> Result<RemoteCart, RemoteError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/carts/{id}")))
            .bearer_auth(&self.inner.token)
            .send()
            .await?;
        read_json(response, id.as_str()).await
    }

    /// Overwrite a server-side mirror with `cart`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` if the mirror no longer exists.
    #[instrument(skip(self, cart), fields(remote_cart = %id, lines = cart.len()))]
    pub async fn update_cart(
        &self,
        id: &RemoteCartId,
        cart: &Cart,
    ) -> Result<RemoteCart, RemoteError> {
        let response = self
            .inner
            .client
            .put(self.url(&format!("/carts/{id}")))
            .bearer_auth(&self.inner.token)
            .json(cart)
            .send()
            .await?;
        read_json(response, id.as_str()).await
    }

    /// Price `cart`, using a cached quote when the contents are unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, cart), fields(lines = cart.len()))]
    pub async fn price_cart(&self, cart: &Cart) -> Result<CartTotals, RemoteError> {
        let cache_key = fingerprint(cart);

        if let Some(totals) = self.inner.quotes.get(&cache_key).await {
            debug!("Cache hit for cart quote");
            return Ok(totals);
        }

        let response = self
            .inner
            .client
            .post(self.url("/carts/quote"))
            .bearer_auth(&self.inner.token)
            .json(cart)
            .send()
            .await?;
        let totals: CartTotals = read_json(response, "quote").await?;

        self.inner.quotes.insert(cache_key, totals.clone()).await;

        Ok(totals)
    }
}

/// Decode a response body, mapping error statuses to `RemoteError`.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    resource: &str,
) -> Result<T, RemoteError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(RemoteError::RateLimited(retry_after));
    }

    // Get response body as text first for better error diagnostics
    let body = response.text().await?;

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(resource.to_string()));
    }

    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "Cart API returned non-success status"
        );
        return Err(api_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse cart API response"
        );
        RemoteError::Parse(e)
    })
}

fn api_error(status: reqwest::StatusCode, body: &str) -> RemoteError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(ApiErrorBody::into_message)
        .unwrap_or_else(|| body.chars().take(200).collect());
    RemoteError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Cache key covering everything that affects a quote.
fn fingerprint(cart: &Cart) -> String {
    let mut key = cart
        .owner()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    for line in cart.lines() {
        let _ = write!(key, "|{}x{}@{}", line.id(), line.quantity, line.price);
    }
    key
}
