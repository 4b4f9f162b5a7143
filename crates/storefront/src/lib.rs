//! Forkful storefront library.
//!
//! Owns the single-outlet cart: persistence in the visitor's session,
//! outlet conflict handling, quantity rules, change notification, the remote
//! cart API adapter and the HTTP surface over all of it. Exposed as a library
//! so the binary, the CLI and the integration tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod remote;
pub mod routes;
pub mod state;

use axum::{Router, extract::Request};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::rate_limit::RateLimiterLayer;
use crate::state::AppState;

/// Build the storefront router.
///
/// `rate_limiter` guards `/cart` only. Sentry layers are added by the binary.
pub fn app<S>(
    state: AppState,
    session_layer: SessionManagerLayer<S>,
    rate_limiter: Option<RateLimiterLayer>,
) -> Router
where
    S: SessionStore + Clone,
{
    let mut cart = routes::cart_routes();
    if let Some(limiter) = rate_limiter {
        cart = cart.layer(limiter);
    }

    Router::new()
        .merge(routes::health_routes())
        .nest("/cart", cart)
        .layer(session_layer)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
