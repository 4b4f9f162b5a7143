//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Cart (JSON, session-scoped)
//! GET  /cart                   - Current cart
//! GET  /cart/count             - Item count for the badge
//! POST /cart/items             - Add a line (409 on outlet conflict)
//! POST /cart/items/quantity    - Step a line's quantity (422 if the line is missing)
//! POST /cart/items/remove      - Remove a line
//! POST /cart/clear             - Empty the cart
//! POST /cart/conflict/resolve  - Answer a parked outlet conflict
//! GET  /cart/totals            - Priced totals from the cart API
//! POST /cart/sync              - Reconcile with the remote mirror
//! GET  /cart/sync              - Adopt the remote mirror (404 if never synced)
//! POST /cart/order-placed      - Clear the cart after checkout
//! GET  /cart/events            - Server-Sent Events feed of cart changes
//! ```

pub mod cart;
pub mod events;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add_item))
        .route("/items/quantity", post(cart::change_quantity))
        .route("/items/remove", post(cart::remove_item))
        .route("/clear", post(cart::clear))
        .route("/conflict/resolve", post(cart::resolve_conflict))
        .route("/totals", get(cart::totals))
        .route("/sync", get(cart::pull).post(cart::sync))
        .route("/order-placed", post(cart::order_placed))
        .route("/events", get(events::stream))
}

/// Create the health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
