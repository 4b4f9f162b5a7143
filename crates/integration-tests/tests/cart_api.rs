//! Integration tests for the cart API.
//!
//! Each test serves a fresh storefront on an ephemeral port and drives it
//! with a cookie-keeping client, so the cart travels in the session exactly
//! as it does for a browser.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use forkful_integration_tests::{TestContext, json_body, test_app};
use forkful_storefront::cart::{ConflictDecision, Resolution};
use forkful_storefront::models::session_keys;
use forkful_storefront::routes::cart::{ResolveConflictRequest, resolve_conflict};
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, Session};

fn burger(restaurant: &str, branch: &str, quantity: Option<u32>) -> Value {
    let mut body = json!({
        "restaurantId": restaurant,
        "branchId": branch,
        "itemId": "burger",
        "name": "Burger",
        "price": "4.50"
    });
    if let Some(quantity) = quantity {
        body["quantity"] = json!(quantity);
    }
    body
}

fn line_id(cart: &Value, index: usize) -> Value {
    cart["lines"][index]["lineId"].clone()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (_state, app) = test_app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Reading
// ============================================================================

#[tokio::test]
async fn test_new_visitor_has_empty_cart() {
    let ctx = TestContext::spawn().await;

    let response = ctx.get("/cart").await;
    assert_eq!(response.status(), StatusCode::OK);
    let cart = json_body(response).await;
    assert_eq!(cart["lines"], json!([]));
    assert_eq!(cart["restaurantId"], Value::Null);
    assert_eq!(cart["branchId"], Value::Null);

    let count = json_body(ctx.get("/cart/count").await).await;
    assert_eq!(count, json!({"count": 0}));
}

// ============================================================================
// Adding
// ============================================================================

#[tokio::test]
async fn test_add_sets_owner_and_triggers_refresh() {
    let ctx = TestContext::spawn().await;

    let response = ctx.post("/cart/items", &burger("R1", "B1", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("hx-trigger").unwrap(),
        "cart-updated"
    );

    let cart = json_body(response).await;
    assert_eq!(cart["restaurantId"], "R1");
    assert_eq!(cart["branchId"], "B1");
    assert_eq!(cart["lines"][0]["quantity"], 1);
    assert_eq!(cart["itemCount"], 1);
}

#[tokio::test]
async fn test_re_adding_replaces_quantity() {
    let ctx = TestContext::spawn().await;

    ctx.post("/cart/items", &burger("R1", "B1", Some(2))).await;
    let cart = json_body(ctx.post("/cart/items", &burger("R1", "B1", Some(3))).await).await;

    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    assert_eq!(cart["lines"][0]["quantity"], 3);

    // Persisted across requests
    let count = json_body(ctx.get("/cart/count").await).await;
    assert_eq!(count["count"], 3);
}

#[tokio::test]
async fn test_missing_branch_is_bad_request() {
    let ctx = TestContext::spawn().await;

    let mut body = burger("R1", "B1", None);
    body.as_object_mut().unwrap().remove("branchId");
    let response = ctx.post("/cart/items", &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let cart = json_body(ctx.get("/cart").await).await;
    assert_eq!(cart["lines"], json!([]));
}

#[tokio::test]
async fn test_quantity_above_limit_is_bad_request() {
    let ctx = TestContext::spawn().await;
    let response = ctx.post("/cart/items", &burger("R1", "B1", Some(1000))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Outlet conflicts
// ============================================================================

#[tokio::test]
async fn test_conflict_then_clear_and_apply() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", Some(2))).await;

    let response = ctx.post("/cart/items", &burger("R2", "B2", None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let conflict = json_body(response).await;
    assert_eq!(conflict["error"], "outlet_conflict");
    assert_eq!(conflict["current"]["restaurantId"], "R1");
    assert_eq!(conflict["target"]["branchId"], "B2");
    assert_eq!(conflict["choices"], json!(["keepCurrentCart", "clearAndApply"]));

    // Nothing changed while the choice is pending
    let cart = json_body(ctx.get("/cart").await).await;
    assert_eq!(cart["restaurantId"], "R1");
    assert_eq!(cart["lines"][0]["quantity"], 2);

    let response = ctx
        .post("/cart/conflict/resolve", &json!({"choice": "clearAndApply"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cart = json_body(response).await;
    assert_eq!(cart["restaurantId"], "R2");
    assert_eq!(cart["branchId"], "B2");
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    assert_eq!(cart["lines"][0]["quantity"], 1);
}

#[tokio::test]
async fn test_other_branch_of_same_restaurant_conflicts() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", None)).await;

    let response = ctx.post("/cart/items", &burger("R1", "B2", None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_keep_current_cart_discards_pending() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", None)).await;
    ctx.post("/cart/items", &burger("R2", "B2", None)).await;

    let response = ctx
        .post("/cart/conflict/resolve", &json!({"choice": "keepCurrentCart"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("hx-trigger").is_none());
    let cart = json_body(response).await;
    assert_eq!(cart["restaurantId"], "R1");

    // The decision was consumed
    let response = ctx
        .post("/cart/conflict/resolve", &json!({"choice": "clearAndApply"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resolve_without_pending_conflict() {
    let ctx = TestContext::spawn().await;
    let response = ctx
        .post("/cart/conflict/resolve", &json!({"choice": "clearAndApply"}))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_resolution_keeps_pending_conflict() {
    let (state, _app) = test_app();
    let session = Session::new(None, Arc::new(MemoryStore::default()), None);
    let decision: ConflictDecision = serde_json::from_value(json!({
        "current": {"restaurantId": "R1", "branchId": "B1"},
        "target": {"restaurantId": "R2", "branchId": "B2"},
        "pending": [{"itemId": "pizza", "name": "Pizza", "price": "9.00", "quantity": 0}]
    }))
    .unwrap();
    session
        .insert(session_keys::PENDING_CONFLICT, &decision)
        .await
        .unwrap();

    let request = ResolveConflictRequest {
        choice: Resolution::ClearAndApply,
    };
    let Err(err) = resolve_conflict(State(state), session.clone(), Json(request)).await else {
        panic!("resolving a zero-quantity line should fail");
    };
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let parked = session
        .get::<ConflictDecision>(session_keys::PENDING_CONFLICT)
        .await
        .unwrap();
    assert_eq!(parked, Some(decision));
}

// ============================================================================
// Quantities and removal
// ============================================================================

#[tokio::test]
async fn test_change_quantity_to_zero_releases_owner() {
    let ctx = TestContext::spawn().await;
    let cart = json_body(ctx.post("/cart/items", &burger("R1", "B1", Some(2))).await).await;
    let id = line_id(&cart, 0);

    let cart = json_body(
        ctx.post("/cart/items/quantity", &json!({"lineId": id, "delta": 1}))
            .await,
    )
    .await;
    assert_eq!(cart["lines"][0]["quantity"], 3);

    let cart = json_body(
        ctx.post("/cart/items/quantity", &json!({"lineId": id, "delta": -3}))
            .await,
    )
    .await;
    assert_eq!(cart["lines"], json!([]));
    assert_eq!(cart["restaurantId"], Value::Null);
    assert_eq!(cart["branchId"], Value::Null);
}

#[tokio::test]
async fn test_increment_missing_line_requires_line_data() {
    let ctx = TestContext::spawn().await;
    let response = ctx
        .post(
            "/cart/items/quantity",
            &json!({"lineId": "not-in-cart", "delta": 1}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["lineId"], "not-in-cart");
}

#[tokio::test]
async fn test_variants_are_separate_lines() {
    let ctx = TestContext::spawn().await;
    let mut large = burger("R1", "B1", None);
    large["variant"] = json!({"label": "large"});
    let mut small = burger("R1", "B1", None);
    small["variant"] = json!({"label": "small"});

    ctx.post("/cart/items", &large).await;
    let cart = json_body(ctx.post("/cart/items", &small).await).await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 2);

    let cart = json_body(
        ctx.post("/cart/items/remove", &json!({"lineId": line_id(&cart, 0)}))
            .await,
    )
    .await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
    assert_eq!(cart["lines"][0]["variant"]["label"], "small");
    assert_eq!(cart["restaurantId"], "R1");
}

#[tokio::test]
async fn test_clear_empties_cart() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", Some(4))).await;

    let response = ctx.post("/cart/clear", &json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cart = json_body(response).await;
    assert_eq!(cart["lines"], json!([]));
    assert_eq!(cart["restaurantId"], Value::Null);
}

#[tokio::test]
async fn test_order_placed_clears_cart() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", None)).await;

    let response = ctx.post("/cart/order-placed", &json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let count = json_body(ctx.get("/cart/count").await).await;
    assert_eq!(count["count"], 0);
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_visitors_have_separate_carts() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", Some(2))).await;

    let other = ctx.other_visitor();
    let response = other
        .post(ctx.url("/cart/items"))
        .json(&burger("R2", "B2", None))
        .send()
        .await
        .unwrap();

    // No conflict: the other visitor's cart is empty
    assert_eq!(response.status(), StatusCode::OK);
    let mine = json_body(ctx.get("/cart").await).await;
    assert_eq!(mine["restaurantId"], "R1");
}

// ============================================================================
// Remote cart API
// ============================================================================

#[tokio::test]
async fn test_totals_upstream_failure_is_bad_gateway() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", None)).await;

    let response = ctx.get("/cart/totals").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_failed_sync_keeps_local_cart() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", Some(2))).await;

    let response = ctx.post("/cart/sync", &json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let cart = json_body(ctx.get("/cart").await).await;
    assert_eq!(cart["lines"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_pull_before_sync_is_not_found() {
    let ctx = TestContext::spawn().await;
    ctx.post("/cart/items", &burger("R1", "B1", None)).await;

    let response = ctx.get("/cart/sync").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let cart = json_body(ctx.get("/cart").await).await;
    assert_eq!(cart["lines"][0]["quantity"], 1);
}

// ============================================================================
// Events
// ============================================================================

async fn read_until(response: &mut reqwest::Response, needle: &str) -> String {
    let mut received = String::new();
    while !received.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), response.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    received
}

#[tokio::test]
async fn test_event_stream_subscribes_to_bus() {
    let ctx = TestContext::spawn().await;
    assert_eq!(ctx.state.bus().subscriber_count(), 0);

    let response = ctx.get("/cart/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(ctx.state.bus().subscriber_count(), 1);
}

#[tokio::test]
async fn test_event_stream_delivers_mutations() {
    let ctx = TestContext::spawn().await;
    // Establish the session so the stream and the mutation share a cart key
    ctx.get("/cart").await;

    let mut response = ctx.get("/cart/events").await;
    let initial = read_until(&mut response, "\n\n").await;
    assert!(initial.contains("event: cart"));
    assert!(initial.contains("\"restaurantId\":null"));

    ctx.post("/cart/items", &burger("R1", "B1", None)).await;

    let update = read_until(&mut response, "\"restaurantId\":\"R1\"").await;
    assert!(update.contains("\"itemCount\":1"));
}
