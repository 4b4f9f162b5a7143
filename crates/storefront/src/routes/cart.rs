//! Cart route handlers.
//!
//! JSON endpoints over the visitor's session cart. Every handler opens a
//! [`CartService`] on the session, so the cart blob, the cart key and any
//! parked conflict all travel with the session cookie. Mutations respond with
//! `HX-Trigger: cart-updated` so HTMX surfaces (badge, header, review) refresh.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{AppendHeaders, IntoResponse, Response},
};
use forkful_core::{Cart, CartLine, LineId, Outlet, RemoteCartId, Selection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::reconciler::target_outlet;
use crate::cart::{
    AddOutcome, CartKey, CartService, ConflictDecision, NewLine, QuantityOutcome, Resolution,
    SessionStorage,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session_keys;
use crate::remote::{CartTotals, ReconcileError, RemoteError};
use crate::state::AppState;

/// Header telling HTMX surfaces the cart changed.
const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

// =============================================================================
// Views
// =============================================================================

/// One cart line as rendered for clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineView {
    pub line_id: LineId,
    pub item_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Selection>,
    pub add_ons: Vec<Selection>,
    pub options: Vec<Selection>,
}

impl From<&CartLine> for LineView {
    fn from(line: &CartLine) -> Self {
        Self {
            line_id: line.id(),
            item_id: line.item_id.to_string(),
            name: line.name.clone(),
            price: line.price.amount(),
            quantity: line.quantity,
            line_total: line.total(),
            variant: line.variant.clone(),
            add_ons: line.add_ons.clone(),
            options: line.options.clone(),
        }
    }
}

/// The cart as rendered for clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub restaurant_id: Option<String>,
    pub branch_id: Option<String>,
    pub lines: Vec<LineView>,
    pub item_count: u64,
    pub subtotal: Decimal,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            restaurant_id: cart.owner().map(|o| o.restaurant_id.to_string()),
            branch_id: cart.owner().map(|o| o.branch_id.to_string()),
            lines: cart.lines().iter().map(LineView::from).collect(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
        }
    }
}

/// Body of a 409 response: the choice the visitor must make.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictView {
    pub error: &'static str,
    pub current: Outlet,
    pub target: Outlet,
    pub choices: [Resolution; 2],
}

impl From<&ConflictDecision> for ConflictView {
    fn from(decision: &ConflictDecision) -> Self {
        Self {
            error: "outlet_conflict",
            current: decision.current.clone(),
            target: decision.target.clone(),
            choices: decision.choices(),
        }
    }
}

/// Cart badge count.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CountView {
    pub count: u64,
}

// =============================================================================
// Requests
// =============================================================================

/// Add-to-cart request from a menu screen.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub restaurant_id: Option<String>,
    pub branch_id: Option<String>,
    #[serde(flatten)]
    pub line: NewLine,
}

/// Quantity stepper request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeQuantityRequest {
    pub line_id: LineId,
    pub delta: i64,
}

/// Remove-line request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    pub line_id: LineId,
}

/// The visitor's answer to an outlet conflict.
#[derive(Debug, Deserialize)]
pub struct ResolveConflictRequest {
    pub choice: Resolution,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the visitor's cart key, creating one on first use.
async fn cart_key(session: &Session) -> Result<CartKey> {
    if let Some(key) = session.get::<CartKey>(session_keys::CART_KEY).await? {
        return Ok(key);
    }
    let key = CartKey::generate();
    session.insert(session_keys::CART_KEY, &key).await?;
    Ok(key)
}

/// Open the visitor's cart.
pub(super) async fn open_cart(state: &AppState, session: &Session) -> Result<CartService<SessionStorage>> {
    let key = cart_key(session).await?;
    Ok(CartService::open(
        SessionStorage::new(session.clone()),
        key,
        state.bus().clone(),
        state.cart_limits(),
    )
    .await)
}

fn updated(cart: &Cart) -> Response {
    (AppendHeaders([CART_UPDATED]), Json(CartView::from(cart))).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Current cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = open_cart(&state, &session).await?;
    Ok(Json(CartView::from(cart.snapshot())))
}

/// Cart badge count.
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> Result<Json<CountView>> {
    let cart = open_cart(&state, &session).await?;
    Ok(Json(CountView {
        count: cart.snapshot().item_count(),
    }))
}

/// Add a line from a menu screen.
///
/// Returns 409 with a [`ConflictView`] when the cart belongs to another
/// outlet; the decision is parked in the session until
/// [`resolve_conflict`] receives the visitor's choice.
#[instrument(skip(state, session, request), fields(item = %request.line.item_id))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddItemRequest>,
) -> Result<Response> {
    let outlet = target_outlet(
        request.restaurant_id.as_deref(),
        request.branch_id.as_deref(),
    )?;
    let mut cart = open_cart(&state, &session).await?;

    match cart.add_item(request.line, &outlet).await? {
        AddOutcome::Added(saved) => {
            add_breadcrumb("cart", "Item added", Some(&[("outlet", &outlet.to_string())]));
            Ok(updated(&saved))
        }
        AddOutcome::Conflict(decision) => {
            session
                .insert(session_keys::PENDING_CONFLICT, &decision)
                .await?;
            Ok((StatusCode::CONFLICT, Json(ConflictView::from(&decision))).into_response())
        }
    }
}

/// Step a line's quantity up or down.
#[instrument(skip(state, session))]
pub async fn change_quantity(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<ChangeQuantityRequest>,
) -> Result<Response> {
    let mut cart = open_cart(&state, &session).await?;
    match cart.change_quantity(&request.line_id, request.delta).await? {
        QuantityOutcome::Updated(saved) => Ok(updated(&saved)),
        QuantityOutcome::RequiresLine(id) => Err(AppError::LineRequired(id)),
    }
}

/// Remove a line.
#[instrument(skip(state, session))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<RemoveItemRequest>,
) -> Result<Response> {
    let mut cart = open_cart(&state, &session).await?;
    let saved = cart.remove_item(&request.line_id).await?;
    Ok(updated(&saved))
}

/// Empty the cart.
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Response> {
    let mut cart = open_cart(&state, &session).await?;
    let saved = cart.clear().await?;
    Ok(updated(&saved))
}

/// Apply the visitor's answer to the parked outlet conflict.
///
/// The parked decision is only consumed once the choice has been applied, so
/// a failed save can be retried.
#[instrument(skip(state, session))]
pub async fn resolve_conflict(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<ResolveConflictRequest>,
) -> Result<Response> {
    let decision = session
        .get::<ConflictDecision>(session_keys::PENDING_CONFLICT)
        .await?
        .ok_or(AppError::NoPendingConflict)?;

    let mut cart = open_cart(&state, &session).await?;
    let saved = cart.resolve(decision, request.choice).await?;
    session
        .remove::<ConflictDecision>(session_keys::PENDING_CONFLICT)
        .await?;

    if request.choice == Resolution::KeepCurrentCart {
        return Ok(Json(CartView::from(&saved)).into_response());
    }
    add_breadcrumb("cart", "Cart replaced after outlet conflict", None);
    Ok(updated(&saved))
}

/// Priced totals from the remote cart API.
#[instrument(skip(state, session))]
pub async fn totals(State(state): State<AppState>, session: Session) -> Result<Json<CartTotals>> {
    let cart = open_cart(&state, &session).await?;
    let totals = state.remote().price_cart(cart.snapshot()).await?;
    Ok(Json(totals))
}

/// Push the cart to its remote mirror and adopt the confirmed state.
#[instrument(skip(state, session))]
pub async fn sync(State(state): State<AppState>, session: Session) -> Result<Response> {
    let remote_id = session
        .get::<RemoteCartId>(session_keys::REMOTE_CART_ID)
        .await?;
    let mut cart = open_cart(&state, &session).await?;

    let remote_id = state.reconciler().sync(&mut cart, remote_id).await?;
    session
        .insert(session_keys::REMOTE_CART_ID, &remote_id)
        .await?;

    Ok(updated(cart.snapshot()))
}

/// Replace the cart with its remote mirror, without pushing local changes.
///
/// A mirror the API no longer knows is forgotten, so the next sync creates a
/// fresh one.
#[instrument(skip(state, session))]
pub async fn pull(State(state): State<AppState>, session: Session) -> Result<Response> {
    let remote_id = session
        .get::<RemoteCartId>(session_keys::REMOTE_CART_ID)
        .await?
        .ok_or(AppError::NoRemoteCart)?;
    let mut cart = open_cart(&state, &session).await?;

    match state.reconciler().pull(&mut cart, &remote_id).await {
        Ok(_) => Ok(updated(cart.snapshot())),
        Err(ReconcileError::Remote(RemoteError::NotFound(resource))) => {
            session
                .remove::<RemoteCartId>(session_keys::REMOTE_CART_ID)
                .await?;
            Err(AppError::Remote(RemoteError::NotFound(resource)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Clear the cart after an order was placed.
///
/// The remote mirror has become an order, so its id is forgotten too.
#[instrument(skip(state, session))]
pub async fn order_placed(State(state): State<AppState>, session: Session) -> Result<Response> {
    let mut cart = open_cart(&state, &session).await?;
    let saved = cart.clear().await?;
    session
        .remove::<RemoteCartId>(session_keys::REMOTE_CART_ID)
        .await?;
    session
        .remove::<ConflictDecision>(session_keys::PENDING_CONFLICT)
        .await?;
    add_breadcrumb("cart", "Cart cleared after order", None);
    Ok(updated(&saved))
}
