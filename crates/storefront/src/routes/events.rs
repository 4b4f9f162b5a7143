//! Server-Sent Events feed of the visitor's cart.
//!
//! Each connection subscribes to the shared bus and forwards only events
//! carrying this visitor's cart key. The subscription is dropped, and so
//! deregistered, when the client disconnects. A client that falls more than
//! [`EVENT_BUFFER`] snapshots behind misses updates instead of buffering them.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use forkful_core::Cart;
use tokio::sync::mpsc;
use tower_sessions::Session;
use tracing::{debug, instrument};

use super::cart::{CartView, open_cart};
use crate::cart::{CartEvent, CartKey, SubscriberError};
use crate::error::Result;
use crate::state::AppState;

/// SSE event name for cart snapshots.
const CART_EVENT: &str = "cart";

/// Snapshots queued per connection before deliveries start failing.
const EVENT_BUFFER: usize = 16;

fn cart_event(cart: &Cart) -> Event {
    let json = serde_json::to_string(&CartView::from(cart))
        .unwrap_or_else(|_| r#"{"error":"Failed to serialize cart"}"#.to_string());
    Event::default().event(CART_EVENT).data(json)
}

/// Bus callback forwarding carts published under `key` into `tx`.
fn forward_to(
    tx: mpsc::Sender<Cart>,
    key: CartKey,
) -> impl Fn(&CartEvent) -> std::result::Result<(), SubscriberError> + Send + Sync + 'static {
    move |event| {
        if event.key != key {
            return Ok(());
        }
        tx.try_send(event.cart.clone())
            .map_err(|e| e.to_string().into())
    }
}

/// Stream the current cart, then the cart after every saved mutation.
///
/// GET /cart/events
#[instrument(skip(state, session))]
pub async fn stream(
    State(state): State<AppState>,
    session: Session,
) -> Result<Sse<impl futures::Stream<Item = std::result::Result<Event, Infallible>>>> {
    let cart = open_cart(&state, &session).await?;
    let key = cart.key().clone();
    let initial = cart.snapshot().clone();

    let (tx, mut rx) = mpsc::channel::<Cart>(EVENT_BUFFER);
    let subscription = state.bus().subscribe(forward_to(tx, key.clone()));
    debug!(cart = %key.as_str(), "Cart event stream opened");

    let events = async_stream::stream! {
        let _subscription = subscription;
        yield Ok::<_, Infallible>(cart_event(&initial));
        while let Some(cart) = rx.recv().await {
            yield Ok(cart_event(&cart));
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
