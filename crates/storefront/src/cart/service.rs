//! Cart entry point for UI surfaces.
//!
//! `CartService` is the only way callers mutate a cart. Each mutation runs
//! the pure operation, saves the result through [`CartStore`], and then
//! publishes it on the [`SubscriptionBus`]. Nothing is published when the
//! save fails.

use forkful_core::{Cart, CartLine, LineId, Outlet};
use tracing::{debug, info, instrument};

use super::CartError;
use super::bus::{CartEvent, CartKey, SubscriberError, Subscription, SubscriptionBus};
use super::conflict::{self, Compatibility, ConflictDecision, Resolution};
use super::reconciler::{self, AddOutcome, CartLimits, NewLine, QuantityOutcome};
use super::storage::CartStorage;
use super::store::CartStore;

/// One visitor's cart, wired to storage and the subscription bus.
pub struct CartService<S> {
    key: CartKey,
    store: CartStore<S>,
    bus: SubscriptionBus,
    limits: CartLimits,
}

impl<S: CartStorage> CartService<S> {
    /// Load the cart stored in `storage`.
    pub async fn open(storage: S, key: CartKey, bus: SubscriptionBus, limits: CartLimits) -> Self {
        Self {
            key,
            store: CartStore::open(storage).await,
            bus,
            limits,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &CartKey {
        &self.key
    }

    /// The current cart, without touching storage.
    #[must_use]
    pub const fn snapshot(&self) -> &Cart {
        self.store.snapshot()
    }

    /// Whether lines from `target` can be added without a conflict.
    #[must_use]
    pub fn check_compatibility(&self, target: &Outlet, pending: &[CartLine]) -> Compatibility {
        conflict::check_compatibility(self.snapshot(), target, pending)
    }

    /// Add a menu line for `outlet`.
    ///
    /// Returns [`AddOutcome::Conflict`] without touching the cart when the
    /// cart belongs to another outlet.
    ///
    /// # Errors
    ///
    /// Returns `CartError` for invalid input or a failed save.
    #[instrument(skip(self, line, outlet), fields(cart = %self.key.as_str(), item = %line.item_id, outlet = %outlet))]
    pub async fn add_item(&mut self, line: NewLine, outlet: &Outlet) -> Result<AddOutcome, CartError> {
        match reconciler::add_item(self.snapshot(), line, outlet, &self.limits)? {
            AddOutcome::Added(cart) => Ok(AddOutcome::Added(self.commit(cart).await?)),
            AddOutcome::Conflict(decision) => {
                info!(current = %decision.current, "Outlet conflict, awaiting resolution");
                Ok(AddOutcome::Conflict(decision))
            }
        }
    }

    /// Apply the user's answer to an outlet conflict.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if a pending line is invalid or the save fails.
    #[instrument(skip(self, decision), fields(cart = %self.key.as_str(), target = %decision.target))]
    pub async fn resolve(
        &mut self,
        decision: ConflictDecision,
        choice: Resolution,
    ) -> Result<Cart, CartError> {
        if choice == Resolution::KeepCurrentCart {
            debug!("Keeping current cart, pending lines dropped");
            return Ok(self.snapshot().clone());
        }
        let cart = conflict::resolve(self.snapshot(), decision, choice)?;
        self.commit(cart).await
    }

    /// Adjust a line's quantity by `delta`.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if a limit is exceeded or the save fails.
    #[instrument(skip(self), fields(cart = %self.key.as_str()))]
    pub async fn change_quantity(
        &mut self,
        id: &LineId,
        delta: i64,
    ) -> Result<QuantityOutcome, CartError> {
        match reconciler::change_quantity(self.snapshot(), id, delta, &self.limits)? {
            QuantityOutcome::Updated(cart) => Ok(QuantityOutcome::Updated(self.commit(cart).await?)),
            missing @ QuantityOutcome::RequiresLine(_) => Ok(missing),
        }
    }

    /// Remove a line if present.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the save fails.
    #[instrument(skip(self), fields(cart = %self.key.as_str()))]
    pub async fn remove_item(&mut self, id: &LineId) -> Result<Cart, CartError> {
        let cart = reconciler::remove_item(self.snapshot(), id);
        self.commit(cart).await
    }

    /// Empty the cart and release its outlet.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the save fails.
    #[instrument(skip(self), fields(cart = %self.key.as_str()))]
    pub async fn clear(&mut self) -> Result<Cart, CartError> {
        self.commit(reconciler::clear()).await
    }

    /// Overwrite the cart with server-confirmed state, clamped to this
    /// cart's limits.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the state cannot form a valid cart or the save
    /// fails.
    #[instrument(skip(self, lines), fields(cart = %self.key.as_str(), lines = lines.len()))]
    pub async fn replace(
        &mut self,
        lines: Vec<CartLine>,
        owner: Option<Outlet>,
    ) -> Result<Cart, CartError> {
        let cart = self.store.replace(lines, owner, &self.limits).await?;
        self.publish(&cart);
        Ok(cart)
    }

    /// Subscribe to changes on the shared bus.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CartEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.bus.subscribe(callback)
    }

    async fn commit(&mut self, cart: Cart) -> Result<Cart, CartError> {
        self.store.save(cart.clone()).await?;
        self.publish(&cart);
        Ok(cart)
    }

    fn publish(&self, cart: &Cart) {
        let report = self.bus.publish(&CartEvent {
            key: self.key.clone(),
            cart: cart.clone(),
        });
        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Cart change published"
        );
    }
}
