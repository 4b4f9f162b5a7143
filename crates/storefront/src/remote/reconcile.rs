//! Push the local cart to its remote mirror and adopt the confirmed state.

use forkful_core::RemoteCartId;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::{RemoteCart, RemoteCartClient, RemoteError};
use crate::cart::{CartError, CartService, CartStorage};

/// Errors that can occur while reconciling with the remote mirror.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The remote API call failed. The local cart is unchanged.
    #[error("remote cart error: {0}")]
    Remote(#[from] RemoteError),

    /// The confirmed cart could not be saved locally.
    #[error("local cart error: {0}")]
    Cart(#[from] CartError),
}

/// Keeps a visitor's cart in step with the remote cart API.
#[derive(Clone)]
pub struct Reconciler {
    client: RemoteCartClient,
}

impl Reconciler {
    #[must_use]
    pub const fn new(client: RemoteCartClient) -> Self {
        Self { client }
    }

    /// Push the local cart and replace it with what the server confirmed.
    ///
    /// Creates a mirror when `remote_id` is `None` or the known mirror is
    /// gone. Returns the id of the mirror that now holds the cart.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Remote` if the API call fails or confirms a
    /// cart that is not valid (nothing local changes), or
    /// `ReconcileError::Cart` if the confirmed state cannot be saved.
    #[instrument(skip(self, service), fields(cart = %service.key().as_str()))]
    pub async fn sync<S: CartStorage>(
        &self,
        service: &mut CartService<S>,
        remote_id: Option<RemoteCartId>,
    ) -> Result<RemoteCartId, ReconcileError> {
        let local = service.snapshot().clone();

        let remote = match remote_id {
            Some(id) => match self.client.update_cart(&id, &local).await {
                Err(RemoteError::NotFound(_)) => {
                    warn!(remote_cart = %id, "Remote cart expired, recreating");
                    self.client.create_cart(&local).await?
                }
                other => other?,
            },
            None => self.client.create_cart(&local).await?,
        };

        self.adopt(service, remote).await
    }

    /// Replace the local cart with the remote mirror, without pushing.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::Remote` if the mirror cannot be fetched or is
    /// not a valid cart, or `ReconcileError::Cart` if it cannot be saved.
    #[instrument(skip(self, service), fields(cart = %service.key().as_str(), remote_cart = %remote_id))]
    pub async fn pull<S: CartStorage>(
        &self,
        service: &mut CartService<S>,
        remote_id: &RemoteCartId,
    ) -> Result<RemoteCartId, ReconcileError> {
        let remote = self.client.fetch_cart(remote_id).await?;
        self.adopt(service, remote).await
    }

    async fn adopt<S: CartStorage>(
        &self,
        service: &mut CartService<S>,
        remote: RemoteCart,
    ) -> Result<RemoteCartId, ReconcileError> {
        let owner = remote.owner();
        let cart = service
            .replace(remote.lines, owner)
            .await
            .map_err(|e| match e {
                CartError::Storage(_) => ReconcileError::Cart(e),
                invalid => ReconcileError::Remote(RemoteError::InvalidCart(invalid.to_string())),
            })?;
        info!(
            remote_cart = %remote.id,
            lines = cart.len(),
            "Cart reconciled with remote mirror"
        );
        Ok(remote.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use forkful_core::{BranchId, Cart, CartLine, ItemId, Price, RestaurantId};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use url::Url;

    use super::*;
    use crate::cart::{CartKey, CartLimits, MemoryStorage, NewLine, SubscriptionBus};
    use crate::config::CartApiConfig;

    fn unreachable_client() -> RemoteCartClient {
        RemoteCartClient::new(&CartApiConfig {
            base_url: Url::parse("http://127.0.0.1:9").unwrap(),
            token: SecretString::from("test-token"),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    async fn open_service() -> CartService<MemoryStorage> {
        CartService::open(
            MemoryStorage::new(),
            CartKey::new("v"),
            SubscriptionBus::new(),
            CartLimits::default(),
        )
        .await
    }

    async fn service_with_line() -> CartService<MemoryStorage> {
        let mut service = open_service().await;
        let line: NewLine = serde_json::from_value(serde_json::json!({
            "itemId": "A", "name": "A", "price": "3.00"
        }))
        .unwrap();
        let outlet = crate::cart::reconciler::target_outlet(Some("R1"), Some("B1")).unwrap();
        service.add_item(line, &outlet).await.unwrap();
        service
    }

    fn remote_line(item: &str) -> CartLine {
        CartLine {
            item_id: ItemId::parse(item).unwrap(),
            name: item.to_string(),
            price: Price::new(Decimal::new(300, 2)).unwrap(),
            quantity: 1,
            variant: None,
            add_ons: Vec::new(),
            options: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_failed_sync_leaves_local_cart() {
        let mut service = service_with_line().await;
        let before = service.snapshot().clone();

        let reconciler = Reconciler::new(unreachable_client());
        let err = reconciler.sync(&mut service, None).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Remote(RemoteError::Http(_))));
        assert_eq!(service.snapshot(), &before);
        assert_ne!(service.snapshot(), &Cart::empty());
    }

    #[tokio::test]
    async fn test_failed_pull_leaves_local_cart() {
        let mut service = service_with_line().await;
        let before = service.snapshot().clone();

        let reconciler = Reconciler::new(unreachable_client());
        let err = reconciler
            .pull(&mut service, &RemoteCartId::parse("rc-1").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Remote(RemoteError::Http(_))));
        assert_eq!(service.snapshot(), &before);
    }

    #[tokio::test]
    async fn test_ownerless_remote_cart_is_a_remote_error() {
        let mut service = service_with_line().await;
        let before = service.snapshot().clone();
        let remote = RemoteCart {
            id: RemoteCartId::parse("rc-1").unwrap(),
            lines: vec![remote_line("A")],
            restaurant_id: Some(RestaurantId::parse("R1").unwrap()),
            branch_id: None,
            updated_at: None,
        };

        let reconciler = Reconciler::new(unreachable_client());
        let err = reconciler.adopt(&mut service, remote).await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Remote(RemoteError::InvalidCart(_))
        ));
        assert_eq!(service.snapshot(), &before);
    }

    #[tokio::test]
    async fn test_adopt_confirmed_cart() {
        let mut service = open_service().await;
        let remote = RemoteCart {
            id: RemoteCartId::parse("rc-2").unwrap(),
            lines: vec![remote_line("B")],
            restaurant_id: Some(RestaurantId::parse("R1").unwrap()),
            branch_id: Some(BranchId::parse("B1").unwrap()),
            updated_at: None,
        };

        let reconciler = Reconciler::new(unreachable_client());
        let id = reconciler.adopt(&mut service, remote).await.unwrap();

        assert_eq!(id.as_str(), "rc-2");
        assert_eq!(service.snapshot().lines()[0].item_id.as_str(), "B");
    }
}
