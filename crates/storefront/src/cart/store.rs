//! The authoritative local cart.
//!
//! `CartStore` owns both the in-memory snapshot and the persisted blob. A
//! snapshot is only replaced after the blob has been written, so a failed
//! write leaves the previously persisted cart in effect.

use forkful_core::{Cart, CartLine, Outlet};
use tracing::{debug, warn};

use super::CartError;
use super::reconciler::CartLimits;
use super::storage::{CartStorage, StorageError};

/// Storage key for the cart blob.
pub const CART_STORAGE_KEY: &str = "cart";

/// Owns the cart snapshot and its persisted representation.
pub struct CartStore<S> {
    storage: S,
    snapshot: Cart,
}

impl<S: CartStorage> CartStore<S> {
    /// Open a store and load the persisted cart.
    pub async fn open(storage: S) -> Self {
        let mut store = Self {
            storage,
            snapshot: Cart::empty(),
        };
        store.load().await;
        store
    }

    /// Reload the persisted cart into the snapshot and return it.
    ///
    /// A missing, unreadable, or malformed blob yields the empty cart.
    pub async fn load(&mut self) -> Cart {
        let cart = match self.storage.get(CART_STORAGE_KEY).await {
            Ok(Some(raw)) => decode(&raw),
            Ok(None) => Cart::empty(),
            Err(e) => {
                warn!(error = %e, "Failed to read cart, starting empty");
                Cart::empty()
            }
        };
        self.snapshot = cart.clone();
        cart
    }

    /// Persist `cart` and make it the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails. The snapshot is unchanged.
    pub async fn save(&mut self, cart: Cart) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&cart)
            .map_err(|e| StorageError::Unavailable(format!("cannot encode cart: {e}")))?;
        self.storage.set(CART_STORAGE_KEY, raw).await?;
        debug!(lines = cart.len(), "Cart saved");
        self.snapshot = cart;
        Ok(())
    }

    /// The in-memory cart, without touching storage.
    #[must_use]
    pub const fn snapshot(&self) -> &Cart {
        &self.snapshot
    }

    /// Overwrite the cart with externally supplied state and persist it.
    ///
    /// The input is normalized first: zero-quantity lines are dropped,
    /// repeated line identities keep the last occurrence, quantities and the
    /// line count are clamped to `limits`, and an empty result releases the
    /// owner.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Shape` if lines remain without an owner, or
    /// `CartError::Storage` if the write fails.
    pub async fn replace(
        &mut self,
        lines: Vec<CartLine>,
        owner: Option<Outlet>,
        limits: &CartLimits,
    ) -> Result<Cart, CartError> {
        let cart = normalize(lines, owner, limits)?;
        self.save(cart.clone()).await?;
        Ok(cart)
    }
}

/// Decode a persisted blob, treating anything malformed as the empty cart.
fn decode(raw: &str) -> Cart {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding malformed cart blob");
        Cart::empty()
    })
}

/// Coerce externally supplied lines into a valid cart.
fn normalize(
    lines: Vec<CartLine>,
    owner: Option<Outlet>,
    limits: &CartLimits,
) -> Result<Cart, forkful_core::CartShapeError> {
    let mut kept: Vec<CartLine> = Vec::with_capacity(lines.len());
    for mut line in lines.into_iter().filter(|l| l.quantity > 0) {
        if line.quantity > limits.max_line_quantity {
            warn!(
                item = %line.item_id,
                quantity = line.quantity,
                max = limits.max_line_quantity,
                "Clamping line quantity"
            );
            line.quantity = limits.max_line_quantity;
        }
        if let Some(existing) = kept.iter_mut().find(|l| l.same_line(&line)) {
            *existing = line;
        } else {
            kept.push(line);
        }
    }
    if kept.len() > limits.max_lines {
        warn!(lines = kept.len(), max = limits.max_lines, "Dropping lines over the limit");
        kept.truncate(limits.max_lines);
    }
    Cart::from_parts(kept, owner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use forkful_core::{BranchId, ItemId, Price, RestaurantId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::cart::storage::MemoryStorage;

    struct FailingWrites(MemoryStorage);

    impl CartStorage for FailingWrites {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get(key).await
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk full".to_string()))
        }
    }

    struct FailingReads;

    impl CartStorage for FailingReads {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("offline".to_string()))
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn outlet() -> Outlet {
        Outlet::new(
            RestaurantId::parse("R1").unwrap(),
            BranchId::parse("B1").unwrap(),
        )
    }

    fn line(item: &str, quantity: u32) -> CartLine {
        CartLine {
            item_id: ItemId::parse(item).unwrap(),
            name: item.to_string(),
            price: Price::new(Decimal::new(100, 0)).unwrap(),
            quantity,
            variant: None,
            add_ons: Vec::new(),
            options: Vec::new(),
        }
    }

    fn cart_with(lines: Vec<CartLine>) -> Cart {
        Cart::from_parts(lines, Some(outlet())).unwrap()
    }

    #[tokio::test]
    async fn test_open_empty_storage() {
        let store = CartStore::open(MemoryStorage::new()).await;
        assert_eq!(store.snapshot(), &Cart::empty());
    }

    #[tokio::test]
    async fn test_save_then_reload() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone()).await;
        let cart = cart_with(vec![line("A", 2)]);
        store.save(cart.clone()).await.unwrap();

        let reopened = CartStore::open(storage).await;
        assert_eq!(reopened.snapshot(), &cart);
    }

    #[tokio::test]
    async fn test_malformed_blob_reads_as_empty() {
        for raw in [
            "not json",
            "[]",
            r#"{"lines": "nope"}"#,
            r#"{"lines":[{"itemId":"A","name":"A","price":1,"quantity":1}],"restaurantId":null,"branchId":null}"#,
            r#"{"lines":[{"itemId":"A","name":"A","price":-5,"quantity":1}],"restaurantId":"R1","branchId":"B1"}"#,
        ] {
            let store = CartStore::open(MemoryStorage::with_value(CART_STORAGE_KEY, raw)).await;
            assert_eq!(store.snapshot(), &Cart::empty(), "blob: {raw}");
        }
    }

    #[tokio::test]
    async fn test_read_failure_reads_as_empty() {
        let mut store = CartStore::open(FailingReads).await;
        assert_eq!(store.load().await, Cart::empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_cart() {
        let original = cart_with(vec![line("A", 1)]);
        let raw = serde_json::to_string(&original).unwrap();
        let storage = MemoryStorage::with_value(CART_STORAGE_KEY, raw.clone());
        let mut store = CartStore::open(FailingWrites(storage.clone())).await;

        let result = store.save(cart_with(vec![line("B", 1)])).await;
        assert!(result.is_err());
        assert_eq!(store.snapshot(), &original);
        assert_eq!(storage.raw(CART_STORAGE_KEY), Some(raw));
    }

    #[tokio::test]
    async fn test_replace_normalizes() {
        let mut store = CartStore::open(MemoryStorage::new()).await;
        let cart = store
            .replace(
                vec![line("A", 1), line("B", 0), line("A", 4)],
                Some(outlet()),
                &CartLimits::default(),
            )
            .await
            .unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_replace_with_only_zero_lines_releases_owner() {
        let mut store = CartStore::open(MemoryStorage::new()).await;
        let cart = store
            .replace(vec![line("A", 0)], Some(outlet()), &CartLimits::default())
            .await
            .unwrap();
        assert_eq!(cart, Cart::empty());
        assert_eq!(cart.owner(), None);
    }

    #[tokio::test]
    async fn test_replace_rejects_lines_without_owner() {
        let mut store = CartStore::open(MemoryStorage::new()).await;
        let err = store
            .replace(vec![line("A", 1)], None, &CartLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Shape(_)));
        assert_eq!(store.snapshot(), &Cart::empty());
    }

    #[tokio::test]
    async fn test_replace_clamps_to_limits() {
        let mut store = CartStore::open(MemoryStorage::new()).await;
        let limits = CartLimits {
            max_line_quantity: 10,
            max_lines: 2,
        };
        let cart = store
            .replace(
                vec![line("A", 150), line("B", 1), line("C", 1)],
                Some(outlet()),
                &limits,
            )
            .await
            .unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.lines()[0].quantity, 10);
        assert_eq!(cart.lines()[1].item_id.as_str(), "B");
    }
}
