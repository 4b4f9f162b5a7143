//! Session-related types.
//!
//! Everything the storefront remembers about a visitor lives in their
//! tower-sessions session: the cart blob under
//! [`CART_STORAGE_KEY`](crate::cart::store::CART_STORAGE_KEY), written only by
//! `CartStore`, and the keys below.

/// Session keys for cart data.
pub mod keys {
    /// Key for the visitor's cart key, used to route bus events.
    pub const CART_KEY: &str = "cart_key";

    /// Key for an outlet conflict awaiting the visitor's choice.
    pub const PENDING_CONFLICT: &str = "pending_conflict";

    /// Key for the remote mirror's cart id.
    pub const REMOTE_CART_ID: &str = "remote_cart_id";
}
