//! Single-outlet cart consistency.
//!
//! # Architecture
//!
//! - [`store::CartStore`] - the only component that reads or writes the
//!   persisted cart blob
//! - [`conflict`] - decides whether an item from a given outlet may join the
//!   cart, and applies the caller's choice when it may not
//! - [`reconciler`] - pure add / quantity / remove / clear operations
//! - [`bus::SubscriptionBus`] - notifies UI surfaces after every saved mutation
//! - [`service::CartService`] - the entry point HTTP handlers use; routes every
//!   mutation through the pieces above in order
//!
//! Storage failures on read are absorbed (the cart reads as empty). Outlet
//! conflicts are return values, not errors. Only invalid input and failed
//! writes surface as [`CartError`].

pub mod bus;
pub mod conflict;
pub mod reconciler;
pub mod service;
pub mod storage;
pub mod store;

pub use bus::{CartEvent, CartKey, PublishReport, SubscriberError, Subscription, SubscriptionBus};
pub use conflict::{Compatibility, ConflictDecision, Resolution};
pub use reconciler::{AddOutcome, CartLimits, NewLine, QuantityOutcome};
pub use service::CartService;
pub use storage::{CartStorage, MemoryStorage, SessionStorage, StorageError};
pub use store::CartStore;

use forkful_core::{CartShapeError, IdError};
use thiserror::Error;

/// Errors returned by cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The caller did not say which restaurant or branch the item belongs to.
    #[error("missing {0}")]
    MissingOutlet(&'static str),

    /// An identifier was blank.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// The line itself is malformed (e.g., zero quantity).
    #[error("invalid line: {0}")]
    InvalidLine(String),

    /// A per-cart limit would be exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The resulting cart would break a cart invariant.
    #[error("invalid cart: {0}")]
    Shape(#[from] CartShapeError),

    /// Persisting the cart failed; the previous cart is still in effect.
    #[error("cart storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CartError {
    /// Whether this error was caused by the caller's input.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::MissingOutlet("branch id");
        assert_eq!(err.to_string(), "missing branch id");

        let err = CartError::LimitExceeded("at most 50 lines".to_string());
        assert_eq!(err.to_string(), "limit exceeded: at most 50 lines");
    }

    #[test]
    fn test_storage_is_not_invalid_input() {
        let err = CartError::Storage(StorageError::Unavailable("down".to_string()));
        assert!(!err.is_invalid_input());
        assert!(CartError::InvalidLine("zero".to_string()).is_invalid_input());
    }
}
