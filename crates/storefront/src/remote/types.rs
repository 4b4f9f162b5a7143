//! Wire types for the remote cart API.

use chrono::{DateTime, Utc};
use forkful_core::{BranchId, CartLine, Outlet, RemoteCartId, RestaurantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The server-side mirror of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCart {
    pub id: RemoteCartId,
    #[serde(default)]
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub restaurant_id: Option<RestaurantId>,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteCart {
    /// The outlet the server believes owns this cart.
    ///
    /// A half-set owner is treated as no owner.
    #[must_use]
    pub fn owner(&self) -> Option<Outlet> {
        match (&self.restaurant_id, &self.branch_id) {
            (Some(r), Some(b)) => Some(Outlet::new(r.clone(), b.clone())),
            _ => None,
        }
    }
}

/// Priced totals computed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Decimal,
    #[serde(default)]
    pub delivery_fee: Decimal,
    #[serde(default)]
    pub service_fee: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub total: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: String,
}

/// Error body returned by the remote API.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.message.or(self.error)
    }
}
