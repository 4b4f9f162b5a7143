//! Outlet conflict detection and resolution.
//!
//! Adding an item from another outlet to a non-empty cart is never applied
//! directly. [`check_compatibility`] returns a [`ConflictDecision`] instead,
//! and nothing changes until the caller passes the user's [`Resolution`] to
//! [`resolve`]. Exclusivity is enforced per branch: two branches of the same
//! restaurant conflict.

use forkful_core::{Cart, CartLine, Outlet};
use serde::{Deserialize, Serialize};

use super::CartError;

/// The user's answer to an outlet conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Leave the cart alone and drop the pending lines.
    KeepCurrentCart,
    /// Empty the cart, then add the pending lines under the new outlet.
    ClearAndApply,
}

impl Resolution {
    /// Every choice offered to the user.
    pub const ALL: [Self; 2] = [Self::KeepCurrentCart, Self::ClearAndApply];
}

/// A mutation that was held back because it targets a different outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDecision {
    /// Outlet the cart belonged to when the conflict was detected.
    pub current: Outlet,
    /// Outlet of the pending lines.
    pub target: Outlet,
    /// Lines to apply if the user chooses [`Resolution::ClearAndApply`].
    pub pending: Vec<CartLine>,
}

impl ConflictDecision {
    #[must_use]
    pub const fn choices(&self) -> [Resolution; 2] {
        Resolution::ALL
    }
}

/// Outcome of a compatibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Incompatible(ConflictDecision),
}

impl Compatibility {
    #[must_use]
    pub const fn is_compatible(&self) -> bool {
        matches!(self, Self::Compatible)
    }
}

/// Whether lines from `target` may join `cart` as-is.
///
/// An empty cart accepts any outlet. A non-empty cart accepts only its own
/// restaurant and branch.
#[must_use]
pub fn check_compatibility(cart: &Cart, target: &Outlet, pending: &[CartLine]) -> Compatibility {
    match cart.owner() {
        Some(current) if !cart.is_empty() && current != target => {
            Compatibility::Incompatible(ConflictDecision {
                current: current.clone(),
                target: target.clone(),
                pending: pending.to_vec(),
            })
        }
        _ => Compatibility::Compatible,
    }
}

/// Apply the user's choice to a held-back mutation.
///
/// # Errors
///
/// Returns `CartError::Shape` if a pending line is invalid (e.g., zero
/// quantity). The input cart is not modified either way.
pub fn resolve(
    cart: &Cart,
    decision: ConflictDecision,
    choice: Resolution,
) -> Result<Cart, CartError> {
    match choice {
        Resolution::KeepCurrentCart => Ok(cart.clone()),
        Resolution::ClearAndApply => {
            let mut fresh = Cart::empty();
            for line in decision.pending {
                fresh.upsert(&decision.target, line)?;
            }
            Ok(fresh)
        }
    }
}
