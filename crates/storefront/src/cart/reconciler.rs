//! Structural cart mutations.
//!
//! Every function here is pure: it takes the current cart and returns the
//! next one, leaving persistence and notification to
//! [`CartService`](super::CartService).

use forkful_core::{BranchId, Cart, CartLine, ItemId, LineId, Outlet, Price, RestaurantId, Selection};
use serde::Deserialize;

use super::CartError;
use super::conflict::{self, Compatibility, ConflictDecision};

/// Default maximum quantity of a single line.
pub const DEFAULT_MAX_LINE_QUANTITY: u32 = 99;

/// Default maximum number of distinct lines.
pub const DEFAULT_MAX_LINES: usize = 50;

/// Per-cart size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLimits {
    pub max_line_quantity: u32,
    pub max_lines: usize,
}

impl Default for CartLimits {
    fn default() -> Self {
        Self {
            max_line_quantity: DEFAULT_MAX_LINE_QUANTITY,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

/// A line as submitted from a menu screen. Quantity defaults to 1.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLine {
    pub item_id: ItemId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub variant: Option<Selection>,
    #[serde(default)]
    pub add_ons: Vec<Selection>,
    #[serde(default)]
    pub options: Vec<Selection>,
}

impl NewLine {
    /// Validate the line and fill in the default quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidLine` for a zero quantity, or
    /// `CartError::LimitExceeded` above the per-line limit.
    pub fn into_line(self, limits: &CartLimits) -> Result<CartLine, CartError> {
        let quantity = self.quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(CartError::InvalidLine(format!(
                "quantity for item {} must be at least 1",
                self.item_id
            )));
        }
        check_quantity(quantity, limits)?;
        Ok(CartLine {
            item_id: self.item_id,
            name: self.name,
            price: self.price,
            quantity,
            variant: self.variant.filter(|v| !v.is_null()),
            add_ons: self.add_ons,
            options: self.options,
        })
    }
}

/// Result of [`add_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The line was applied.
    Added(Cart),
    /// The line targets another outlet; nothing was applied.
    Conflict(ConflictDecision),
}

/// Result of [`change_quantity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityOutcome {
    /// The quantity change was applied (possibly as a no-op).
    Updated(Cart),
    /// The line does not exist and the caller must add it with full line data.
    RequiresLine(LineId),
}

/// Build the target outlet from optional identifiers.
///
/// # Errors
///
/// Returns `CartError::MissingOutlet` if either identifier is absent, or
/// `CartError::InvalidId` if one is blank.
pub fn target_outlet(
    restaurant_id: Option<&str>,
    branch_id: Option<&str>,
) -> Result<Outlet, CartError> {
    let restaurant_id = restaurant_id.ok_or(CartError::MissingOutlet("restaurant id"))?;
    let branch_id = branch_id.ok_or(CartError::MissingOutlet("branch id"))?;
    Ok(Outlet::new(
        RestaurantId::parse(restaurant_id)?,
        BranchId::parse(branch_id)?,
    ))
}

/// Add a line, replacing the quantity of an existing line with the same identity.
///
/// # Errors
///
/// Returns `CartError` if the line is invalid or a limit would be exceeded.
pub fn add_item(
    cart: &Cart,
    line: NewLine,
    outlet: &Outlet,
    limits: &CartLimits,
) -> Result<AddOutcome, CartError> {
    let line = line.into_line(limits)?;

    if let Compatibility::Incompatible(decision) =
        conflict::check_compatibility(cart, outlet, std::slice::from_ref(&line))
    {
        return Ok(AddOutcome::Conflict(decision));
    }

    let is_new = !cart.lines().iter().any(|l| l.same_line(&line));
    if is_new && cart.len() >= limits.max_lines {
        return Err(CartError::LimitExceeded(format!(
            "a cart holds at most {} lines",
            limits.max_lines
        )));
    }

    let mut next = cart.clone();
    next.upsert(outlet, line)?;
    Ok(AddOutcome::Added(next))
}

/// Adjust a line's quantity by `delta`. A result of zero or less removes it.
///
/// # Errors
///
/// Returns `CartError::LimitExceeded` if an increase would take the line
/// above the per-line limit. Decreases are always allowed.
pub fn change_quantity(
    cart: &Cart,
    id: &LineId,
    delta: i64,
    limits: &CartLimits,
) -> Result<QuantityOutcome, CartError> {
    let Some(line) = cart.line(id) else {
        if delta > 0 {
            return Ok(QuantityOutcome::RequiresLine(id.clone()));
        }
        return Ok(QuantityOutcome::Updated(cart.clone()));
    };

    let target = i64::from(line.quantity).saturating_add(delta);
    let mut next = cart.clone();
    if target <= 0 {
        next.remove(id);
    } else {
        let quantity = u32::try_from(target).unwrap_or(u32::MAX);
        if delta > 0 {
            check_quantity(quantity, limits)?;
        }
        next.set_quantity(id, quantity);
    }
    Ok(QuantityOutcome::Updated(next))
}

/// Remove a line if present.
#[must_use]
pub fn remove_item(cart: &Cart, id: &LineId) -> Cart {
    let mut next = cart.clone();
    next.remove(id);
    next
}

/// An empty, unowned cart.
#[must_use]
pub const fn clear() -> Cart {
    Cart::empty()
}

fn check_quantity(quantity: u32, limits: &CartLimits) -> Result<(), CartError> {
    if quantity > limits.max_line_quantity {
        return Err(CartError::LimitExceeded(format!(
            "quantity {quantity} is above the maximum of {}",
            limits.max_line_quantity
        )));
    }
    Ok(())
}
