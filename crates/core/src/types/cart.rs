//! The single-outlet cart and its line identity rules.
//!
//! A [`Cart`] holds lines from exactly one [`Outlet`] at a time. The owner
//! is present if and only if the cart has lines, and no two lines share a
//! [`LineKey`]. Both rules are enforced by construction: fields are private,
//! deserialization validates, and every mutating method keeps them intact.

use core::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::id::{BranchId, ItemId, RestaurantId};
use super::price::Price;

/// Opaque structured selection (variant, add-on, or option) chosen on the menu.
pub type Selection = serde_json::Value;

/// Number of digest bytes kept in a [`LineId`].
const LINE_ID_BYTES: usize = 16;

// =============================================================================
// Outlet
// =============================================================================

/// A specific restaurant branch the cart can belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outlet {
    pub restaurant_id: RestaurantId,
    pub branch_id: BranchId,
}

impl Outlet {
    #[must_use]
    pub const fn new(restaurant_id: RestaurantId, branch_id: BranchId) -> Self {
        Self {
            restaurant_id,
            branch_id,
        }
    }
}

impl fmt::Display for Outlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.restaurant_id, self.branch_id)
    }
}

// =============================================================================
// Line identity
// =============================================================================

/// The fields that make two cart lines "the same line".
///
/// Selections compare structurally: object key order is irrelevant, list
/// order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineKey {
    pub item_id: ItemId,
    #[serde(default)]
    pub variant: Option<Selection>,
    #[serde(default)]
    pub add_ons: Vec<Selection>,
    #[serde(default)]
    pub options: Vec<Selection>,
}

impl LineKey {
    /// Stable handle for this key.
    #[must_use]
    pub fn id(&self) -> LineId {
        let mut canonical = String::new();
        canonical.push('[');
        write_canonical(
            &serde_json::Value::String(self.item_id.as_str().to_owned()),
            &mut canonical,
        );
        canonical.push(',');
        write_canonical(
            self.variant.as_ref().unwrap_or(&serde_json::Value::Null),
            &mut canonical,
        );
        for list in [&self.add_ons, &self.options] {
            canonical.push_str(",[");
            for (i, selection) in list.iter().enumerate() {
                if i > 0 {
                    canonical.push(',');
                }
                write_canonical(selection, &mut canonical);
            }
            canonical.push(']');
        }
        canonical.push(']');

        let digest = Sha256::digest(canonical.as_bytes());
        let prefix = digest.get(..LINE_ID_BYTES).unwrap_or(digest.as_slice());
        LineId(URL_SAFE_NO_PAD.encode(prefix))
    }
}

/// Write `value` as JSON with object keys in sorted order.
fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(&serde_json::Value::String(key.clone()), out);
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// URL-safe handle of a [`LineKey`], used by UI surfaces to address a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Wrap a line handle received from a client.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CartLine
// =============================================================================

/// One orderable entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: ItemId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Selection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_ons: Vec<Selection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Selection>,
}

impl CartLine {
    /// The identity of this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            item_id: self.item_id.clone(),
            variant: self.chosen_variant().cloned(),
            add_ons: self.add_ons.clone(),
            options: self.options.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> LineId {
        self.key().id()
    }

    /// Whether `other` has the same identity, ignoring name, price and quantity.
    #[must_use]
    pub fn same_line(&self, other: &Self) -> bool {
        self.item_id == other.item_id
            && self.chosen_variant() == other.chosen_variant()
            && self.add_ons == other.add_ons
            && self.options == other.options
    }

    /// The chosen variant. An explicit JSON `null` counts as no variant.
    #[must_use]
    pub fn chosen_variant(&self) -> Option<&Selection> {
        self.variant.as_ref().filter(|v| !v.is_null())
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        self.price.times(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Ways a cart can violate its invariants.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartShapeError {
    /// The cart has lines but no owning outlet.
    #[error("cart has lines but no owning outlet")]
    MissingOwner,
    /// Only one of restaurant and branch is set.
    #[error("cart owner must name both a restaurant and a branch")]
    PartialOwner,
    /// A line was offered for an outlet other than the cart's owner.
    #[error("line belongs to {offered}, cart belongs to {owner}")]
    OwnerMismatch { owner: Outlet, offered: Outlet },
    /// A line has a zero quantity.
    #[error("line for item {0} has zero quantity")]
    ZeroQuantity(ItemId),
    /// Two lines share the same identity.
    #[error("duplicate line for item {0}")]
    DuplicateLine(ItemId),
}

/// Persisted JSON shape of a cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartRecord {
    #[serde(default)]
    lines: Vec<CartLine>,
    #[serde(default)]
    restaurant_id: Option<RestaurantId>,
    #[serde(default)]
    branch_id: Option<BranchId>,
}

/// The client-held cart, scoped to a single outlet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "CartRecord", into = "CartRecord")]
pub struct Cart {
    lines: Vec<CartLine>,
    owner: Option<Outlet>,
}

impl Cart {
    /// An unowned cart with no lines.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lines: Vec::new(),
            owner: None,
        }
    }

    /// Build a cart from parts, validating every invariant.
    ///
    /// An empty line list always yields the unowned cart.
    ///
    /// # Errors
    ///
    /// Returns `CartShapeError` if lines exist without an owner, a line has a
    /// zero quantity, or two lines share an identity.
    pub fn from_parts(lines: Vec<CartLine>, owner: Option<Outlet>) -> Result<Self, CartShapeError> {
        if lines.is_empty() {
            return Ok(Self::empty());
        }
        if owner.is_none() {
            return Err(CartShapeError::MissingOwner);
        }
        for (i, line) in lines.iter().enumerate() {
            if line.quantity == 0 {
                return Err(CartShapeError::ZeroQuantity(line.item_id.clone()));
            }
            if lines.iter().skip(i + 1).any(|other| other.same_line(line)) {
                return Err(CartShapeError::DuplicateLine(line.item_id.clone()));
            }
        }
        Ok(Self { lines, owner })
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// The outlet this cart belongs to, or `None` when the cart is empty.
    #[must_use]
    pub const fn owner(&self) -> Option<&Outlet> {
        self.owner.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of price times quantity over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::total).sum()
    }

    #[must_use]
    pub fn line(&self, id: &LineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.id() == id)
    }

    /// Whether the cart may take lines from `outlet` without clearing.
    #[must_use]
    pub fn accepts(&self, outlet: &Outlet) -> bool {
        self.owner.as_ref().is_none_or(|owner| owner == outlet)
    }

    /// Insert `line`, or replace the quantity of the line with the same identity.
    ///
    /// An unowned cart adopts `outlet`.
    ///
    /// # Errors
    ///
    /// Returns `CartShapeError::OwnerMismatch` if the cart belongs to another
    /// outlet, or `ZeroQuantity` if `line.quantity` is zero.
    pub fn upsert(&mut self, outlet: &Outlet, line: CartLine) -> Result<(), CartShapeError> {
        if let Some(owner) = &self.owner
            && owner != outlet
        {
            return Err(CartShapeError::OwnerMismatch {
                owner: owner.clone(),
                offered: outlet.clone(),
            });
        }
        if line.quantity == 0 {
            return Err(CartShapeError::ZeroQuantity(line.item_id));
        }

        if let Some(existing) = self.lines.iter_mut().find(|l| l.same_line(&line)) {
            existing.quantity = line.quantity;
        } else {
            self.lines.push(line);
        }
        self.owner = Some(outlet.clone());
        Ok(())
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// Returns `false` if no line has this id.
    pub fn set_quantity(&mut self, id: &LineId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(id).is_some();
        }
        match self.lines.iter_mut().find(|l| &l.id() == id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove a line, releasing the owner when the cart becomes empty.
    pub fn remove(&mut self, id: &LineId) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| &l.id() == id)?;
        let removed = self.lines.remove(index);
        if self.lines.is_empty() {
            self.owner = None;
        }
        Some(removed)
    }

    /// Drop every line and the owner.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.owner = None;
    }
}

impl TryFrom<CartRecord> for Cart {
    type Error = CartShapeError;

    fn try_from(record: CartRecord) -> Result<Self, Self::Error> {
        let owner = match (record.restaurant_id, record.branch_id) {
            (Some(restaurant_id), Some(branch_id)) => Some(Outlet::new(restaurant_id, branch_id)),
            (None, None) => None,
            _ if record.lines.is_empty() => None,
            _ => return Err(CartShapeError::PartialOwner),
        };
        Self::from_parts(record.lines, owner)
    }
}

impl From<Cart> for CartRecord {
    fn from(cart: Cart) -> Self {
        let (restaurant_id, branch_id) = cart
            .owner
            .map_or((None, None), |o| (Some(o.restaurant_id), Some(o.branch_id)));
        Self {
            lines: cart.lines,
            restaurant_id,
            branch_id,
        }
    }
}
