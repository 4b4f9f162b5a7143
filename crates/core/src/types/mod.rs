//! Core types for Forkful.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;

pub use cart::{Cart, CartLine, CartShapeError, LineId, LineKey, Outlet, Selection};
pub use id::*;
pub use price::{Price, PriceError};
