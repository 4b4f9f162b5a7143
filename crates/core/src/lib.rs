//! Forkful Core - Shared types library.
//!
//! This crate provides the domain types used across all Forkful components:
//! - `storefront` - Cart API consumed by the browser storefront
//! - `cli` - Command-line tools for migrations and cart inspection
//!
//! # Architecture
//!
//! The core crate contains only types and their invariants - no I/O, no
//! storage, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for outlet and item IDs, prices, and the
//!   single-outlet [`Cart`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
