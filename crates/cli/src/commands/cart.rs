//! Cart inspection commands.
//!
//! # Usage
//!
//! ```bash
//! forkful-cli cart validate --file cart.json
//! ```
//!
//! The blob is decoded strictly first so shape errors are reported, then
//! loaded through `CartStore` exactly as the storefront would load it.

use std::path::Path;

use forkful_core::Cart;
use forkful_storefront::cart::store::CART_STORAGE_KEY;
use forkful_storefront::cart::{CartStore, MemoryStorage};

/// Errors that can occur while validating a cart blob.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid cart: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// What the storefront would show for a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub owner: Option<String>,
    pub lines: usize,
    pub item_count: u64,
    pub subtotal: String,
}

/// Validate a blob and summarize the cart it loads as.
///
/// # Errors
///
/// Returns `ValidateError::Invalid` if the blob does not decode to a valid cart.
pub async fn validate_blob(raw: &str) -> Result<Summary, ValidateError> {
    serde_json::from_str::<Cart>(raw)?;

    let store = CartStore::open(MemoryStorage::with_value(CART_STORAGE_KEY, raw)).await;
    let cart = store.snapshot();

    Ok(Summary {
        owner: cart.owner().map(ToString::to_string),
        lines: cart.len(),
        item_count: cart.item_count(),
        subtotal: format!("{:.2}", cart.subtotal()),
    })
}

/// Validate the blob stored at `path` and log its summary.
///
/// # Errors
///
/// Returns `ValidateError` if the file cannot be read or holds an invalid cart.
pub async fn validate_file(path: &Path) -> Result<(), ValidateError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ValidateError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let summary = validate_blob(&raw).await?;
    tracing::info!(
        owner = summary.owner.as_deref().unwrap_or("none"),
        lines = summary.lines,
        item_count = summary.item_count,
        subtotal = %summary.subtotal,
        "Cart is valid"
    );
    Ok(())
}
