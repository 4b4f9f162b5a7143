//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use forkful_core::LineId;
use serde_json::json;
use thiserror::Error;

use crate::cart::CartError;
use crate::remote::{ReconcileError, RemoteError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Remote cart API operation failed.
    #[error("Remote cart error: {0}")]
    Remote(#[from] RemoteError),

    /// Reading or writing the session failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A quantity change targeted a line the cart does not hold.
    #[error("Line {0} is not in the cart; add it with full line data")]
    LineRequired(LineId),

    /// A conflict resolution arrived with no conflict awaiting one.
    #[error("No pending cart conflict")]
    NoPendingConflict,

    /// A pull was requested before the cart was ever synced.
    #[error("Cart has no remote mirror; sync it first")]
    NoRemoteCart,
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Remote(e) => Self::Remote(e),
            ReconcileError::Cart(e) => Self::Cart(e),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) if err.is_invalid_input() => StatusCode::BAD_REQUEST,
            Self::Cart(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Remote(RemoteError::NotFound(_)) | Self::NoRemoteCart => StatusCode::NOT_FOUND,
            Self::Remote(RemoteError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Remote(_) => StatusCode::BAD_GATEWAY,
            Self::LineRequired(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NoPendingConflict => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Cart(err) if err.is_invalid_input() => err.to_string(),
            Self::Cart(_) | Self::Session(_) => "Internal server error".to_string(),
            Self::Remote(RemoteError::RateLimited(_)) => {
                "Cart service is busy, please retry shortly".to_string()
            }
            Self::Remote(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        let mut body = json!({ "error": message });
        if let Self::LineRequired(id) = &self {
            body["lineId"] = json!(id);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Item added", Some(&[("item_id", "burger-1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
