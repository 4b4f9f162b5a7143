//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cart::{CartLimits, SubscriptionBus};
use crate::config::StorefrontConfig;
use crate::remote::{Reconciler, RemoteCartClient, RemoteError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    bus: SubscriptionBus,
    remote: RemoteCartClient,
    reconciler: Reconciler,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cart API client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, RemoteError> {
        let remote = RemoteCartClient::new(&config.cart_api)?;
        let reconciler = Reconciler::new(remote.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                bus: SubscriptionBus::new(),
                remote,
                reconciler,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The bus every visitor's cart publishes on.
    #[must_use]
    pub fn bus(&self) -> &SubscriptionBus {
        &self.inner.bus
    }

    /// Get a reference to the remote cart API client.
    #[must_use]
    pub fn remote(&self) -> &RemoteCartClient {
        &self.inner.remote
    }

    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }

    #[must_use]
    pub fn cart_limits(&self) -> CartLimits {
        self.inner.config.cart_limits
    }
}
