//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FORKFUL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `FORKFUL_BASE_URL` - Public URL for the storefront
//! - `CART_API_BASE_URL` - Base URL of the remote cart API
//! - `CART_API_TOKEN` - Bearer token for the remote cart API (high entropy)
//!
//! ## Optional
//! - `FORKFUL_HOST` - Bind address (default: 127.0.0.1)
//! - `FORKFUL_PORT` - Listen port (default: 3000)
//! - `CART_API_TIMEOUT_SECS` - Remote request timeout (default: 10)
//! - `CART_MAX_LINE_QUANTITY` - Maximum quantity of one line (default: 99)
//! - `CART_MAX_LINES` - Maximum distinct lines per cart (default: 50)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::cart::CartLimits;
use crate::cart::reconciler::{DEFAULT_MAX_LINE_QUANTITY, DEFAULT_MAX_LINES};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CART_API_TIMEOUT_SECS: u64 = 10;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Remote cart API configuration
    pub cart_api: CartApiConfig,
    /// Per-cart limits
    pub cart_limits: CartLimits,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "production", "staging")
    pub sentry_environment: Option<String>,
}

/// Remote cart API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct CartApiConfig {
    /// Base URL (e.g., <https://api.forkful.example/v1>)
    pub base_url: Url,
    /// Bearer token (server-side only)
    pub token: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CartApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("FORKFUL_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("FORKFUL_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("FORKFUL_PORT", "3000")?;
        let base_url = get_required_env("FORKFUL_BASE_URL")?;

        let cart_api = CartApiConfig::from_env()?;
        let cart_limits = cart_limits_from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cart_api,
            cart_limits,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CartApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_required_env("CART_API_BASE_URL")?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("CART_API_BASE_URL".to_string(), e.to_string()))?;
        let timeout_secs = get_parsed_or_default::<u64>(
            "CART_API_TIMEOUT_SECS",
            &DEFAULT_CART_API_TIMEOUT_SECS.to_string(),
        )?;

        Ok(Self {
            base_url,
            token: get_validated_secret("CART_API_TOKEN")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn cart_limits_from_env() -> Result<CartLimits, ConfigError> {
    let max_line_quantity = get_parsed_or_default::<u32>(
        "CART_MAX_LINE_QUANTITY",
        &DEFAULT_MAX_LINE_QUANTITY.to_string(),
    )?;
    let max_lines =
        get_parsed_or_default::<usize>("CART_MAX_LINES", &DEFAULT_MAX_LINES.to_string())?;

    if max_line_quantity == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "CART_MAX_LINE_QUANTITY".to_string(),
            "must be at least 1".to_string(),
        ));
    }
    if max_lines == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "CART_MAX_LINES".to_string(),
            "must be at least 1".to_string(),
        ));
    }

    Ok(CartLimits {
        max_line_quantity,
        max_lines,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API tokens have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cart_api() -> CartApiConfig {
        CartApiConfig {
            base_url: Url::parse("https://api.forkful.test/v1").unwrap(),
            token: SecretString::from("super_secret_cart_token"),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-token-here", "CART_API_TOKEN");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "CART_API_TOKEN");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "CART_API_TOKEN");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parsed_or_default_uses_default() {
        let value: u16 = get_parsed_or_default("FORKFUL_TEST_UNSET_PORT", "3000").unwrap();
        assert_eq!(value, 3000);

        let err = get_parsed_or_default::<u16>("FORKFUL_TEST_UNSET_PORT", "not-a-port").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "FORKFUL_TEST_UNSET_PORT"));
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            cart_api: cart_api(),
            cart_limits: CartLimits::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_secure());
    }

    #[test]
    fn test_cart_api_config_debug_redacts_token() {
        let debug_output = format!("{:?}", cart_api());

        assert!(debug_output.contains("api.forkful.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_cart_token"));
    }
}
