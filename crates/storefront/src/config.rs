//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_CLIENT_URL` - SPA origin, used for CORS and checkout redirects
//! - `STRIPE_SECRET_KEY` - Stripe secret API key (high entropy, no placeholders)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 5000)
//! - `STOREFRONT_LOG_FORMAT` - `pretty` (default) or `json`
//! - `STRIPE_API_BASE` - Stripe API base URL (default: `https://api.stripe.com/v1`)
//! - `CHECKOUT_COUPON_THRESHOLD_CENTS` - Pre-discount total that earns a gift coupon (default: 20000)
//! - `COUPON_DISCOUNT_PERCENT` - Gift coupon discount (default: 10)
//! - `COUPON_VALID_DAYS` - Gift coupon lifetime (default: 30)
//! - `CHATBOT_OLLAMA_URL` - Ollama base URL; rule-based answers only when unset
//! - `CHATBOT_OLLAMA_MODEL` - Ollama model (default: gemma:2b)
//! - `CHATBOT_KNOWLEDGE_FILE` - JSON knowledge base replacing the built-in one
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_TRACES_SAMPLE_RATE` - Fraction of transactions traced (default: 0.1)

use std::collections::HashMap;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use shonifity_core::MinorUnits;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
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
    /// SPA origin (CORS allow-origin and checkout redirect base)
    pub client_url: String,
    /// Log output format
    pub log_format: LogFormat,
    /// Stripe API configuration
    pub stripe: StripeConfig,
    /// Checkout and coupon policy
    pub checkout: CheckoutConfig,
    /// Chatbot configuration
    pub chatbot: ChatbotSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_...` / `sk_test_...`)
    pub secret_key: SecretString,
    /// API base URL without trailing slash
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Coupon and gift-threshold policy applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Pre-discount total at or above which a gift coupon is issued
    pub coupon_threshold: MinorUnits,
    /// Discount of issued coupons
    pub coupon_discount_percent: u8,
    /// Lifetime of issued coupons in days
    pub coupon_valid_days: i64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            coupon_threshold: MinorUnits::new(20_000),
            coupon_discount_percent: 10,
            coupon_valid_days: 30,
        }
    }
}

/// Chatbot settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatbotSettings {
    /// Ollama base URL (e.g. `http://localhost:11434`)
    pub ollama_url: Option<String>,
    /// Ollama model name
    pub ollama_model: String,
    /// Knowledge base JSON file
    pub knowledge_file: Option<PathBuf>,
}

impl Default for ChatbotSettings {
    fn default() -> Self {
        Self {
            ollama_url: None,
            ollama_model: "gemma:2b".to_string(),
            knowledge_file: None,
        }
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host: IpAddr = parse_env_or_default("STOREFRONT_HOST", "127.0.0.1")?;
        let port: u16 = parse_env_or_default("STOREFRONT_PORT", "5000")?;
        let client_url = get_required_env("STOREFRONT_CLIENT_URL")?;
        url::Url::parse(&client_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_CLIENT_URL".to_string(), e.to_string())
        })?;
        let log_format: LogFormat = parse_env_or_default("STOREFRONT_LOG_FORMAT", "pretty")?;

        let stripe = StripeConfig::from_env()?;
        let checkout = CheckoutConfig::from_env()?;
        let chatbot = ChatbotSettings::from_env();

        Ok(Self {
            database_url,
            host,
            port,
            client_url: client_url.trim_end_matches('/').to_string(),
            log_format,
            stripe,
            checkout,
            chatbot,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com/v1"),
        })
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            coupon_threshold: MinorUnits::new(parse_env_or_default(
                "CHECKOUT_COUPON_THRESHOLD_CENTS",
                &defaults.coupon_threshold.cents().to_string(),
            )?),
            coupon_discount_percent: parse_env_or_default(
                "COUPON_DISCOUNT_PERCENT",
                &defaults.coupon_discount_percent.to_string(),
            )?,
            coupon_valid_days: parse_env_or_default(
                "COUPON_VALID_DAYS",
                &defaults.coupon_valid_days.to_string(),
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the policy values are in range.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` naming the offending variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coupon_threshold < MinorUnits::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_COUPON_THRESHOLD_CENTS".to_string(),
                "must not be negative".to_string(),
            ));
        }
        if self.coupon_discount_percent > 100 {
            return Err(ConfigError::InvalidEnvVar(
                "COUPON_DISCOUNT_PERCENT".to_string(),
                format!("must be at most 100 (got {})", self.coupon_discount_percent),
            ));
        }
        if self.coupon_valid_days <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "COUPON_VALID_DAYS".to_string(),
                format!("must be positive (got {})", self.coupon_valid_days),
            ));
        }
        Ok(())
    }
}

impl ChatbotSettings {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ollama_url: get_optional_env("CHATBOT_OLLAMA_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            ollama_model: get_env_or_default("CHATBOT_OLLAMA_MODEL", &defaults.ollama_model),
            knowledge_file: get_optional_env("CHATBOT_KNOWLEDGE_FILE").map(PathBuf::from),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
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

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the dashboard."
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

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("sk_test_your-key-here", "STRIPE_SECRET_KEY");
        assert!(matches!(result.unwrap_err(), ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("sk_test_aaaaaaaaaaaaaaaaaaaa", "STRIPE_SECRET_KEY");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_stripe_shaped_key() {
        let result = validate_secret_strength(
            "sk_test_51Hq7xKJd9Lw2mZpR4tVb8NcY3eFgU6aQ0sXoTiW",
            "STRIPE_SECRET_KEY",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_value_reports_variable() {
        let port: u16 = parse_value("STOREFRONT_PORT", " 5000 ").unwrap();
        assert_eq!(port, 5000);

        let err = parse_value::<u16>("STOREFRONT_PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("STOREFRONT_PORT"));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_checkout_config_defaults_are_valid() {
        let config = CheckoutConfig::default();
        assert_eq!(config.coupon_threshold, MinorUnits::new(20_000));
        assert_eq!(config.coupon_discount_percent, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_checkout_config_rejects_out_of_range() {
        let too_generous = CheckoutConfig {
            coupon_discount_percent: 150,
            ..CheckoutConfig::default()
        };
        assert!(too_generous.validate().is_err());

        let expired_on_issue = CheckoutConfig {
            coupon_valid_days: 0,
            ..CheckoutConfig::default()
        };
        assert!(expired_on_issue.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            client_url: "http://localhost:5173".to_string(),
            log_format: LogFormat::Pretty,
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_abc"),
                api_base: "https://api.stripe.com/v1".to_string(),
            },
            checkout: CheckoutConfig::default(),
            chatbot: ChatbotSettings::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_stripe_config_debug_redacts_secret() {
        let config = StripeConfig {
            secret_key: SecretString::from("sk_live_super_secret_value"),
            api_base: "https://api.stripe.com/v1".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("api.stripe.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_value"));
    }
}
