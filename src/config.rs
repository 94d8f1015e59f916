use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_MIN_ORDER_PLACEMENT_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_DISPLAYED_ERRORS: usize = 3;

/// Checkout pipeline configuration.
///
/// The skip settings drive the quick-checkout behavior of the address,
/// shipping-method and payment-method steps; the placement interval is the
/// anti-double-submit throttle enforced by the confirm step.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Reuse stored customer defaults to auto-complete steps
    #[serde(default = "default_true")]
    pub quick_checkout_enabled: bool,

    /// Auto-select and skip the shipping-method step when exactly one
    /// option is offered
    #[serde(default)]
    pub skip_shipping_if_single_option: bool,

    /// Auto-select and skip the payment-method step when exactly one
    /// non-interactive provider is active
    #[serde(default)]
    pub skip_payment_if_single_method: bool,

    /// Minimum seconds between two order placements by the same customer
    #[serde(default = "default_min_order_placement_interval")]
    #[validate(range(min = 0, max = 3600))]
    pub min_order_placement_interval_secs: u64,

    /// Cap on user-facing error/warning messages surfaced per step
    #[serde(default = "default_max_displayed_errors")]
    #[validate(range(min = 1, max = 10))]
    pub max_displayed_errors: usize,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            quick_checkout_enabled: true,
            skip_shipping_if_single_option: false,
            skip_payment_if_single_method: false,
            min_order_placement_interval_secs: default_min_order_placement_interval(),
            max_displayed_errors: default_max_displayed_errors(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (development, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Checkout pipeline settings
    #[serde(default)]
    #[validate]
    pub checkout: CheckoutConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            checkout: CheckoutConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_min_order_placement_interval() -> u64 {
    DEFAULT_MIN_ORDER_PLACEMENT_INTERVAL_SECS
}

fn default_max_displayed_errors() -> usize {
    DEFAULT_MAX_DISPLAYED_ERRORS
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Loads configuration from layered sources: `config/default`, an
/// environment-specific file, an optional `config/local`, then `APP_`
/// prefixed environment variables. Missing files fall back to defaults.
pub fn load_config() -> Result<AppConfig, ConfigurationError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    let mut builder = Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", run_env.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?;

    let default_path = Path::new(CONFIG_DIR).join("default");
    builder = builder.add_source(File::from(default_path).required(false));

    let env_path = Path::new(CONFIG_DIR).join(&run_env);
    builder = builder.add_source(File::from(env_path).required(false));

    let local_path = Path::new(CONFIG_DIR).join("local");
    builder = builder.add_source(File::from(local_path).required(false));

    builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

    let config: AppConfig = builder.build()?.try_deserialize()?;
    config.validate()?;

    Ok(config)
}
