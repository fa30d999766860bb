use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_TENANT: &str = "default";
const CONFIG_DIR: &str = "config";
const DEFAULT_SALE_INVOICE_PREFIX: &str = "INV-";
const DEFAULT_OLD_BATTERY_INVOICE_PREFIX: &str = "OB-";
const DEFAULT_INVOICE_PAD_WIDTH: usize = 4;

/// Ledger policy knobs.
///
/// Both defaults preserve the behavior observed in the system this engine
/// replaces: subtractive stock application clamps at zero instead of
/// rejecting, and every completed purchase save re-adds the full net amount
/// to the supplier balance. Deployments that want strict accounting can flip
/// these.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LedgerPolicy {
    /// Clamp subtractive stock application at zero (`max(0, stock - qty)`)
    /// instead of allowing negative stock.
    #[serde(default = "default_true")]
    pub clamp_negative_stock: bool,

    /// Diff the supplier balance contribution on purchase edits instead of
    /// re-adding the full net amount on every completed save.
    #[serde(default)]
    pub diff_supplier_balance_on_edit: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            clamp_negative_stock: true,
            diff_supplier_balance_on_edit: false,
        }
    }
}

/// Invoice series configuration: prefixes and zero-pad width shared by the
/// sequencer.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct InvoiceConfig {
    #[serde(default = "default_sale_prefix")]
    #[validate(length(min = 1))]
    pub sale_prefix: String,

    #[serde(default = "default_old_battery_prefix")]
    #[validate(length(min = 1))]
    pub old_battery_prefix: String,

    /// Width of the zero-padded numeric suffix.
    #[serde(default = "default_pad_width")]
    #[validate(range(min = 1, max = 8))]
    pub pad_width: usize,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            sale_prefix: default_sale_prefix(),
            old_battery_prefix: default_old_battery_prefix(),
            pad_width: default_pad_width(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Tenant identifier scoping every document path.
    #[serde(default = "default_tenant")]
    #[validate(length(min = 1))]
    pub tenant_id: String,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    #[validate]
    pub ledger: LedgerPolicy,

    #[serde(default)]
    #[validate]
    pub invoice: InvoiceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            ledger: LedgerPolicy::default(),
            invoice: InvoiceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `config/default`, an environment-specific
    /// overlay (`RUN_ENV`), and `APP__*` environment variables, then
    /// validates it.
    pub fn load() -> Result<Self, ConfigError> {
        let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
            .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let app_config: AppConfig = settings.try_deserialize()?;
        app_config
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid configuration: {}", e)))?;

        Ok(app_config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn default_true() -> bool {
    true
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_sale_prefix() -> String {
    DEFAULT_SALE_INVOICE_PREFIX.to_string()
}

fn default_old_battery_prefix() -> String {
    DEFAULT_OLD_BATTERY_INVOICE_PREFIX.to_string()
}

fn default_pad_width() -> usize {
    DEFAULT_INVOICE_PAD_WIDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tenant_id, "default");
        assert!(config.ledger.clamp_negative_stock);
        assert!(!config.ledger.diff_supplier_balance_on_edit);
        assert_eq!(config.invoice.sale_prefix, "INV-");
        assert_eq!(config.invoice.old_battery_prefix, "OB-");
        assert_eq!(config.invoice.pad_width, 4);
    }

    #[test]
    fn rejects_empty_tenant() {
        let config = AppConfig {
            tenant_id: String::new(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_pad_width() {
        let config = AppConfig {
            invoice: InvoiceConfig {
                pad_width: 0,
                ..InvoiceConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
