//! # Tax Engine Configuration
//!
//! Configuration management for the calculation engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LEVY_ROUNDING_MODE=half_even                                       │
//! │     LEVY_COMPOUND_TAXES=true                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/levy/levy.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.levy.levy/levy.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     half_up rounding to 2 places, exclusive pricing, no compounding    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # levy.toml
//! rounding_mode = "half_even"
//! rounding_precision = 2
//! compound_taxes = true
//! tax_on_shipping = false
//! tax_on_discounts = false
//! tax_inclusive_pricing = false
//! default_currency = "USD"
//! ```

use levy_core::{Money, RoundingMode, DEFAULT_ROUNDING_PRECISION};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

/// Largest supported rounding precision.
pub const MAX_ROUNDING_PRECISION: u32 = 10;

// =============================================================================
// Tax Configuration
// =============================================================================

/// Engine-wide calculation settings.
///
/// ## Flag Semantics
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  compound_taxes         compound-method rules tax the base PLUS taxes   │
/// │                         already applied to the item; off → plain %     │
/// │                                                                         │
/// │  tax_on_shipping        shipping is taxed as a synthetic "shipping"    │
/// │                         item under the same rules                      │
/// │                                                                         │
/// │  tax_on_discounts       tax is computed on the PRE-discount price;     │
/// │                         off → discount is prorated across items and    │
/// │                         lowers each item's taxable base                │
/// │                                                                         │
/// │  tax_inclusive_pricing  item prices already contain tax; tax is backed │
/// │                         out instead of added to the grand total        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxConfig {
    #[serde(default)]
    pub rounding_mode: RoundingMode,

    /// Decimal places kept on every monetary output.
    #[serde(default = "default_rounding_precision")]
    pub rounding_precision: u32,

    #[serde(default)]
    pub compound_taxes: bool,

    #[serde(default)]
    pub tax_on_shipping: bool,

    #[serde(default)]
    pub tax_on_discounts: bool,

    #[serde(default)]
    pub tax_inclusive_pricing: bool,

    /// Currency used when an input does not name one.
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_rounding_precision() -> u32 {
    DEFAULT_ROUNDING_PRECISION
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for TaxConfig {
    fn default() -> Self {
        TaxConfig {
            rounding_mode: RoundingMode::default(),
            rounding_precision: default_rounding_precision(),
            compound_taxes: false,
            tax_on_shipping: false,
            tax_on_discounts: false,
            tax_inclusive_pricing: false,
            default_currency: default_currency(),
        }
    }
}

impl TaxConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (levy.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading tax config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    EngineError::ConfigLoadFailed(format!("{}: {}", path.display(), e))
                })?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load tax config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a config from TOML text and validates it.
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        let config: TaxConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Tax config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.rounding_precision > MAX_ROUNDING_PRECISION {
            return Err(EngineError::InvalidConfig(format!(
                "rounding_precision must be at most {}, got {}",
                MAX_ROUNDING_PRECISION, self.rounding_precision
            )));
        }

        if self.default_currency.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "default_currency must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (the environment in
    /// production, a map in tests).
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("LEVY_ROUNDING_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding rounding mode from environment");
                    self.rounding_mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown rounding mode in environment"),
            }
        }

        if let Some(precision) = lookup("LEVY_ROUNDING_PRECISION") {
            match precision.parse::<u32>() {
                Ok(p) => self.rounding_precision = p,
                Err(_) => warn!(precision = %precision, "Invalid rounding precision in environment"),
            }
        }

        let flags: [(&str, &mut bool); 4] = [
            ("LEVY_COMPOUND_TAXES", &mut self.compound_taxes),
            ("LEVY_TAX_ON_SHIPPING", &mut self.tax_on_shipping),
            ("LEVY_TAX_ON_DISCOUNTS", &mut self.tax_on_discounts),
            ("LEVY_TAX_INCLUSIVE", &mut self.tax_inclusive_pricing),
        ];
        for (key, flag) in flags {
            if let Some(value) = lookup(key) {
                match parse_flag(&value) {
                    Some(parsed) => {
                        debug!(key, value = parsed, "Overriding flag from environment");
                        *flag = parsed;
                    }
                    None => warn!(key, value = %value, "Invalid boolean in environment"),
                }
            }
        }

        if let Some(currency) = lookup("LEVY_CURRENCY") {
            self.default_currency = currency;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "levy", "levy")
            .map(|dirs| dirs.config_dir().join("levy.toml"))
    }

    /// Rounds an amount with this config's precision and mode.
    #[inline]
    pub fn round(&self, amount: Money) -> Money {
        amount.round(self.rounding_precision, self.rounding_mode)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
