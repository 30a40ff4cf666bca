//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with one table per pipeline stage
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Conversion of sections into analysis parameter structs
//!
//! # Example
//!
//! ```no_run
//! use ncf_core::config::{ConfigManager, ConfigSection};
//! use ncf_core::models::NormalizationMethod;
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new("ncf.toml");
//! config.load_or_create().unwrap();
//!
//! // Read settings
//! println!("maxlag: {} s", config.settings().correlation.maxlag);
//!
//! // Modify a setting
//! config.settings_mut().correlation.method = NormalizationMethod::deconv();
//!
//! // Save just the correlation section atomically
//! config.update_section(ConfigSection::Correlation).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, CorrelationSettings, DenoiseSettings, DtwSettings, LoggingSettings, Settings,
    StackingSettings, StretchingSettings, WhiteningSettings,
};
