//! Configuration management for the security report pipeline.
//!
//! Configuration is layered: built-in defaults, an optional TOML file,
//! `REPORT_*` environment overrides and finally the credential variables
//! of the deployment environment.

use std::env;
use std::path::{Path, PathBuf};

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use log::debug;

use crate::models::Config;

const DEFAULT_CONFIG_FILE: &str = "config/default.toml";

/// Load configuration from `.env`, the config file and the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    dotenv::dotenv().ok();

    let config_file = match path {
        Some(path) => path.to_path_buf(),
        None => env::var("CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
    };
    debug!("Loading configuration from {}", config_file.display());

    let mut config = build_config(&config_file)?;
    config.apply_credentials_from_env();
    validate(&config)?;
    Ok(config)
}

/// Build configuration from an optional file plus `REPORT_*` overrides
pub fn build_config(config_file: &Path) -> Result<Config, ConfigError> {
    let config = ConfigBuilder::builder()
        .add_source(File::from(config_file).required(false))
        .add_source(
            Environment::with_prefix("REPORT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.supabase.page_size == 0 {
        return Err(ConfigError::Message("supabase.page_size must be positive".to_string()));
    }
    if config.supabase.max_attempts == 0 {
        return Err(ConfigError::Message("supabase.max_attempts must be positive".to_string()));
    }
    if config.analytics.precision > 6 {
        return Err(ConfigError::Message("analytics.precision must be at most 6".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, LatencyPolicy};
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = build_config(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.analytics.high_risk_threshold, 5);
        assert_eq!(config.supabase.page_size, 1000);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[analytics]
high_risk_threshold = 10
latency_policy = "legitimate_only"
default_category = "bot"

[analytics.action_mapping]
captcha = "bot"

[supabase]
table = "edge_logs"
"#
        )
        .unwrap();

        let config = build_config(file.path()).unwrap();
        assert_eq!(config.analytics.high_risk_threshold, 10);
        assert_eq!(config.analytics.latency_policy, LatencyPolicy::LegitimateOnly);
        assert_eq!(config.analytics.default_category, Category::Bot);
        assert_eq!(config.analytics.action_mapping.get("captcha"), Some(&Category::Bot));
        assert_eq!(config.analytics.top_countries, 5);
        assert_eq!(config.supabase.table, "edge_logs");
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = Config::default();
        config.supabase.page_size = 0;
        assert!(validate(&config).is_err());
    }
}
