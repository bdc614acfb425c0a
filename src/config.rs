//! Configuration management for the auction coordinator
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub registry: RegistryConfig,
    pub resolver: ResolverConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub host: String,
    pub port: u16,
    pub auction_ttl_secs: u64,
    pub validation: ValidationMode,
    /// 0 disables compaction
    pub compaction_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            auction_ttl_secs: 24 * 60 * 60,
            validation: ValidationMode::Strict,
            compaction_interval_secs: 0,
        }
    }
}

/// How much the registry checks a broadcast payload before storing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Reject unparsable or inconsistent auctions and duplicate ids
    Strict,
    /// Store anything, duplicates included
    Permissive,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub startup_max_retries: u32,
    pub startup_retry_delay_ms: u64,
    pub bid_threshold_percent: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:4000".to_string(),
            poll_interval_ms: 5000,
            request_timeout_ms: 5000,
            startup_max_retries: 10,
            startup_retry_delay_ms: 2000,
            bid_threshold_percent: 80,
        }
    }
}

impl ResolverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Settings {
    /// Load settings from an explicit path, `AUCTION_CONFIG`, or the default file.
    ///
    /// A missing default file falls back to built-in defaults; a missing
    /// explicitly requested file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("AUCTION_CONFIG").ok().map(PathBuf::from));

        let mut settings = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                tracing::warn!("No config file found, using built-in defaults");
                Settings::default()
            }
        };

        if let Ok(port) = env::var("PORT") {
            settings.registry.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value: {:?}", port))?;
        }

        settings.validate()?;

        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        toml::from_str(&config_str).with_context(|| "Failed to parse configuration")
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.registry.auction_ttl_secs == 0 {
            anyhow::bail!("registry.auction_ttl_secs must be positive");
        }

        let resolver = &self.resolver;
        if resolver.poll_interval_ms == 0 {
            anyhow::bail!("resolver.poll_interval_ms must be positive");
        }
        if resolver.request_timeout_ms == 0 {
            anyhow::bail!("resolver.request_timeout_ms must be positive");
        }
        if resolver.startup_max_retries == 0 {
            anyhow::bail!("resolver.startup_max_retries must be at least 1");
        }
        if resolver.bid_threshold_percent > 100 {
            anyhow::bail!(
                "resolver.bid_threshold_percent must be at most 100, got {}",
                resolver.bid_threshold_percent
            );
        }
        if !(resolver.server_url.starts_with("http://")
            || resolver.server_url.starts_with("https://"))
        {
            anyhow::bail!(
                "resolver.server_url must be an http(s) URL, got {:?}",
                resolver.server_url
            );
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");
    }

    ENV_VAR
        .replace_all(input, |cap: &regex::Captures| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("AUCTION_TEST_HOST", "registry.internal");
        let input = "server_url = \"http://${AUCTION_TEST_HOST}:4000\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "server_url = \"http://registry.internal:4000\"");
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.registry.port, 4000);
        assert_eq!(settings.registry.auction_ttl_secs, 86_400);
        assert_eq!(settings.registry.validation, ValidationMode::Strict);
        assert_eq!(settings.resolver.server_url, "http://localhost:4000");
        assert_eq!(settings.resolver.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.resolver.startup_max_retries, 10);
        assert_eq!(settings.resolver.startup_retry_delay(), Duration::from_secs(2));
        assert_eq!(settings.resolver.bid_threshold_percent, 80);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[registry]\nvalidation = \"permissive\"\n\n[resolver]\npoll_interval_ms = 250"
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.registry.validation, ValidationMode::Permissive);
        assert_eq!(settings.registry.port, 4000);
        assert_eq!(settings.resolver.poll_interval_ms, 250);
        assert_eq!(settings.resolver.request_timeout_ms, 5000);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.resolver.bid_threshold_percent = 120;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.resolver.server_url = "localhost:4000".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.resolver.startup_max_retries = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/auction.toml"))).is_err());
    }
}
