//! Provisioner configuration
//!
//! Layered file + environment configuration. Values come from an
//! optional `opal.toml` next to the process, overridden by `OPAL_*`
//! environment variables (`OPAL_RETRY__MAX_ATTEMPTS=5`), with built-in
//! defaults underneath.

use config::{Config, ConfigError, Environment, File};
use opal_secrets::SecretPaths;
use opal_workflows::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Retry policy settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per operation, first try included
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,

    /// Backoff ceiling, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

/// Audit stream settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Buffered capacity of the broadcast channel
    pub capacity: usize,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            capacity: crate::audit::DEFAULT_AUDIT_CAPACITY,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive when RUST_LOG is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level provisioner configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    pub retry: RetrySettings,
    pub secrets: SecretPaths,
    pub audit: AuditSettings,
    pub logging: LoggingConfig,
}

impl ProvisionerConfig {
    /// Load from `opal.toml` (optional) layered under `OPAL_*`
    /// environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("opal").required(false))
            .add_source(Environment::with_prefix("OPAL").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Defaults with near-zero retry delays, for development and tests
    pub fn development() -> Self {
        Self {
            retry: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            ..Self::default()
        }
    }

    /// Retry policy derived from the settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Secret path layout
    pub fn secret_paths(&self) -> SecretPaths {
        self.secrets.clone()
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Safe to call once per
/// process; later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.secrets.cert_prefix, "certs");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_init_logging_accepts_json_output() {
        init_logging(&LoggingConfig {
            level: "warn".to_string(),
            json: true,
        });
        // A second call must be a no-op, not a panic
        init_logging(&LoggingConfig::default());
    }

    #[test]
    fn test_retry_policy_conversion() {
        let config = ProvisionerConfig::development();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1));
    }
}
