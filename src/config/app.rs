//! Main application configuration
//!
//! This module defines the primary configuration structures for the waitline
//! queueing service, including environment variable loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub http: HttpSettings,
    pub queueing: QueueSettings,
    pub storage: StorageSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
    /// Port for the API server
    pub port: u16,
    /// Capacity of the broadcast channel feeding event subscribers
    pub event_channel_capacity: usize,
}

/// Queue assignment and estimation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Number of most-recent history samples averaged per counter
    pub sample_window: usize,
    /// Minimum samples required before the rolling average is trusted
    pub min_samples: usize,
    /// Per-customer estimate used below the sample threshold, in seconds
    pub default_wait_seconds: u64,
    /// TTL for cached per-counter estimates, in seconds
    pub estimate_cache_ttl_seconds: u64,
    /// TTL for cached per-counter queue-length aggregates, in seconds
    pub queue_length_cache_ttl_seconds: u64,
    /// TTL for cached company lookups, in seconds
    pub company_cache_ttl_seconds: u64,
    /// Delays before a no-show customer is removed from the queue
    pub max_delays: u32,
    /// Upper bound on counters created with a company
    pub max_counters_per_company: u32,
}

/// Storage access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Maximum attempts for a store call that fails transiently
    pub max_retry_attempts: u32,
    /// Base delay between retry attempts in milliseconds (doubles per attempt)
    pub retry_delay_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "waitline".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            event_channel_capacity: 256,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            sample_window: 5,
            min_samples: 5,
            default_wait_seconds: 180, // 3 minutes
            estimate_cache_ttl_seconds: 60,
            queue_length_cache_ttl_seconds: 10,
            company_cache_ttl_seconds: 300,
            max_delays: 3,
            max_counters_per_company: 50,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_delay_ms: 100,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // HTTP settings
        if let Ok(host) = env::var("HTTP_HOST") {
            config.http.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            config.http.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid PORT value: {}", port))?;
        }
        if let Ok(capacity) = env::var("EVENT_CHANNEL_CAPACITY") {
            config.http.event_channel_capacity = capacity
                .parse()
                .map_err(|_| anyhow!("Invalid EVENT_CHANNEL_CAPACITY value: {}", capacity))?;
        }

        // Queueing settings
        if let Ok(window) = env::var("SAMPLE_WINDOW") {
            config.queueing.sample_window = window
                .parse()
                .map_err(|_| anyhow!("Invalid SAMPLE_WINDOW value: {}", window))?;
        }
        if let Ok(min) = env::var("MIN_SAMPLES") {
            config.queueing.min_samples = min
                .parse()
                .map_err(|_| anyhow!("Invalid MIN_SAMPLES value: {}", min))?;
        }
        if let Ok(default_wait) = env::var("DEFAULT_WAIT_SECONDS") {
            config.queueing.default_wait_seconds = default_wait
                .parse()
                .map_err(|_| anyhow!("Invalid DEFAULT_WAIT_SECONDS value: {}", default_wait))?;
        }
        if let Ok(max_delays) = env::var("MAX_DELAYS") {
            config.queueing.max_delays = max_delays
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_DELAYS value: {}", max_delays))?;
        }

        // Storage settings
        if let Ok(retries) = env::var("STORE_MAX_RETRY_ATTEMPTS") {
            config.storage.max_retry_attempts = retries
                .parse()
                .map_err(|_| anyhow!("Invalid STORE_MAX_RETRY_ATTEMPTS value: {}", retries))?;
        }
        if let Ok(delay) = env::var("STORE_RETRY_DELAY_MS") {
            config.storage.retry_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid STORE_RETRY_DELAY_MS value: {}", delay))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        let config: AppConfig = toml::from_str(&raw).with_context(|| {
            format!("Failed to parse config file: {}", path.as_ref().display())
        })?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get store retry base delay as Duration
    pub fn store_retry_delay(&self) -> Duration {
        Duration::from_millis(self.storage.retry_delay_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.http.port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.http.event_channel_capacity == 0 {
        return Err(anyhow!("Event channel capacity must be greater than 0"));
    }

    if config.queueing.sample_window == 0 {
        return Err(anyhow!("Sample window must be greater than 0"));
    }
    if config.queueing.min_samples == 0 {
        return Err(anyhow!("Minimum sample count must be greater than 0"));
    }
    if config.queueing.min_samples < config.queueing.sample_window {
        // A threshold below the window would average partial windows
        return Err(anyhow!(
            "min_samples ({}) must not be below sample_window ({})",
            config.queueing.min_samples,
            config.queueing.sample_window
        ));
    }
    if config.queueing.default_wait_seconds == 0 {
        return Err(anyhow!("Default wait seconds must be greater than 0"));
    }
    if config.queueing.max_counters_per_company == 0 {
        return Err(anyhow!("Max counters per company must be greater than 0"));
    }

    if config.storage.max_retry_attempts == 0 {
        return Err(anyhow!("Store retry attempts must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.queueing.sample_window, 5);
        assert_eq!(config.queueing.min_samples, 5);
        assert_eq!(config.queueing.default_wait_seconds, 180);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.queueing.min_samples = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.queueing.sample_window = 10;
        config.queueing.min_samples = 5;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.http.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_from_toml_snippet() {
        let raw = r#"
            [service]
            name = "waitline-test"
            log_level = "debug"

            [queueing]
            default_wait_seconds = 120
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.service.name, "waitline-test");
        assert_eq!(config.queueing.default_wait_seconds, 120);
        // Untouched sections keep their defaults
        assert_eq!(config.http.port, 8080);
    }
}
