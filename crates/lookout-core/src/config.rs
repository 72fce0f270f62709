//! Configuration management for Lookout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::QueryKind;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration.
///
/// This is loaded from `~/.config/lookout/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookoutConfig {
    /// Dispatcher concurrency and timeouts
    pub dispatch: DispatchConfig,
    /// Per-service request pacing
    pub rate_limit: RateLimitConfig,
    /// Retry and backoff behavior
    pub retry: RetryConfig,
    /// Result cache sizing and TTLs
    pub cache: CacheConfig,
    /// HTTP fetching for platform probes
    pub http: HttpConfig,
}

impl LookoutConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `LOOKOUT_MAX_IN_FLIGHT`: Override the concurrency ceiling
    /// - `LOOKOUT_CALL_TIMEOUT_SECS`: Override the per-call timeout
    /// - `LOOKOUT_DEFAULT_INTERVAL_MS`: Override the default rate-limit interval
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(max) = lookup("LOOKOUT_MAX_IN_FLIGHT").and_then(|v| v.parse().ok()) {
            self.dispatch.max_in_flight = max;
            tracing::debug!("Override dispatch.max_in_flight from env: {}", max);
        }

        if let Some(secs) = lookup("LOOKOUT_CALL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.dispatch.call_timeout_secs = secs;
            tracing::debug!("Override dispatch.call_timeout_secs from env: {}", secs);
        }

        if let Some(ms) = lookup("LOOKOUT_DEFAULT_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.rate_limit.default_interval_ms = ms;
            tracing::debug!("Override rate_limit.default_interval_ms from env: {}", ms);
        }
    }

    /// Save configuration to the default path.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check values that would make the dispatcher unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        let checks = [
            (self.dispatch.max_in_flight == 0, "dispatch.max_in_flight"),
            (self.dispatch.call_timeout_secs == 0, "dispatch.call_timeout_secs"),
            (self.retry.max_attempts == 0, "retry.max_attempts"),
            (self.retry.block_multiplier == 0, "retry.block_multiplier"),
            (self.cache.capacity == 0, "cache.capacity"),
        ];

        if let Some((_, field)) = checks.iter().find(|(invalid, _)| *invalid) {
            return Err(ConfigError::InvalidValue {
                field: (*field).to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay_ms".to_string(),
                reason: "must not be smaller than retry.base_delay_ms".to_string(),
            });
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/lookout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "lookout", "lookout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Dispatcher concurrency and timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum adapter invocations in flight per call
    pub max_in_flight: usize,
    /// Timeout for one adapter invocation, including its retries
    pub call_timeout_secs: u64,
    /// Default batch deadline when the caller supplies none (unset = no deadline)
    pub deadline_secs: Option<u64>,
}

impl DispatchConfig {
    /// Per-call timeout as a duration.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Default batch deadline as a duration.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 10,
            call_timeout_secs: 30,
            deadline_secs: None,
        }
    }
}

/// Per-service request pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum interval between requests to an unconfigured service
    pub default_interval_ms: u64,
    /// Minimum interval per service ID, overriding the default
    pub services: BTreeMap<String, u64>,
}

impl RateLimitConfig {
    /// Default interval as a duration.
    #[must_use]
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 1000,
            services: BTreeMap::new(),
        }
    }
}

/// Retry and backoff behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per invocation, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff
    pub max_delay_ms: u64,
    /// Backoff multiplier applied after a service block
    pub block_multiplier: u32,
    /// Upper bound of the random jitter added to each backoff
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            block_multiplier: 3,
            jitter_ms: 250,
        }
    }
}

/// Result cache sizing and TTLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached records (least recently used are evicted)
    pub capacity: usize,
    /// TTL for username lookups
    pub username_ttl_secs: u64,
    /// TTL for email lookups
    pub email_ttl_secs: u64,
    /// TTL for image analysis
    pub image_url_ttl_secs: u64,
    /// TTL for short-link expansion
    pub short_link_ttl_secs: u64,
    /// TTL for other URL lookups
    pub url_ttl_secs: u64,
}

impl CacheConfig {
    /// TTL for records of the given query kind.
    #[must_use]
    pub fn ttl_for(&self, kind: QueryKind) -> Duration {
        let secs = match kind {
            QueryKind::Username => self.username_ttl_secs,
            QueryKind::Email => self.email_ttl_secs,
            QueryKind::ImageUrl => self.image_url_ttl_secs,
            QueryKind::ShortLink => self.short_link_ttl_secs,
            QueryKind::Url => self.url_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            username_ttl_secs: 3600,
            email_ttl_secs: 3600,
            image_url_ttl_secs: 300,
            short_link_ttl_secs: 86_400,
            url_ttl_secs: 600,
        }
    }
}

/// HTTP fetching for platform probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent string
    pub user_agent: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Directory of platform definition TOML files (unset = built-in set)
    pub definitions_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Lookout/0.1.0 (+https://github.com/lookout-osint/lookout)".to_string(),
            timeout_secs: 30,
            definitions_dir: None,
        }
    }
}
