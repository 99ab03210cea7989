//! Driver configuration.
//!
//! Configuration can be built in code, parsed from JSON, or read from the
//! environment:
//!
//! - `AZUREFILE_MIN_QUOTA_GIB` / `AZUREFILE_MAX_QUOTA_GIB`: share quota range.
//!   Defaults to `[1, 5120]`.
//! - `AZUREFILE_MOUNT_MODE`: `host` (default) performs real mounts, `degraded`
//!   turns mount and unmount into no-ops for hosts without native support.
//! - `AZUREFILE_EXTENSIVE_MOUNT_CHECK`: set to `0` to stop treating corrupted
//!   mounts as cleanable.  Defaults to `1`.
//! - `AZUREFILE_BACKEND_TIMEOUT_SECS`: per-call backend timeout, `0` disables.
//!   Defaults to 60.
//! - `AZUREFILE_BACKEND_RETRIES`: attempts for transient backend failures.
//!   Defaults to 3.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quota::{DEFAULT_MAX_QUOTA_GIB, DEFAULT_MIN_QUOTA_GIB, QuotaPolicy};

const ENV_MIN_QUOTA: &str = "AZUREFILE_MIN_QUOTA_GIB";
const ENV_MAX_QUOTA: &str = "AZUREFILE_MAX_QUOTA_GIB";
const ENV_MOUNT_MODE: &str = "AZUREFILE_MOUNT_MODE";
const ENV_EXTENSIVE_CHECK: &str = "AZUREFILE_EXTENSIVE_MOUNT_CHECK";
const ENV_BACKEND_TIMEOUT: &str = "AZUREFILE_BACKEND_TIMEOUT_SECS";
const ENV_BACKEND_RETRIES: &str = "AZUREFILE_BACKEND_RETRIES";

const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid quota range [{min}, {max}]")]
    InvalidQuotaRange { min: i64, max: i64 },

    #[error(
        "mount mode {0:?} is not supported on this platform, set AZUREFILE_MOUNT_MODE=degraded explicitly"
    )]
    UnsupportedMountMode(MountMode),

    #[error("failed to parse driver config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which mount executor the driver is composed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    /// Real mounts through the host kernel.
    #[default]
    Host,
    /// Mount and unmount report success without touching the kernel;
    /// directory removal still happens.
    Degraded,
}

/// Bounded exponential backoff for transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.  `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub min_quota_gib: i64,
    pub max_quota_gib: i64,
    pub mount_mode: MountMode,
    /// Probe for corrupted mounts and force their cleanup.
    pub extensive_mount_check: bool,
    /// `None` means backend calls are only bounded by caller cancellation.
    pub backend_timeout_secs: Option<u64>,
    pub retry: RetryPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            min_quota_gib: DEFAULT_MIN_QUOTA_GIB,
            max_quota_gib: DEFAULT_MAX_QUOTA_GIB,
            mount_mode: MountMode::Host,
            extensive_mount_check: true,
            backend_timeout_secs: Some(DEFAULT_BACKEND_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl DriverConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.quota()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_MIN_QUOTA) {
            config.min_quota_gib = parse(ENV_MIN_QUOTA, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_QUOTA) {
            config.max_quota_gib = parse(ENV_MAX_QUOTA, &v)?;
        }
        if let Some(v) = lookup(ENV_MOUNT_MODE) {
            config.mount_mode = match v.trim().to_ascii_lowercase().as_str() {
                "host" => MountMode::Host,
                "degraded" => MountMode::Degraded,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_MOUNT_MODE,
                        value: v,
                        reason: "expected `host` or `degraded`".into(),
                    });
                }
            };
        }
        if let Some(v) = lookup(ENV_EXTENSIVE_CHECK) {
            config.extensive_mount_check = v.trim() != "0";
        }
        if let Some(v) = lookup(ENV_BACKEND_TIMEOUT) {
            let secs: u64 = parse(ENV_BACKEND_TIMEOUT, &v)?;
            config.backend_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = lookup(ENV_BACKEND_RETRIES) {
            config.retry.max_attempts = parse::<u32>(ENV_BACKEND_RETRIES, &v)?.max(1);
        }

        config.quota()?;
        Ok(config)
    }

    pub fn quota(&self) -> Result<QuotaPolicy, ConfigError> {
        QuotaPolicy::new(self.min_quota_gib, self.max_quota_gib).ok_or(
            ConfigError::InvalidQuotaRange {
                min: self.min_quota_gib,
                max: self.max_quota_gib,
            },
        )
    }

    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_secs.map(Duration::from_secs)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_owned(),
            reason: e.to_string(),
        })
}
