//! Runtime configuration of the keycard service.

use std::path::PathBuf;
use std::time::Duration;

use keycard_core::constants::{
    DEFAULT_BLINK_INTERVAL_MS, DEFAULT_DATA_DIR, DEFAULT_DEPARTURE_THRESHOLD,
    DEFAULT_FLASH_DURATION_MS, DEFAULT_NFC_DEVICE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_PRESENCE_BACKOFF_MS, DEFAULT_REDIS_ADDR, DEFAULT_REDIS_TIMEOUT_MS,
};
use keycard_hardware::IndicatorBackend;
use keycard_network::RedisClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// Where tag presence comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceBackend {
    /// `arrive <id>` / `depart` lines on standard input.
    #[default]
    Stdin,

    /// A PC/SC contactless reader, polled.
    Pcsc,
}

impl std::fmt::Display for PresenceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => write!(f, "stdin"),
            Self::Pcsc => write!(f, "pcsc"),
        }
    }
}

/// Keycard service configuration.
///
/// Durations are kept in milliseconds so the struct dumps cleanly as JSON.
///
/// # Examples
///
/// ```
/// use keycard_service::config::{PresenceBackend, ServiceConfig};
///
/// let config = ServiceConfig::new("/tmp/keycard")
///     .presence(PresenceBackend::Pcsc)
///     .departure_threshold(3);
///
/// assert_eq!(config.flash_duration().as_millis(), 500);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// NFC controller device node, reported in the status log
    pub device: PathBuf,

    /// Directory holding the credential files
    pub data_dir: PathBuf,

    /// Redis `host:port`
    pub redis_addr: String,

    /// Timeout for each Redis I/O step
    pub redis_timeout_ms: u64,

    /// RGB indicator backend
    pub indicator: IndicatorBackend,

    /// Tag presence backend
    pub presence: PresenceBackend,

    /// Blink period while waiting for a master card
    pub blink_interval_ms: u64,

    /// How long grant/deny flashes stay lit
    pub flash_duration_ms: u64,

    /// Sleep between polls of a polled reader
    pub poll_interval_ms: u64,

    /// Pause after a presence source error
    pub presence_backoff_ms: u64,

    /// Consecutive empty polls before a card is considered gone
    pub departure_threshold: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_NFC_DEVICE),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            redis_addr: DEFAULT_REDIS_ADDR.to_string(),
            redis_timeout_ms: DEFAULT_REDIS_TIMEOUT_MS,
            indicator: IndicatorBackend::default(),
            presence: PresenceBackend::default(),
            blink_interval_ms: DEFAULT_BLINK_INTERVAL_MS,
            flash_duration_ms: DEFAULT_FLASH_DURATION_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            presence_backoff_ms: DEFAULT_PRESENCE_BACKOFF_MS,
            departure_threshold: DEFAULT_DEPARTURE_THRESHOLD,
        }
    }
}

impl ServiceConfig {
    /// Defaults with the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the NFC device path
    pub fn device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    /// Set the Redis address
    pub fn redis_addr(mut self, addr: impl Into<String>) -> Self {
        self.redis_addr = addr.into();
        self
    }

    /// Set the indicator backend
    pub fn indicator(mut self, backend: IndicatorBackend) -> Self {
        self.indicator = backend;
        self
    }

    /// Set the presence backend
    pub fn presence(mut self, backend: PresenceBackend) -> Self {
        self.presence = backend;
        self
    }

    /// Set the reader poll interval in milliseconds
    pub fn poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    /// Set the departure threshold
    pub fn departure_threshold(mut self, polls: u32) -> Self {
        self.departure_threshold = polls;
        self
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn presence_backoff(&self) -> Duration {
        Duration::from_millis(self.presence_backoff_ms)
    }

    /// Connection settings for the notification sink.
    pub fn redis(&self) -> RedisClientConfig {
        RedisClientConfig {
            addr: self.redis_addr.clone(),
            timeout: Duration::from_millis(self.redis_timeout_ms),
        }
    }

    /// Reject values the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] naming the first offending field.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.redis_addr.trim().is_empty() {
            return Err(ServiceError::config("redis_addr must not be empty"));
        }
        if self.redis_timeout_ms == 0 {
            return Err(ServiceError::config("redis_timeout_ms must be positive"));
        }
        if self.blink_interval_ms == 0 {
            return Err(ServiceError::config("blink_interval_ms must be positive"));
        }
        if self.departure_threshold == 0 {
            return Err(ServiceError::config("departure_threshold must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.device, PathBuf::from("/dev/pn5xx_i2c2"));
        assert_eq!(config.data_dir, PathBuf::from("/data/keycard"));
        assert_eq!(config.redis_addr, "localhost:6379");
        assert_eq!(config.blink_interval().as_millis(), 500);
        assert_eq!(config.flash_duration().as_millis(), 500);
        assert_eq!(config.poll_interval().as_millis(), 100);
        assert_eq!(config.departure_threshold, 1);
        assert_eq!(config.indicator, IndicatorBackend::lp5662_default());
        assert_eq!(config.presence, PresenceBackend::Stdin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_settings() {
        let config = ServiceConfig::new("/tmp/kc").redis_addr("10.0.0.2:6380");
        let redis = config.redis();
        assert_eq!(redis.addr, "10.0.0.2:6380");
        assert_eq!(redis.timeout, Duration::from_millis(1000));
    }

    #[rstest]
    #[case::empty_redis(ServiceConfig::default().redis_addr(" "), "redis_addr")]
    #[case::zero_threshold(ServiceConfig::default().departure_threshold(0), "departure_threshold")]
    #[case::zero_blink(ServiceConfig { blink_interval_ms: 0, ..Default::default() }, "blink_interval_ms")]
    fn test_validate_rejects(#[case] config: ServiceConfig, #[case] field: &str) {
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(field), "{err}");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{
                "data_dir": "/var/lib/keycard",
                "indicator": { "kind": "script", "script": "/usr/bin/greenled.sh" },
                "presence": "pcsc"
            }"#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/keycard"));
        assert_eq!(config.indicator, IndicatorBackend::script_default());
        assert_eq!(config.presence, PresenceBackend::Pcsc);
        assert_eq!(config.flash_duration_ms, 500);
    }
}
