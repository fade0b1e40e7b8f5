//! Configuration management for the spotter gateway
//!
//! Everything is environment-driven with sensible defaults; there is no
//! config file. All variables use the `SPOTTER_` prefix.

use std::time::Duration;

use crate::scan::ScanConfig;

/// Default relay listen port
pub const DEFAULT_PORT: u16 = 18790;

/// Default minimum gap between delivered notifications per session
pub const DEFAULT_NOTIFY_COOLDOWN_MS: u64 = 1000;

/// Default request body size limit for the relay HTTP surface
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Default detection service base URL
pub const DEFAULT_DETECTOR_URL: &str = "http://127.0.0.1:8000";

/// Default per-request detection timeout
pub const DEFAULT_DETECT_TIMEOUT_MS: u64 = 8000;

/// Spotter gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay server configuration
    pub relay: RelayConfig,

    /// Detection service client configuration
    pub detector: DetectorConfig,

    /// Defaults for new scan sessions
    pub scan: ScanConfig,
}

impl Config {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            relay: RelayConfig::from_env(),
            detector: DetectorConfig::from_env(),
            scan: scan_config_from_env(),
        }
    }
}

/// Session relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Port to listen on
    pub port: u16,

    /// Minimum gap between delivered notifications per session
    pub notify_cooldown: Duration,

    /// Maximum accepted request body size in bytes
    pub body_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            notify_cooldown: Duration::from_millis(DEFAULT_NOTIFY_COOLDOWN_MS),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl RelayConfig {
    /// Load relay configuration from environment variables
    ///
    /// Reads from:
    /// - `SPOTTER_PORT`: listen port (default: 18790)
    /// - `SPOTTER_NOTIFY_COOLDOWN_MS`: per-session notify debounce window
    /// - `SPOTTER_BODY_LIMIT`: request body size limit in bytes
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env_parse("SPOTTER_PORT").unwrap_or(defaults.port),
            notify_cooldown: env_parse("SPOTTER_NOTIFY_COOLDOWN_MS")
                .map_or(defaults.notify_cooldown, Duration::from_millis),
            body_limit: env_parse("SPOTTER_BODY_LIMIT").unwrap_or(defaults.body_limit),
        }
    }
}

/// Detection service client configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Base URL of the detection service
    pub base_url: String,

    /// Bounded per-request timeout
    pub request_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DETECTOR_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_DETECT_TIMEOUT_MS),
        }
    }
}

impl DetectorConfig {
    /// Load detector configuration from environment variables
    ///
    /// Reads from:
    /// - `SPOTTER_DETECTOR_URL`: detection service base URL
    /// - `SPOTTER_DETECT_TIMEOUT_MS`: per-request timeout
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_url: std::env::var("SPOTTER_DETECTOR_URL").unwrap_or(defaults.base_url),
            request_timeout: env_parse("SPOTTER_DETECT_TIMEOUT_MS")
                .map_or(defaults.request_timeout, Duration::from_millis),
        }
    }
}

/// Load scan session defaults from environment variables
///
/// Reads from:
/// - `SPOTTER_THRESHOLD`: detection confidence threshold
/// - `SPOTTER_SCAN_INTERVAL_SECS`: seconds between captures
/// - `SPOTTER_BEEP`: enable the found tone (default: on)
/// - `SPOTTER_DEBUG_CAPTURE`: keep a debug history of detection cycles
#[must_use]
pub fn scan_config_from_env() -> ScanConfig {
    let defaults = ScanConfig::default();

    let threshold = env_parse::<f32>("SPOTTER_THRESHOLD").unwrap_or(defaults.threshold);
    let interval_secs =
        env_parse::<f64>("SPOTTER_SCAN_INTERVAL_SECS").filter(|s| *s > 0.0);

    ScanConfig {
        threshold: threshold.clamp(0.0, 1.0),
        scan_interval: interval_secs.map_or(defaults.scan_interval, Duration::from_secs_f64),
        beep_enabled: env_flag("SPOTTER_BEEP").unwrap_or(defaults.beep_enabled),
        debug_enabled: env_flag("SPOTTER_DEBUG_CAPTURE").unwrap_or(defaults.debug_enabled),
    }
}

/// Parse an environment variable, ignoring unset or malformed values
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Parse a boolean flag ("1"/"true"/"0"/"false")
fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
