//! System configuration parameters
//!
//! All tunable timings for the detection and alerting pipeline.
//! Values are persisted to NVS through [`ConfigPort`](crate::app::ports::ConfigPort)
//! and may be changed at runtime from the admin front end.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Allowed alarm duration range (ms).
pub const ALARM_DURATION_RANGE_MS: core::ops::RangeInclusive<u32> = 1_000..=600_000;
/// Allowed siren toggle interval range (ms).
pub const ALARM_INTERVAL_RANGE_MS: core::ops::RangeInclusive<u32> = 50..=10_000;
/// Allowed power settling range (ms).
pub const SETTLING_RANGE_MS: core::ops::RangeInclusive<u32> = 0..=2_000;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmConfig {
    // --- Siren ---
    /// How long a siren keeps sounding after activation
    pub alarm_duration_ms: u32,
    /// On/off toggle period once the siren is sounding
    pub alarm_interval_ms: u32,

    // --- Scanner ---
    /// Quiet time after switching side power before samples are trusted
    pub settling_time_ms: u32,
    /// Sampling window per side
    pub scan_window_ms: u32,

    // --- Notifications ---
    /// Minimum spacing between two send attempts
    pub notify_min_interval_ms: u32,
    /// Exponential backoff base
    pub notify_retry_base_ms: u32,
    /// Attempts before an entry is dropped
    pub notify_max_retries: u8,
    /// Delay used when a rate-limit response omits `retry_after`
    pub default_retry_after_secs: u32,

    // --- Identity ---
    /// mDNS hostname announced in the online message
    pub device_hostname: heapless::String<32>,
    pub building_number: u8,

    // --- Timing ---
    /// Main loop period
    pub loop_interval_ms: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        let mut device_hostname = heapless::String::new();
        let _ = device_hostname.push_str("watermeter");
        Self {
            // Siren
            alarm_duration_ms: 20_000,
            alarm_interval_ms: 1_000,

            // Scanner
            settling_time_ms: 100,
            scan_window_ms: 500,

            // Notifications
            notify_min_interval_ms: 500,
            notify_retry_base_ms: 100,
            notify_max_retries: 3,
            default_retry_after_secs: 60,

            // Identity
            device_hostname,
            building_number: 1,

            // Timing
            loop_interval_ms: 10,
        }
    }
}

impl AlarmConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !ALARM_DURATION_RANGE_MS.contains(&self.alarm_duration_ms) {
            return Err(ConfigError::ValidationFailed(
                "alarm_duration_ms must be 1 s..=10 min",
            ));
        }
        if !ALARM_INTERVAL_RANGE_MS.contains(&self.alarm_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "alarm_interval_ms must be 50..=10000",
            ));
        }
        if self.alarm_interval_ms >= self.alarm_duration_ms {
            return Err(ConfigError::ValidationFailed(
                "alarm_interval_ms must be shorter than alarm_duration_ms",
            ));
        }
        if !SETTLING_RANGE_MS.contains(&self.settling_time_ms) {
            return Err(ConfigError::ValidationFailed(
                "settling_time_ms must be 0..=2000",
            ));
        }
        if self.scan_window_ms == 0 {
            return Err(ConfigError::ValidationFailed("scan_window_ms must be > 0"));
        }
        if self.notify_max_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "notify_max_retries must be > 0",
            ));
        }
        if self.notify_retry_base_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "notify_retry_base_ms must be > 0",
            ));
        }
        if self.loop_interval_ms == 0 || self.loop_interval_ms > self.scan_window_ms {
            return Err(ConfigError::ValidationFailed(
                "loop_interval_ms must be 1..=scan_window_ms",
            ));
        }
        if self.device_hostname.is_empty() {
            return Err(ConfigError::ValidationFailed("device_hostname is empty"));
        }
        Ok(())
    }
}
