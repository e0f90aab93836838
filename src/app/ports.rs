//! Seams between the alarm core and the board.
//!
//! [`AppService`](super::service::AppService) is generic over every trait
//! here; the `adapters` module supplies the ESP32 implementations and the
//! integration tests supply mocks.  Nothing behind these traits knows about
//! apartments, sides or alarm policy.

use embedded_hal::digital::PinState;

use crate::config::AlarmConfig;
use crate::topology::Side;
use crate::wire_monitor::Circuit;

// ───────────────────────────────────────────────────────────────
// Lines
// ───────────────────────────────────────────────────────────────

/// A logical signal line.  Adapters map these to physical pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    /// Shared vibration line, by shared-line index (0–11).
    Vibration(u8),
    /// Tamper wire circuit input.
    Circuit(Circuit),
    /// Sensor supply switch for one side.
    SidePower(Side),
    /// Siren relay for one side.
    Siren(Side),
}

/// Raw digital levels.  Polarity (active LOW relays, HIGH = cut) is
/// domain knowledge and stays out of the adapters.
pub trait DigitalIo {
    fn read(&mut self, line: Line) -> PinState;

    fn write(&mut self, line: Line, level: PinState);
}

// ───────────────────────────────────────────────────────────────
// Siren timers
// ───────────────────────────────────────────────────────────────

/// One periodic timer per side.  While running it invokes that side's
/// [`ToggleHandle`](crate::alarm::ToggleHandle) every `interval_ms`.
pub trait SirenTimer {
    /// Start, or re-arm with a new period if already running.
    fn start(&mut self, side: Side, interval_ms: u32);

    /// Stop.  No-op when not running.
    fn stop(&mut self, side: Side);
}

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Bot delivery
// ───────────────────────────────────────────────────────────────

/// One attempt at posting `text` to `chat_id`.  `Ok` carries the
/// provider's message id, `Err` the raw response body for classification.
/// The main loop blocks on this, so implementations bound their own wait.
pub trait MessageTransport {
    fn send(&mut self, token: &str, chat_id: i64, text: &str) -> Result<i64, String>;
}

// ───────────────────────────────────────────────────────────────
// Events
// ───────────────────────────────────────────────────────────────

/// Receives every [`AppEvent`](super::events::AppEvent) the service raises.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Persistence
// ───────────────────────────────────────────────────────────────

/// Tunables that survive a reboot.  `save` refuses anything
/// [`AlarmConfig::validate`] rejects; out-of-range values are never clamped.
pub trait ConfigPort {
    /// Falls back to [`AlarmConfig::default()`] when nothing usable is stored.
    fn load(&self) -> Result<AlarmConfig, ConfigError>;

    fn save(&self, config: &AlarmConfig) -> Result<(), ConfigError>;
}

/// Namespaced blob store holding the sensor enable bitmap and the
/// per-apartment recipients.  A write either lands completely or not at all.
pub trait StoragePort {
    /// Copies the blob into `buf` and returns its length.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Removing an absent key succeeds.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

#[derive(Debug)]
pub enum ConfigError {
    /// Names the offending field.
    ValidationFailed(&'static str),
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
    /// Blob present but of the wrong shape.
    Corrupted,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(field) => write!(f, "rejected config: {}", field),
            Self::IoError => f.write_str("config storage unavailable"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::NotFound => "no such key",
            Self::Full => "partition full",
            Self::IoError => "flash access failed",
            Self::Corrupted => "unreadable blob",
        })
    }
}
