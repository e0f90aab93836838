//! Status snapshot and runtime diagnostics.
//!
//! [`StatusReport`] is what the admin front end shows: overall status,
//! every circuit's latch, both sirens, uptime and the last error.  It
//! serialises to JSON for transport and renders as text for the console.

use core::fmt;

use serde::Serialize;

use crate::alarm::AlarmPhase;
use crate::app::events::SystemStatus;
use crate::wire_monitor::{CIRCUIT_COUNT, Circuit, CircuitStatus};

/// Point-in-time view of the whole system.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: SystemStatus,
    pub circuits: [(Circuit, CircuitStatus); CIRCUIT_COUNT],
    /// Indexed by `Side::index()`.
    pub alarms: [AlarmPhase; 2],
    pub uptime_ms: u64,
    pub last_alarm_age_ms: Option<u64>,
    pub last_error: Option<String>,
    pub enabled_sensors: u32,
    pub notifiable_recipients: usize,
    pub queue_len: usize,
}

impl StatusReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// `1h 02m 03s` style duration.
fn fmt_duration(f: &mut fmt::Formatter<'_>, ms: u64) -> fmt::Result {
    let secs = ms / 1000;
    write!(f, "{}h {:02}m {:02}s", secs / 3600, (secs / 60) % 60, secs % 60)
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "System status: {}", self.status)?;
        for (circuit, st) in &self.circuits {
            writeln!(f, "  {circuit}: {}", if st.cut { "Cut" } else { "OK" })?;
        }
        for (label, phase) in ["Side A alarm", "Side B alarm"].iter().zip(self.alarms) {
            let state = if phase == AlarmPhase::Idle { "Inactive" } else { "Active" };
            writeln!(f, "  {label}: {state}")?;
        }
        write!(f, "Uptime: ")?;
        fmt_duration(f, self.uptime_ms)?;
        writeln!(f)?;
        match self.last_alarm_age_ms {
            Some(age) => {
                write!(f, "Last alarm: ")?;
                fmt_duration(f, age)?;
                writeln!(f, " ago")?;
            }
            None => writeln!(f, "Last alarm: never")?,
        }
        writeln!(
            f,
            "Sensors enabled: {} | recipients: {} | queued: {}",
            self.enabled_sensors, self.notifiable_recipients, self.queue_len
        )?;
        write!(f, "Last error: {}", self.last_error.as_deref().unwrap_or("none"))
    }
}

// ───────────────────────────────────────────────────────────────
// Heap
// ───────────────────────────────────────────────────────────────

/// Free heap in bytes.
#[cfg(target_os = "espidf")]
pub fn free_heap() -> u32 {
    // SAFETY: plain allocator statistics read.
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

#[cfg(not(target_os = "espidf"))]
pub fn free_heap() -> u32 {
    307_200
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Log the panic reason before the default handler resets the chip.
///
/// Must be called once during init, after the logger is installed.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => log::error!("PANIC at {}:{}: {}", loc.file(), loc.line(), reason),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
