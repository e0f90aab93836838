//! Boot-relative millisecond clock.
//!
//! On target this reads the ESP-IDF high-resolution timer; on the host it
//! counts from the moment the clock was built.

use crate::app::ports::Clock;

pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    origin: std::time::Instant,
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            origin: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn micros(&self) -> u64 {
        // SAFETY: read-only access to the free-running esp_timer counter.
        let us = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
        us.max(0) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for Esp32TimeAdapter {
    fn now_ms(&self) -> u64 {
        self.micros() / 1_000
    }
}
