//! Per-side siren toggle timers using ESP-IDF's esp_timer API.
//!
//! Each side owns one periodic timer.  Its callback receives that side's
//! [`ToggleHandle`] as the user argument and flips the siren directly,
//! independent of the main loop.  On simulation targets the timer only
//! records its armed state.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they may take the critical section inside `ToggleHandle::on_timer`.

use crate::alarm::ToggleHandle;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

/// Errors creating a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    CreateFailed(i32),
}

impl core::fmt::Display for TimerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CreateFailed(rc) => write!(f, "esp_timer_create failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn siren_toggle_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked `Box<ToggleHandle>` installed in
    // `SideTimer::new`; it lives for the rest of the program.
    let handle = unsafe { &*(arg as *const ToggleHandle) };
    // SAFETY: RTC counter read, no preconditions.
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u64;
    let mut io = crate::adapters::hardware::HardwareIo::new();
    handle.on_timer(now_ms, &mut io);
}

/// One periodic esp_timer bound to a side's toggle handle.
pub struct SideTimer {
    #[cfg(target_os = "espidf")]
    handle: esp_timer_handle_t,
    #[cfg(not(target_os = "espidf"))]
    toggle: ToggleHandle,
    period_us: Option<u64>,
}

impl SideTimer {
    /// Create (but do not start) the timer.  The toggle handle is leaked
    /// into the callback argument; timers are created once at boot.
    #[cfg(target_os = "espidf")]
    pub fn new(toggle: ToggleHandle) -> Result<Self, TimerError> {
        let name: &'static [u8] = match toggle.side() {
            crate::topology::Side::A => b"siren_a\0",
            crate::topology::Side::B => b"siren_b\0",
        };
        let arg = Box::into_raw(Box::new(toggle)).cast::<core::ffi::c_void>();
        let args = esp_timer_create_args_t {
            callback: Some(siren_toggle_cb),
            arg,
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: name.as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: `args` is fully initialised and `handle` is a valid out-pointer.
        let ret = unsafe { esp_timer_create(&args, &mut handle) };
        if ret != ESP_OK as i32 {
            // SAFETY: the callback was never registered; reclaim the box.
            drop(unsafe { Box::from_raw(arg.cast::<ToggleHandle>()) });
            return Err(TimerError::CreateFailed(ret));
        }
        info!("hw_timer: {} timer created", core::str::from_utf8(&name[..name.len() - 1]).unwrap_or("siren"));
        Ok(Self {
            handle,
            period_us: None,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(toggle: ToggleHandle) -> Result<Self, TimerError> {
        Ok(Self {
            toggle,
            period_us: None,
        })
    }

    /// Start periodic firing, re-arming with the new period if running.
    #[cfg(target_os = "espidf")]
    pub fn start_periodic(&mut self, period_us: u64) {
        // SAFETY: `handle` came from a successful esp_timer_create.
        unsafe {
            if self.period_us.is_some() {
                esp_timer_stop(self.handle);
            }
            let ret = esp_timer_start_periodic(self.handle, period_us);
            if ret != ESP_OK as i32 {
                log::error!("hw_timer: start failed (rc={})", ret);
                self.period_us = None;
                return;
            }
        }
        self.period_us = Some(period_us);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start_periodic(&mut self, period_us: u64) {
        log::debug!("hw_timer(sim): {} armed @{} us", self.toggle.side(), period_us);
        self.period_us = Some(period_us);
    }

    #[cfg(target_os = "espidf")]
    pub fn stop(&mut self) {
        if self.period_us.take().is_some() {
            // SAFETY: valid handle; stopping an armed timer.
            unsafe { esp_timer_stop(self.handle) };
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn stop(&mut self) {
        self.period_us = None;
    }

    /// Current period, `None` when stopped.
    pub fn period_us(&self) -> Option<u64> {
        self.period_us
    }

    /// Fire the callback by hand (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fire(&self, now_ms: u64) -> bool {
        if self.period_us.is_none() {
            return false;
        }
        self.toggle
            .on_timer(now_ms, &mut crate::adapters::hardware::HardwareIo::new())
    }
}
