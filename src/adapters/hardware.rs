//! Real peripherals behind the `DigitalIo` and `SirenTimer` ports.
//!
//! [`HardwareIo`] maps logical [`Line`]s onto the pin map and implements
//! [`DigitalIo`]; [`EspSirenTimer`] owns both side timers and implements
//! [`SirenTimer`].  These are the only types in the system that touch
//! actual hardware.  On non-espidf targets, the underlying drivers use
//! cfg-gated simulation stubs.

use embedded_hal::digital::PinState;

use crate::alarm::ToggleHandle;
use crate::app::ports::{DigitalIo, Line, SirenTimer};
use crate::drivers::hw_init::{self, CIRCUIT_GPIOS};
use crate::drivers::hw_timer::{SideTimer, TimerError};
use crate::pins;
use crate::topology::Side;

/// GPIO number behind a logical line.
pub fn gpio_for(line: Line) -> i32 {
    match line {
        Line::Vibration(idx) => pins::VIBRATION_GPIOS[usize::from(idx) % pins::VIBRATION_GPIOS.len()],
        Line::Circuit(c) => CIRCUIT_GPIOS[c.index()],
        Line::SidePower(Side::A) => pins::VCC_A_GPIO,
        Line::SidePower(Side::B) => pins::VCC_B_GPIO,
        Line::Siren(Side::A) => pins::SIREN_A_GPIO,
        Line::Siren(Side::B) => pins::SIREN_B_GPIO,
    }
}

/// Stateless GPIO bridge.  Cheap to construct, so the timer callback
/// makes its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareIo;

impl HardwareIo {
    pub fn new() -> Self {
        Self
    }
}

impl DigitalIo for HardwareIo {
    fn read(&mut self, line: Line) -> PinState {
        PinState::from(hw_init::gpio_read(gpio_for(line)))
    }

    fn write(&mut self, line: Line, level: PinState) {
        hw_init::gpio_write(gpio_for(line), level == PinState::High);
    }
}

/// Both sides' esp_timers behind the [`SirenTimer`] port.
pub struct EspSirenTimer {
    timers: [SideTimer; 2],
}

impl EspSirenTimer {
    /// Create both timers, each bound to its side's toggle handle.
    pub fn new(a: ToggleHandle, b: ToggleHandle) -> Result<Self, TimerError> {
        Ok(Self {
            timers: [SideTimer::new(a)?, SideTimer::new(b)?],
        })
    }

    pub fn is_running(&self, side: Side) -> bool {
        self.timers[side.index()].period_us().is_some()
    }

    /// Fire a side's callback by hand (host builds only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fire(&self, side: Side, now_ms: u64) -> bool {
        self.timers[side.index()].sim_fire(now_ms)
    }
}

impl SirenTimer for EspSirenTimer {
    fn start(&mut self, side: Side, interval_ms: u32) {
        self.timers[side.index()].start_periodic(u64::from(interval_ms) * 1_000);
    }

    fn stop(&mut self, side: Side) {
        self.timers[side.index()].stop();
    }
}
