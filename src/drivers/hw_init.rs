//! Boot-time GPIO setup plus the raw level accessors the hardware adapter
//! uses.  Sirens and side supplies come up HIGH, which is off for both.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "gpio_config rejected pin mask (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;

/// Tamper circuit inputs, in `Circuit::ALL` order.
pub const CIRCUIT_GPIOS: [i32; 6] = [
    pins::CUT_A_LEFT_BOX_GPIO,
    pins::CUT_A_RIGHT_BOX_GPIO,
    pins::CUT_B_LEFT_BOX_GPIO,
    pins::CUT_B_RIGHT_BOX_GPIO,
    pins::CUT_A_DISTRIBUTION_GPIO,
    pins::CUT_B_DISTRIBUTION_GPIO,
];

/// Outputs driven HIGH (off) at boot.
pub const OUTPUT_GPIOS: [i32; 4] = [
    pins::SIREN_A_GPIO,
    pins::SIREN_B_GPIO,
    pins::VCC_A_GPIO,
    pins::VCC_B_GPIO,
];

/// Configure every MeterGuard pin and park the outputs HIGH (off).
#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // An intact loop shorts the pin to ground; a cut lets the pull-up win.
    configure(mask_of(&CIRCUIT_GPIOS), gpio_mode_t_GPIO_MODE_INPUT, true)?;
    // Sensor modules drive these; GPIO 34–39 have no internal pulls anyway.
    configure(mask_of(&pins::VIBRATION_GPIOS), gpio_mode_t_GPIO_MODE_INPUT, false)?;
    // Input stays enabled on outputs so their level can be read back.
    configure(mask_of(&OUTPUT_GPIOS), gpio_mode_t_GPIO_MODE_INPUT_OUTPUT, false)?;
    for &pin in &OUTPUT_GPIOS {
        gpio_write(pin, true);
    }
    info!(
        "hw_init: {} circuits, {} vibration lines, {} outputs parked HIGH",
        CIRCUIT_GPIOS.len(),
        pins::VIBRATION_GPIOS.len(),
        OUTPUT_GPIOS.len()
    );
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    for &pin in &OUTPUT_GPIOS {
        gpio_write(pin, true);
    }
    log::info!("hw_init(sim): outputs parked HIGH");
    Ok(())
}

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn mask_of(gpios: &[i32]) -> u64 {
    gpios.iter().fold(0, |mask, &pin| mask | (1u64 << pin))
}

#[cfg(target_os = "espidf")]
fn configure(mask: u64, mode: gpio_mode_t, pull_up: bool) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: mask,
        mode,
        pull_up_en: if pull_up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: `cfg` is fully initialised and only read during the call;
    // runs once from main() before the loop and the timer tasks exist.
    match unsafe { gpio_config(&cfg) } {
        rc if rc == ESP_OK as i32 => Ok(()),
        rc => Err(HwInitError::GpioConfigFailed(rc)),
    }
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: register read on a configured pin.
    unsafe { gpio_get_level(pin) != 0 }
}

/// Main loop and siren timer tasks both call this; each pin has one
/// writer at a time (see `alarm`).
#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: register write on a configured output pin.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

// ── Simulation level table ────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_LEVELS: std::sync::Mutex<[bool; 40]> = std::sync::Mutex::new([false; 40]);

#[cfg(not(target_os = "espidf"))]
fn sim_slot(pin: i32) -> Option<usize> {
    usize::try_from(pin).ok().filter(|&p| p < 40)
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    let Some(p) = sim_slot(pin) else { return false };
    SIM_LEVELS.lock().map(|l| l[p]).unwrap_or(false)
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    if let (Some(p), Ok(mut levels)) = (sim_slot(pin), SIM_LEVELS.lock()) {
        levels[p] = high;
    }
}

/// Drive a simulated input (host builds only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_level(pin: i32, high: bool) {
    gpio_write(pin, high);
}
