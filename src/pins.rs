//! GPIO pin assignments for the MeterGuard control unit.
//!
//! Drivers and the hardware adapter reference this
//! module rather than hard-coding pin numbers.  Side A is the right half of
//! the building, side B the left half.

// ---------------------------------------------------------------------------
// Sirens (relay board, active LOW)
// ---------------------------------------------------------------------------

/// Relay input for the side A siren.  LOW = siren sounding.
pub const SIREN_A_GPIO: i32 = 13;
/// Relay input for the side B siren.  LOW = siren sounding.
pub const SIREN_B_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// Side power gating (NPN high-side switch, LOW = powered)
// ---------------------------------------------------------------------------

/// Sensor supply for every vibration sensor on side A.
pub const VCC_A_GPIO: i32 = 32;
/// Sensor supply for every vibration sensor on side B.
pub const VCC_B_GPIO: i32 = 21;

// ---------------------------------------------------------------------------
// Tamper wire circuits (input with pull-up, HIGH = cut)
// ---------------------------------------------------------------------------

pub const CUT_A_LEFT_BOX_GPIO: i32 = 14;
pub const CUT_A_RIGHT_BOX_GPIO: i32 = 22;
pub const CUT_B_LEFT_BOX_GPIO: i32 = 26;
pub const CUT_B_RIGHT_BOX_GPIO: i32 = 27;

/// Link between the side A distribution box and the control unit.
pub const CUT_A_DISTRIBUTION_GPIO: i32 = 25;
/// Link between the side B distribution box and the control unit.
pub const CUT_B_DISTRIBUTION_GPIO: i32 = 33;

// ---------------------------------------------------------------------------
// Vibration lines (HIGH = vibration)
// ---------------------------------------------------------------------------

/// Shared vibration lines, indexed by shared-line index.
///
/// Lines 0–5 serve the left box (ground to fifth floor), lines 6–11 the
/// right box.  Each line is wired to one apartment on each side; only the
/// powered side drives it.  GPIO 34–39 are input-only on the ESP32 and have
/// no internal pull resistors.
pub const VIBRATION_GPIOS: [i32; 12] = [15, 2, 4, 16, 17, 5, 19, 23, 36, 39, 34, 35];
