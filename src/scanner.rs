//! Side-multiplexed vibration scanner.
//!
//! Each of the twelve vibration lines is wired to one apartment on side A
//! and one on side B.  Only the side whose sensor supply is switched on can
//! drive the line, so the scanner powers one side at a time and alternates:
//!
//! ```text
//!   Start ──▶ Settling ──(settling_time)──▶ Sampling ──(scan_window)──┐
//!     ▲                                                               │
//!     └──────────── flip side, clear the new side's triggers ◀────────┘
//! ```
//!
//! Every phase boundary is a timestamp checked once per [`step`](SensorScanner::step),
//! so the main loop never blocks on the settling delay or the window.
//!
//! Triggers are edge-reported: an apartment is returned from `step` only on
//! the sample where it goes from clear to triggered.  The flag then stays
//! set until its side's next window begins.

use embedded_hal::digital::PinState;
use log::{debug, info, warn};

use crate::app::ports::{DigitalIo, Line, StorageError, StoragePort};
use crate::topology::{self, APARTMENT_COUNT, ApartmentId, ApartmentList, Side};

/// Vibration line level while shaking.
pub const VIBRATION_LEVEL: PinState = PinState::High;
/// Side supply switch level that powers the sensors.
pub const POWER_ON: PinState = PinState::Low;
pub const POWER_OFF: PinState = PinState::High;

pub const ENABLE_NAMESPACE: &str = "alarm_sys";
pub const ENABLE_KEY: &str = "apt_states";
/// One bit per apartment, table-index order.
const ENABLE_BYTES: usize = APARTMENT_COUNT.div_ceil(8);

const ALL_APARTMENTS: u32 = (1 << APARTMENT_COUNT) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Power up the current side on the next step.
    Start,
    /// Side powered; samples are not trusted before `until`.
    Settling { until: u64 },
    /// Sampling the current side until `until`.
    Sampling { until: u64 },
}

pub struct SensorScanner {
    current: Side,
    phase: ScanPhase,
    /// Bit per table index.
    enabled: u32,
    /// Bit per table index.
    triggered: u32,
    settling_ms: u32,
    window_ms: u32,
}

fn bit(id: ApartmentId) -> u32 {
    1 << id.index()
}

fn side_mask(side: Side) -> u32 {
    topology::apartments_on_side(side)
        .iter()
        .fold(0, |m, id| m | bit(*id))
}

impl SensorScanner {
    /// Nothing enabled until the stored map or an operator says otherwise,
    /// so unwired lines on a fresh unit stay quiet.  Starts on side A.
    pub fn new(settling_ms: u32, window_ms: u32) -> Self {
        Self {
            current: Side::A,
            phase: ScanPhase::Start,
            enabled: 0,
            triggered: 0,
            settling_ms,
            window_ms,
        }
    }

    // ── Scan cycle ────────────────────────────────────────────

    /// Advance the duty cycle and sample if inside a window.
    /// Returns the apartments that became triggered on this step.
    pub fn step(&mut self, now: u64, io: &mut impl DigitalIo) -> ApartmentList {
        let mut fresh = ApartmentList::new();

        if let ScanPhase::Sampling { until } = self.phase {
            if now >= until {
                self.flip_side();
            }
        }

        if self.phase == ScanPhase::Start {
            self.power_up(now, io);
        }

        if let ScanPhase::Settling { until } = self.phase {
            if now >= until {
                self.phase = ScanPhase::Sampling {
                    until: now + u64::from(self.window_ms),
                };
            }
        }

        if let ScanPhase::Sampling { until } = self.phase {
            if now < until {
                self.sample(io, &mut fresh);
            }
        }

        fresh
    }

    fn power_up(&mut self, now: u64, io: &mut impl DigitalIo) {
        let side = self.current;
        io.write(Line::SidePower(side.other()), POWER_OFF);
        if self.enabled & side_mask(side) == 0 {
            // Nothing to listen to on this side; leave it dark.
            io.write(Line::SidePower(side), POWER_OFF);
            self.flip_side();
            return;
        }
        io.write(Line::SidePower(side), POWER_ON);
        self.phase = ScanPhase::Settling {
            until: now + u64::from(self.settling_ms),
        };
        debug!("Scanner: powered {}, settling {} ms", side, self.settling_ms);
    }

    fn sample(&mut self, io: &mut impl DigitalIo, fresh: &mut ApartmentList) {
        for id in topology::apartments_on_side(self.current) {
            let mask = bit(id);
            if self.enabled & mask == 0 || self.triggered & mask != 0 {
                continue;
            }
            let line = id.record().shared_line;
            if io.read(Line::Vibration(line)) == VIBRATION_LEVEL {
                self.triggered |= mask;
                warn!("Scanner: vibration on {} (line {})", id, line);
                let _ = fresh.push(id);
            }
        }
    }

    /// Hand the bus to the other side.  Its flags describe the previous
    /// window and must not read as "confirmed clear" or "still shaking".
    fn flip_side(&mut self) {
        self.current = self.current.other();
        self.triggered &= !side_mask(self.current);
        self.phase = ScanPhase::Start;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn current_side(&self) -> Side {
        self.current
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn is_enabled(&self, id: ApartmentId) -> bool {
        self.enabled & bit(id) != 0
    }

    pub fn is_triggered(&self, id: ApartmentId) -> bool {
        self.triggered & bit(id) != 0
    }

    pub fn any_triggered(&self) -> bool {
        self.triggered != 0
    }

    pub fn enabled_count(&self) -> u32 {
        self.enabled.count_ones()
    }

    // ── Tuning ────────────────────────────────────────────────

    /// Applies from the next power-up.
    pub fn set_settling_ms(&mut self, ms: u32) {
        self.settling_ms = ms;
    }

    pub fn set_window_ms(&mut self, ms: u32) {
        self.window_ms = ms;
    }

    // ── Enable bitmap ─────────────────────────────────────────

    /// Change one apartment and persist.  The in-memory state is updated
    /// even when the write fails.
    pub fn set_enabled(
        &mut self,
        id: ApartmentId,
        on: bool,
        storage: &mut impl StoragePort,
    ) -> Result<(), StorageError> {
        if on {
            self.enabled |= bit(id);
        } else {
            self.enabled &= !bit(id);
            self.triggered &= !bit(id);
        }
        info!("Scanner: {} {}", id, if on { "enabled" } else { "disabled" });
        self.persist(storage)
    }

    pub fn set_all_enabled(
        &mut self,
        on: bool,
        storage: &mut impl StoragePort,
    ) -> Result<(), StorageError> {
        if on {
            self.enabled = ALL_APARTMENTS;
        } else {
            self.enabled = 0;
            self.triggered = 0;
        }
        info!("Scanner: all apartments {}", if on { "enabled" } else { "disabled" });
        self.persist(storage)
    }

    /// Load the bitmap.  A missing key keeps every sensor disabled;
    /// any other failure is returned with the in-memory state untouched.
    pub fn load(&mut self, storage: &impl StoragePort) -> Result<(), StorageError> {
        let mut buf = [0u8; ENABLE_BYTES];
        match storage.read(ENABLE_NAMESPACE, ENABLE_KEY, &mut buf) {
            Ok(ENABLE_BYTES) => {
                let mut raw = [0u8; 4];
                raw[..ENABLE_BYTES].copy_from_slice(&buf);
                self.enabled = u32::from_le_bytes(raw) & ALL_APARTMENTS;
                self.triggered &= self.enabled;
                info!("Scanner: {} of {} apartments enabled", self.enabled_count(), APARTMENT_COUNT);
                Ok(())
            }
            Ok(_) => Err(StorageError::Corrupted),
            Err(StorageError::NotFound) => {
                info!("Scanner: no stored enable map, all sensors disabled");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn persist(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        let raw = self.enabled.to_le_bytes();
        storage.write(ENABLE_NAMESPACE, ENABLE_KEY, &raw[..ENABLE_BYTES])
    }
}
