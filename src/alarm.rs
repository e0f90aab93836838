//! Dual-side siren actuator.
//!
//! Each side runs its own state machine:
//!
//! ```text
//!   Idle ──activate──▶ Active ──first timer tick──▶ Toggling
//!     ▲                  │                             │
//!     └──── stop / duration expired (main loop) ◀──────┘
//! ```
//!
//! The siren is switched on the moment the side leaves Idle.  From then on
//! a periodic hardware timer calls that side's [`ToggleHandle`], which flips
//! the siren without involving the main loop.  Duration expiry is checked
//! by the main loop in [`AlarmActuator::update`].
//!
//! ## Shared state
//!
//! The main loop and the timer callback both touch a side's
//! [`AlarmSideState`].  Each side has its own critical-section mutex that
//! guards exactly that struct plus the siren write that goes with it, so a
//! stop can never be followed by a late toggle turning the siren back on.
//! The two sides share nothing.

use core::cell::Cell;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::PinState;
use log::{debug, info};
use serde::Serialize;

use crate::app::ports::{DigitalIo, Line, SirenTimer};
use crate::topology::Side;

/// Relay input level that sounds the siren.
pub const SIREN_ON: PinState = PinState::Low;
pub const SIREN_OFF: PinState = PinState::High;
/// Length of the self-test chirp.
pub const CHIRP_MS: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmSideState {
    pub active: bool,
    pub toggle_on: bool,
    pub started_at: u64,
    /// `None` until the timer has fired once in this activation.
    pub last_toggle_at: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlarmPhase {
    Idle,
    /// Siren on, timer armed, no toggle yet.
    Active,
    Toggling,
}

/// Why a side went back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    DurationElapsed,
}

type SideCell = Mutex<CriticalSectionRawMutex, Cell<AlarmSideState>>;

fn siren_level(on: bool) -> PinState {
    if on { SIREN_ON } else { SIREN_OFF }
}

pub struct AlarmActuator {
    sides: Arc<[SideCell; 2]>,
    duration_ms: u32,
    interval_ms: u32,
    last_alarm_at: Option<u64>,
    /// End of a running self-test chirp, per side.
    chirp_until: [Option<u64>; 2],
}

impl AlarmActuator {
    pub fn new(duration_ms: u32, interval_ms: u32) -> Self {
        Self {
            sides: Arc::new([
                Mutex::new(Cell::new(AlarmSideState::default())),
                Mutex::new(Cell::new(AlarmSideState::default())),
            ]),
            duration_ms,
            interval_ms,
            last_alarm_at: None,
            chirp_until: [None; 2],
        }
    }

    /// Drive both sirens off.  Call once at boot.
    pub fn init(&self, io: &mut impl DigitalIo) {
        for side in Side::ALL {
            io.write(Line::Siren(side), SIREN_OFF);
        }
    }

    /// Handle for the side's timer callback.
    pub fn toggle_handle(&self, side: Side) -> ToggleHandle {
        ToggleHandle {
            sides: Arc::clone(&self.sides),
            side,
        }
    }

    // ── Transitions ───────────────────────────────────────────

    /// Idle → Active.  Returns `false` (and changes nothing, start time
    /// included) if the side is already sounding.
    pub fn activate(
        &mut self,
        side: Side,
        now: u64,
        io: &mut impl DigitalIo,
        timer: &mut impl SirenTimer,
    ) -> bool {
        let started = self.sides[side.index()].lock(|cell| {
            if cell.get().active {
                return false;
            }
            cell.set(AlarmSideState {
                active: true,
                toggle_on: true,
                started_at: now,
                last_toggle_at: None,
            });
            io.write(Line::Siren(side), SIREN_ON);
            true
        });
        if !started {
            debug!("Alarm: {} already active", side);
            return false;
        }
        // A real alarm takes over the siren from a chirp.
        self.chirp_until[side.index()] = None;
        timer.start(side, self.interval_ms);
        self.last_alarm_at = Some(now);
        info!("Alarm: {} ACTIVATED ({} ms)", side, self.duration_ms);
        true
    }

    /// Any → Idle.  Returns `false` if the side was already idle.
    pub fn stop(
        &mut self,
        side: Side,
        reason: StopReason,
        io: &mut impl DigitalIo,
        timer: &mut impl SirenTimer,
    ) -> bool {
        let stopped = self.sides[side.index()].lock(|cell| {
            let mut st = cell.get();
            if !st.active {
                return false;
            }
            st.active = false;
            st.toggle_on = false;
            cell.set(st);
            io.write(Line::Siren(side), SIREN_OFF);
            true
        });
        if stopped {
            timer.stop(side);
            info!("Alarm: {} stopped ({:?})", side, reason);
        } else if self.chirp_until[side.index()].take().is_some() {
            io.write(Line::Siren(side), SIREN_OFF);
        }
        stopped
    }

    pub fn stop_all(&mut self, io: &mut impl DigitalIo, timer: &mut impl SirenTimer) {
        for side in Side::ALL {
            self.stop(side, StopReason::Manual, io, timer);
        }
    }

    /// Sound an idle side for [`CHIRP_MS`] without starting its timer.
    /// [`update`](Self::update) silences it again.  Returns `false` if the
    /// side is sounding or already chirping.
    pub fn chirp(&mut self, side: Side, now: u64, io: &mut impl DigitalIo) -> bool {
        let slot = &mut self.chirp_until[side.index()];
        if slot.is_some() || self.sides[side.index()].lock(|c| c.get().active) {
            return false;
        }
        *slot = Some(now + CHIRP_MS);
        io.write(Line::Siren(side), SIREN_ON);
        debug!("Alarm: {} self-test chirp", side);
        true
    }

    pub fn is_chirping(&self, side: Side) -> bool {
        self.chirp_until[side.index()].is_some()
    }

    /// Stop every side whose duration has elapsed and end finished chirps.
    /// Returns the sides whose alarm expired.
    pub fn update(
        &mut self,
        now: u64,
        io: &mut impl DigitalIo,
        timer: &mut impl SirenTimer,
    ) -> heapless::Vec<Side, 2> {
        let mut expired = heapless::Vec::new();
        for side in Side::ALL {
            if self.chirp_until[side.index()].is_some_and(|until| now >= until) {
                self.chirp_until[side.index()] = None;
                io.write(Line::Siren(side), SIREN_OFF);
            }
            let st = self.state(side);
            if st.active && now.saturating_sub(st.started_at) >= u64::from(self.duration_ms) {
                self.stop(side, StopReason::DurationElapsed, io, timer);
                let _ = expired.push(side);
            }
        }
        expired
    }

    // ── Tuning ────────────────────────────────────────────────

    /// Applies to running alarms too; measured from their start.
    pub fn set_duration(&mut self, ms: u32) {
        self.duration_ms = ms;
    }

    /// Re-arms the timers of sounding sides with the new period.
    pub fn set_interval(&mut self, ms: u32, timer: &mut impl SirenTimer) {
        self.interval_ms = ms;
        for side in Side::ALL {
            if self.is_active(side) {
                timer.start(side, ms);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self, side: Side) -> AlarmSideState {
        self.sides[side.index()].lock(Cell::get)
    }

    pub fn is_active(&self, side: Side) -> bool {
        self.state(side).active
    }

    pub fn phase(&self, side: Side) -> AlarmPhase {
        let st = self.state(side);
        match (st.active, st.last_toggle_at) {
            (false, _) => AlarmPhase::Idle,
            (true, None) => AlarmPhase::Active,
            (true, Some(_)) => AlarmPhase::Toggling,
        }
    }

    pub fn active_count(&self) -> usize {
        Side::ALL.iter().filter(|s| self.is_active(**s)).count()
    }

    pub fn last_alarm_at(&self) -> Option<u64> {
        self.last_alarm_at
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}

/// Timer-context access to one side.  Cloneable and `Send`, so it can be
/// moved into a hardware timer's callback argument.
#[derive(Clone)]
pub struct ToggleHandle {
    sides: Arc<[SideCell; 2]>,
    side: Side,
}

impl ToggleHandle {
    pub fn side(&self) -> Side {
        self.side
    }

    /// Flip the siren.  A no-op once the side has been stopped, even if
    /// the timer fires one last time after `stop`.
    pub fn on_timer(&self, now: u64, io: &mut impl DigitalIo) -> bool {
        self.sides[self.side.index()].lock(|cell| {
            let mut st = cell.get();
            if !st.active {
                return false;
            }
            st.toggle_on = !st.toggle_on;
            st.last_toggle_at = Some(now);
            cell.set(st);
            io.write(Line::Siren(self.side), siren_level(st.toggle_on));
            true
        })
    }
}
