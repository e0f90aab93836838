//! Tamper wire integrity monitor.
//!
//! Six pull-up inputs, one per monitored wire path: the four meter-box
//! sensor harnesses and the two links between each side's distribution
//! box and the control unit.  A cut wire lets the pull-up win, so HIGH
//! means cut.
//!
//! ## Latch lifecycle
//!
//! 1. While `monitoring_enabled`, each check reads the line.
//! 2. On the first HIGH the circuit latches: `cut = true`,
//!    `monitoring_enabled = false`.  The caller gets exactly one detection.
//! 3. Further checks are skipped, so a permanently broken wire does not
//!    re-alert every tick.
//! 4. Only [`WireIntegrityMonitor::reset`] re-arms the circuit.

use core::fmt;

use embedded_hal::digital::PinState;
use log::{error, info};
use serde::Serialize;

use crate::app::ports::{DigitalIo, Line};
use crate::error::ValidationError;
use crate::topology::{BoxPosition, Side};

/// Input level of a cut circuit.
pub const CUT_LEVEL: PinState = PinState::High;

pub const CIRCUIT_COUNT: usize = 6;

/// Every cut found in one pass fits in here.
pub type CircuitList = heapless::Vec<Circuit, CIRCUIT_COUNT>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Circuit {
    /// Sensor harness of one meter box.
    Box { side: Side, box_pos: BoxPosition },
    /// Distribution box → control unit link of one side.
    Distribution(Side),
}

impl Circuit {
    pub const ALL: [Circuit; CIRCUIT_COUNT] = [
        Circuit::Box { side: Side::A, box_pos: BoxPosition::Left },
        Circuit::Box { side: Side::A, box_pos: BoxPosition::Right },
        Circuit::Box { side: Side::B, box_pos: BoxPosition::Left },
        Circuit::Box { side: Side::B, box_pos: BoxPosition::Right },
        Circuit::Distribution(Side::A),
        Circuit::Distribution(Side::B),
    ];

    pub const fn index(self) -> usize {
        match self {
            Circuit::Box { side, box_pos } => {
                side.index() * 2
                    + match box_pos {
                        BoxPosition::Left => 0,
                        BoxPosition::Right => 1,
                    }
            }
            Circuit::Distribution(side) => 4 + side.index(),
        }
    }

    pub const fn side(self) -> Side {
        match self {
            Circuit::Box { side, .. } | Circuit::Distribution(side) => side,
        }
    }
}

impl TryFrom<u8> for Circuit {
    type Error = ValidationError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Circuit::ALL
            .get(raw as usize)
            .copied()
            .ok_or(ValidationError::InvalidCircuit(raw))
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Circuit::Box { side, box_pos } => write!(f, "{side} {box_pos} harness"),
            Circuit::Distribution(side) => write!(f, "{side} distribution link"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitStatus {
    pub cut: bool,
    pub monitoring_enabled: bool,
}

impl Default for CircuitStatus {
    fn default() -> Self {
        Self {
            cut: false,
            monitoring_enabled: true,
        }
    }
}

/// Latched cut state for all six circuits.
#[derive(Debug, Default)]
pub struct WireIntegrityMonitor {
    status: [CircuitStatus; CIRCUIT_COUNT],
}

impl WireIntegrityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one circuit.  Returns `true` only on the transition to cut.
    pub fn check(&mut self, circuit: Circuit, io: &mut impl DigitalIo) -> bool {
        let st = &mut self.status[circuit.index()];
        if !st.monitoring_enabled {
            return false;
        }
        let cut = io.read(Line::Circuit(circuit)) == CUT_LEVEL;
        st.cut = cut;
        st.monitoring_enabled = !cut;
        if cut {
            error!("WIRE CUT SET: {circuit}");
        }
        cut
    }

    /// Check every circuit, returning the ones that just latched.
    pub fn check_all(&mut self, io: &mut impl DigitalIo) -> CircuitList {
        let mut fresh = CircuitList::new();
        for circuit in Circuit::ALL {
            if self.check(circuit, io) {
                let _ = fresh.push(circuit);
            }
        }
        fresh
    }

    /// One pass at boot, before the main loop.  Same latching as
    /// [`check_all`](Self::check_all); callers route the result to the
    /// start-up notification templates instead of the runtime ones.
    pub fn startup_sweep(&mut self, io: &mut impl DigitalIo) -> CircuitList {
        let found = self.check_all(io);
        if found.is_empty() {
            info!("Wire sweep: all {} circuits intact", CIRCUIT_COUNT);
        } else {
            error!("Wire sweep: {} circuit(s) already cut at boot", found.len());
        }
        found
    }

    /// Circuits that are latched cut or read cut right now.  Leaves the
    /// latches alone, so nothing is reported twice.
    pub fn inspect(&self, io: &mut impl DigitalIo) -> CircuitList {
        let mut faulty = CircuitList::new();
        for circuit in Circuit::ALL {
            if self.status(circuit).cut || io.read(Line::Circuit(circuit)) == CUT_LEVEL {
                let _ = faulty.push(circuit);
            }
        }
        faulty
    }

    /// Re-arm a latched circuit.  Returns the status before the reset.
    pub fn reset(&mut self, circuit: Circuit) -> CircuitStatus {
        let st = &mut self.status[circuit.index()];
        let before = *st;
        *st = CircuitStatus::default();
        if before.cut || !before.monitoring_enabled {
            info!("WIRE CUT CLEARED (manual reset): {circuit}");
        }
        before
    }

    pub fn reset_all(&mut self) {
        for circuit in Circuit::ALL {
            self.reset(circuit);
        }
    }

    pub fn status(&self, circuit: Circuit) -> CircuitStatus {
        self.status[circuit.index()]
    }

    pub fn any_cut(&self) -> bool {
        self.status.iter().any(|s| s.cut)
    }
}
