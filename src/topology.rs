//! Static building topology.
//!
//! 24 apartments on six floors, split into two sides of the building with
//! two meter boxes each.  Apartment `id` belongs to group `(id - 1) % 4`
//! and floor `(id - 1) / 4`:
//!
//! | group | side | box   | apartments          |
//! |-------|------|-------|---------------------|
//! | 0     | A    | left  | 1, 5, 9, 13, 17, 21 |
//! | 1     | A    | right | 2, 6, 10, 14, 18, 22|
//! | 2     | B    | left  | 3, 7, 11, 15, 19, 23|
//! | 3     | B    | right | 4, 8, 12, 16, 20, 24|
//!
//! The table is laid out group-major, so table index = `group * 6 + floor`.
//! Apartments in the same box and on the same floor but on opposite sides
//! share one physical vibration line; the scanner resolves which one is
//! speaking by powering a single side at a time.
//!
//! Grouping queries exist for notification fan-out only.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const APARTMENT_COUNT: usize = 24;
pub const FLOORS: usize = 6;
/// Apartments per side.
pub const SIDE_CAPACITY: usize = APARTMENT_COUNT / 2;

/// Every grouping query fits in half the building.
pub type ApartmentList = heapless::Vec<ApartmentId, SIDE_CAPACITY>;

// ───────────────────────────────────────────────────────────────
// Side / box
// ───────────────────────────────────────────────────────────────

/// One physical half of the building.  A is the right half, B the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::A, Side::B];

    pub const fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub const fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = ValidationError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Side::A),
            1 => Ok(Side::B),
            other => Err(ValidationError::InvalidSide(other)),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "side A"),
            Side::B => write!(f, "side B"),
        }
    }
}

/// Meter box within a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoxPosition {
    Left,
    Right,
}

impl BoxPosition {
    pub const ALL: [BoxPosition; 2] = [BoxPosition::Left, BoxPosition::Right];

    pub const fn other(self) -> BoxPosition {
        match self {
            BoxPosition::Left => BoxPosition::Right,
            BoxPosition::Right => BoxPosition::Left,
        }
    }

    /// Offset of this box's block of shared lines.
    const fn line_base(self) -> u8 {
        match self {
            BoxPosition::Left => 0,
            BoxPosition::Right => FLOORS as u8,
        }
    }
}

impl TryFrom<u8> for BoxPosition {
    type Error = ValidationError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(BoxPosition::Left),
            1 => Ok(BoxPosition::Right),
            other => Err(ValidationError::InvalidBox(other)),
        }
    }
}

impl fmt::Display for BoxPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxPosition::Left => write!(f, "left box"),
            BoxPosition::Right => write!(f, "right box"),
        }
    }
}

const GROUPS: [(Side, BoxPosition); 4] = [
    (Side::A, BoxPosition::Left),
    (Side::A, BoxPosition::Right),
    (Side::B, BoxPosition::Left),
    (Side::B, BoxPosition::Right),
];

// ───────────────────────────────────────────────────────────────
// Apartment identifiers
// ───────────────────────────────────────────────────────────────

/// A validated apartment number in `1..=24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApartmentId(u8);

impl ApartmentId {
    pub fn new(raw: u8) -> Result<Self, ValidationError> {
        if apartment_index(raw).is_some() {
            Ok(Self(raw))
        } else {
            Err(ValidationError::InvalidApartment(raw))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Position in the topology table.
    pub const fn index(self) -> usize {
        let n = (self.0 - 1) as usize;
        (n % 4) * FLOORS + n / 4
    }

    /// Inverse of [`index`](Self::index).
    pub const fn from_index(index: usize) -> Option<Self> {
        if index >= APARTMENT_COUNT {
            return None;
        }
        let group = index / FLOORS;
        let floor = index % FLOORS;
        Some(Self((floor * 4 + group + 1) as u8))
    }

    pub fn record(self) -> &'static ApartmentRecord {
        &TABLE[self.index()]
    }

    pub fn all() -> impl Iterator<Item = ApartmentId> {
        TABLE.iter().map(|r| r.id)
    }
}

impl fmt::Display for ApartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "apt {}", self.0)
    }
}

/// Table index for a raw identifier, or `None` when out of range.
pub const fn apartment_index(raw: u8) -> Option<usize> {
    if raw == 0 || raw as usize > APARTMENT_COUNT {
        return None;
    }
    let n = (raw - 1) as usize;
    Some((n % 4) * FLOORS + n / 4)
}

// ───────────────────────────────────────────────────────────────
// Records
// ───────────────────────────────────────────────────────────────

/// Floor number, ground = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Floor(u8);

const FLOOR_LABELS_AR: [&str; FLOORS] = [
    "الدور الأرضي",
    "الدور الأول",
    "الدور الثاني",
    "الدور الثالث",
    "الدور الرابع",
    "الدور الخامس",
];

const FLOOR_LABELS_EN: [&str; FLOORS] = [
    "Ground floor",
    "First floor",
    "Second floor",
    "Third floor",
    "Fourth floor",
    "Fifth floor",
];

impl Floor {
    pub const fn number(self) -> u8 {
        self.0
    }

    pub const fn arabic(self) -> &'static str {
        FLOOR_LABELS_AR[self.0 as usize]
    }

    pub const fn english(self) -> &'static str {
        FLOOR_LABELS_EN[self.0 as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApartmentRecord {
    pub id: ApartmentId,
    pub side: Side,
    pub box_pos: BoxPosition,
    pub floor: Floor,
    /// Index into the shared vibration line bank (0–11).
    pub shared_line: u8,
}

static TABLE: [ApartmentRecord; APARTMENT_COUNT] = build_table();

const fn build_table() -> [ApartmentRecord; APARTMENT_COUNT] {
    let mut table = [ApartmentRecord {
        id: ApartmentId(1),
        side: Side::A,
        box_pos: BoxPosition::Left,
        floor: Floor(0),
        shared_line: 0,
    }; APARTMENT_COUNT];

    let mut i = 0;
    while i < APARTMENT_COUNT {
        let group = i / FLOORS;
        let floor = (i % FLOORS) as u8;
        let (side, box_pos) = GROUPS[group];
        table[i] = ApartmentRecord {
            id: ApartmentId((floor as usize * 4 + group + 1) as u8),
            side,
            box_pos,
            floor: Floor(floor),
            shared_line: box_pos.line_base() + floor,
        };
        i += 1;
    }
    table
}

/// O(1) lookup; `None` for identifiers outside `1..=24`.
pub fn lookup(raw: u8) -> Option<&'static ApartmentRecord> {
    apartment_index(raw).map(|i| &TABLE[i])
}

pub fn records() -> &'static [ApartmentRecord; APARTMENT_COUNT] {
    &TABLE
}

// ── Grouping queries ──────────────────────────────────────────

fn collect(pred: impl Fn(&ApartmentRecord) -> bool) -> ApartmentList {
    let mut out = ApartmentList::new();
    for rec in TABLE.iter().filter(|r| pred(r)) {
        // Every predicate below selects at most one side.
        let _ = out.push(rec.id);
    }
    out
}

/// Other apartments in the target's box (target excluded).
pub fn same_box(id: ApartmentId) -> ApartmentList {
    let me = id.record();
    collect(|r| r.side == me.side && r.box_pos == me.box_pos && r.id != id)
}

/// Apartments in the other box on the target's side.
pub fn adjacent_box(id: ApartmentId) -> ApartmentList {
    let me = id.record();
    collect(|r| r.side == me.side && r.box_pos == me.box_pos.other())
}

/// Every apartment on the opposite side.
pub fn other_side(id: ApartmentId) -> ApartmentList {
    let side = id.record().side.other();
    collect(|r| r.side == side)
}

pub fn apartments_on_side(side: Side) -> ApartmentList {
    collect(|r| r.side == side)
}

pub fn apartments_in_box(side: Side, box_pos: BoxPosition) -> ApartmentList {
    collect(|r| r.side == side && r.box_pos == box_pos)
}
