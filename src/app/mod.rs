//! Application core: pure domain logic, no I/O.
//!
//! This module wires the MeterGuard detection pipeline together: sensor
//! scanning, wire-cut latching, siren control and alert fan-out.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
