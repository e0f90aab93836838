//! MeterGuard firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod alarm;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod notify;
pub mod pins;
pub mod scanner;
pub mod topology;
pub mod wire_monitor;

// Board-facing code.  Each item carries a host fallback, so these build
// off target too.
pub mod adapters;
pub mod drivers;
