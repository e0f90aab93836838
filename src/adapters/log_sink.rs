//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A front-end push adapter would implement the same trait.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { cut_circuits } => {
                info!("START | monitoring, cut_at_boot={}", cut_circuits);
            }
            AppEvent::TheftDetected { apartment } => {
                warn!("THEFT | {} ({})", apartment, apartment.record().side);
            }
            AppEvent::WireCutDetected {
                circuit,
                at_startup,
            } => {
                error!(
                    "CUT | {} | {}",
                    circuit,
                    if *at_startup { "at boot" } else { "runtime" }
                );
            }
            AppEvent::AlarmActivated { side } => {
                info!("ALARM | {} on", side);
            }
            AppEvent::AlarmStopped { side, reason } => {
                info!("ALARM | {} off ({:?})", side, reason);
            }
            AppEvent::CircuitReset { circuit, was_cut } => {
                info!("RESET | {} | was_cut={}", circuit, was_cut);
            }
            AppEvent::NotificationQueued { apartment, kind } => {
                info!("NOTIFY | queued {:?} -> {}", kind, apartment);
            }
            AppEvent::NotificationDelivered { message_id } => {
                info!("NOTIFY | delivered message_id={}", message_id);
            }
            AppEvent::NotificationRetrying {
                failure,
                retries,
                next_attempt_at,
            } => {
                warn!(
                    "NOTIFY | retry #{} at {} ms | {}",
                    retries, next_attempt_at, failure
                );
            }
            AppEvent::NotificationDropped { failure } => {
                error!("NOTIFY | dropped | {}", failure);
            }
            AppEvent::NotificationRejected { apartment, kind } => {
                error!("NOTIFY | rejected {:?} -> {} (queue full)", kind, apartment);
            }
            AppEvent::StatusChanged { from, to } => {
                info!("STATUS | {} -> {}", from, to);
            }
            AppEvent::SystemCheckCompleted {
                faulty,
                sirens_chirped,
            } => {
                if faulty.is_empty() {
                    info!("CHECK | circuits OK | sirens chirped={}", sirens_chirped);
                } else {
                    for circuit in faulty {
                        warn!("CHECK | {} cut", circuit);
                    }
                    warn!("CHECK | {} fault(s) | sirens chirped={}", faulty.len(), sirens_chirped);
                }
            }
        }
    }
}
