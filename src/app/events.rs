//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, forward to an admin
//! front end, etc.

use core::fmt;

use serde::Serialize;

use crate::alarm::StopReason;
use crate::error::SendFailure;
use crate::notify::templates::TemplateKind;
use crate::topology::{ApartmentId, Side};
use crate::wire_monitor::{Circuit, CircuitList};

/// Derived whole-system status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SystemStatus {
    #[default]
    Normal,
    TheftDetected,
    WireCutDetected,
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::TheftDetected => write!(f, "Theft Detected"),
            Self::WireCutDetected => write!(f, "Wire Cut Detected"),
        }
    }
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Boot finished: how many circuits the startup sweep found cut.
    Started { cut_circuits: usize },

    /// A vibration sensor fired for the first time in its window.
    TheftDetected { apartment: ApartmentId },

    /// A circuit latched as cut.
    WireCutDetected { circuit: Circuit, at_startup: bool },

    AlarmActivated { side: Side },

    AlarmStopped { side: Side, reason: StopReason },

    /// An operator cleared a latched circuit.
    CircuitReset { circuit: Circuit, was_cut: bool },

    NotificationQueued { apartment: ApartmentId, kind: TemplateKind },

    NotificationDelivered { message_id: i64 },

    NotificationRetrying { failure: SendFailure, retries: u8, next_attempt_at: u64 },

    NotificationDropped { failure: SendFailure },

    /// The queue refused an alert (full).
    NotificationRejected { apartment: ApartmentId, kind: TemplateKind },

    StatusChanged { from: SystemStatus, to: SystemStatus },

    /// Self-test result: circuits found cut (latched or live) and how many
    /// sirens were chirped.
    SystemCheckCompleted { faulty: CircuitList, sirens_chirped: u8 },
}
