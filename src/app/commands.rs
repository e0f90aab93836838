//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (admin front
//! end, serial console) that the [`AppService`](super::service::AppService)
//! validates and acts upon.  Identifiers arrive raw; range checks happen
//! in the service, never in the adapters.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Apartment identifier, 1–24.
    EnableSensor(u8),
    DisableSensor(u8),
    EnableAllSensors,
    DisableAllSensors,

    /// Side index: 0 = A, 1 = B.
    ActivateAlarm(u8),
    StopAlarm(u8),
    StopAllAlarms,

    SetAlarmDuration(u32),
    SetAlarmInterval(u32),
    SetSettlingTime(u32),

    /// Circuit index in [`Circuit::ALL`](crate::wire_monitor::Circuit::ALL) order.
    ResetCircuit(u8),

    ConfigureRecipient { apartment: u8, token: String, chat_id: i64 },
    RemoveRecipient(u8),
    EnableRecipient(u8),
    DisableRecipient(u8),

    /// Send the "system online" greeting to every notifiable apartment.
    AnnounceOnline,

    /// Persist the current config now instead of after the quiet period.
    SaveConfig,

    /// Inspect every circuit and chirp each idle siren briefly.
    SystemCheck,
}
