//! The orchestrator behind every tick.
//!
//! [`AppService`] owns the scanner, wire monitor, siren actuator,
//! recipient directory and notification queue.  It exposes a clean,
//! hardware-agnostic API.  All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  DigitalIo ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                │          AppService           │
//! SirenTimer ◀──│ Scanner · Wires · Alarm · Q   │──▶ MessageTransport
//!                └──────────────────────────────┘
//! ```
//!
//! ## Tick order
//!
//! 1. alarm duration expiry
//! 2. one scanner step
//! 3. wire circuits (runtime cuts sound the side and fan out)
//! 4. new theft triggers (sound the side and fan out)
//! 5. status recomputation
//! 6. one notification delivery step
//! 7. config auto-save once the last change is [`AUTO_SAVE_DELAY_MS`] old

use log::{info, warn};

use crate::alarm::{AlarmActuator, StopReason, ToggleHandle};
use crate::config::AlarmConfig;
use crate::diagnostics::StatusReport;
use crate::error::{DeliveryOutcome, Error, ValidationError};
use crate::notify::recipients::{RecipientDirectory, validate_chat_id, validate_token};
use crate::notify::templates::{MessageTemplate, host_name};
use crate::notify::{NotificationQueue, RetryPolicy};
use crate::scanner::SensorScanner;
use crate::topology::{self, ApartmentId, ApartmentList, Side};
use crate::wire_monitor::{Circuit, CircuitStatus, WireIntegrityMonitor};

use super::commands::AppCommand;
use super::events::{AppEvent, SystemStatus};
use super::ports::{
    ConfigError, ConfigPort, DigitalIo, EventSink, MessageTransport, SirenTimer, StorageError,
    StoragePort,
};

/// Quiet period after the last config change before it is flushed.
pub const AUTO_SAVE_DELAY_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: AlarmConfig,
    scanner: SensorScanner,
    monitor: WireIntegrityMonitor,
    alarm: AlarmActuator,
    recipients: RecipientDirectory,
    queue: NotificationQueue,
    status: SystemStatus,
    last_error: Option<String>,
    boot_at: u64,
    tick_count: u64,
    config_dirty: bool,
    dirty_since: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** touch storage or hardware; call [`start`](Self::start) next.
    pub fn new(config: AlarmConfig) -> Self {
        let scanner = SensorScanner::new(config.settling_time_ms, config.scan_window_ms);
        let alarm = AlarmActuator::new(config.alarm_duration_ms, config.alarm_interval_ms);
        let queue = NotificationQueue::new(RetryPolicy::from_config(&config));
        Self {
            config,
            scanner,
            monitor: WireIntegrityMonitor::new(),
            alarm,
            recipients: RecipientDirectory::new(),
            queue,
            status: SystemStatus::Normal,
            last_error: None,
            boot_at: 0,
            tick_count: 0,
            config_dirty: false,
            dirty_since: 0,
        }
    }

    /// Handle for a side's siren timer callback.  Wire these into the
    /// timer driver before the first activation.
    pub fn toggle_handle(&self, side: Side) -> ToggleHandle {
        self.alarm.toggle_handle(side)
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load persisted state, silence the sirens and run the startup
    /// sweep.  Circuits already cut at boot are latched and reported with
    /// the startup templates; no siren sounds for them.
    pub fn start(
        &mut self,
        now: u64,
        io: &mut impl DigitalIo,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.boot_at = now;
        self.alarm.init(io);

        if let Err(e) = self.scanner.load(storage) {
            warn!("Apartment states unavailable ({}), sensors stay disabled", e);
            self.last_error = Some(format!("Failed to load apartment states: {e}"));
        }
        let failures = self.recipients.load(storage);
        if failures > 0 {
            self.last_error = Some(format!("{failures} recipient slot(s) could not be loaded"));
        }

        let cut = self.monitor.startup_sweep(io);
        for &circuit in &cut {
            sink.emit(&AppEvent::WireCutDetected {
                circuit,
                at_startup: true,
            });
            self.fan_out_cut(circuit, true, now, sink);
        }
        if !cut.is_empty() {
            self.set_status(SystemStatus::WireCutDetected, sink);
        }

        sink.emit(&AppEvent::Started {
            cut_circuits: cut.len(),
        });
        info!(
            "AppService started: {} sensors enabled, {} recipients, {} circuits cut",
            self.scanner.enabled_count(),
            self.recipients.notifiable_count(),
            cut.len()
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full cycle.  Never blocks beyond the transport's own send
    /// timeout.
    pub fn tick(
        &mut self,
        now: u64,
        io: &mut impl DigitalIo,
        timer: &mut impl SirenTimer,
        transport: &mut impl MessageTransport,
        config_store: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // 1. Duration expiry
        for side in self.alarm.update(now, io, timer) {
            sink.emit(&AppEvent::AlarmStopped {
                side,
                reason: StopReason::DurationElapsed,
            });
        }

        // 2. Scanner
        let triggered = self.scanner.step(now, io);

        // 3. Wire circuits
        for circuit in self.monitor.check_all(io) {
            sink.emit(&AppEvent::WireCutDetected {
                circuit,
                at_startup: false,
            });
            self.raise_alarm(circuit.side(), now, io, timer, sink);
            self.set_status(SystemStatus::WireCutDetected, sink);
            self.fan_out_cut(circuit, false, now, sink);
        }

        // 4. Theft
        for id in triggered {
            warn!("THEFT: vibration on {}", id);
            sink.emit(&AppEvent::TheftDetected { apartment: id });
            self.raise_alarm(id.record().side, now, io, timer, sink);
            self.set_status(SystemStatus::TheftDetected, sink);
            self.fan_out_theft(id, now, sink);
        }

        // 5. Status
        self.recompute_status(sink);

        // 6. Delivery
        if let Some(outcome) = self.queue.process_tick(now, transport) {
            sink.emit(&match outcome {
                DeliveryOutcome::Delivered { message_id } => {
                    AppEvent::NotificationDelivered { message_id }
                }
                DeliveryOutcome::Retrying {
                    failure,
                    retries,
                    next_attempt_at,
                } => AppEvent::NotificationRetrying {
                    failure,
                    retries,
                    next_attempt_at,
                },
                DeliveryOutcome::MaxRetriesExceeded { failure } => {
                    self.last_error = Some(failure.to_string());
                    AppEvent::NotificationDropped { failure }
                }
            });
        }

        // 7. Config persistence
        self.auto_save_if_needed(now, config_store);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.  Validation failures are returned
    /// and also recorded as the last error.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now: u64,
        io: &mut impl DigitalIo,
        timer: &mut impl SirenTimer,
        storage: &mut (impl StoragePort + ConfigPort),
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        let result = self.dispatch(cmd, now, io, timer, storage, sink);
        if let Err(ref e) = result {
            warn!("Command rejected: {}", e);
            self.last_error = Some(e.to_string());
        }
        result
    }

    fn dispatch(
        &mut self,
        cmd: AppCommand,
        now: u64,
        io: &mut impl DigitalIo,
        timer: &mut impl SirenTimer,
        storage: &mut (impl StoragePort + ConfigPort),
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        match cmd {
            AppCommand::EnableSensor(raw) => self.set_sensor(raw, true, storage)?,
            AppCommand::DisableSensor(raw) => self.set_sensor(raw, false, storage)?,
            AppCommand::EnableAllSensors => self.set_all_sensors(true, storage),
            AppCommand::DisableAllSensors => self.set_all_sensors(false, storage),
            AppCommand::ActivateAlarm(raw) => {
                let side = Side::try_from(raw)?;
                self.raise_alarm(side, now, io, timer, sink);
            }
            AppCommand::StopAlarm(raw) => {
                let side = Side::try_from(raw)?;
                if self.alarm.stop(side, StopReason::Manual, io, timer) {
                    sink.emit(&AppEvent::AlarmStopped {
                        side,
                        reason: StopReason::Manual,
                    });
                }
            }
            AppCommand::StopAllAlarms => {
                for side in Side::ALL {
                    if self.alarm.stop(side, StopReason::Manual, io, timer) {
                        sink.emit(&AppEvent::AlarmStopped {
                            side,
                            reason: StopReason::Manual,
                        });
                    }
                }
            }
            AppCommand::SetAlarmDuration(ms) => {
                self.update_config(now, |c| c.alarm_duration_ms = ms)?;
                self.alarm.set_duration(ms);
            }
            AppCommand::SetAlarmInterval(ms) => {
                self.update_config(now, |c| c.alarm_interval_ms = ms)?;
                self.alarm.set_interval(ms, timer);
            }
            AppCommand::SetSettlingTime(ms) => {
                self.update_config(now, |c| c.settling_time_ms = ms)?;
                self.scanner.set_settling_ms(ms);
            }
            AppCommand::ResetCircuit(raw) => {
                let circuit = Circuit::try_from(raw)?;
                let before = self.monitor.reset(circuit);
                sink.emit(&AppEvent::CircuitReset {
                    circuit,
                    was_cut: before.cut,
                });
            }
            AppCommand::ConfigureRecipient {
                apartment,
                token,
                chat_id,
            } => {
                let id = ApartmentId::new(apartment)?;
                let token = validate_token(&token)?;
                let chat_id = validate_chat_id(chat_id)?;
                let saved = self.recipients.configure(id, token, chat_id, storage);
                self.note_storage("recipient", saved);
            }
            AppCommand::RemoveRecipient(raw) => {
                let id = ApartmentId::new(raw)?;
                let saved = self.recipients.remove(id, storage);
                self.note_storage("recipient", saved);
            }
            AppCommand::EnableRecipient(raw) => {
                let id = self.configured_recipient(raw)?;
                let saved = self.recipients.set_enabled(id, true, storage);
                self.note_storage("recipient", saved);
                self.notify(id, MessageTemplate::ServiceEnabled { apartment: id }, now, sink);
            }
            AppCommand::DisableRecipient(raw) => {
                let id = self.configured_recipient(raw)?;
                let saved = self.recipients.set_enabled(id, false, storage);
                self.note_storage("recipient", saved);
                // Still configured, so the farewell goes out.
                self.enqueue_for(id, MessageTemplate::ServiceDisabled { apartment: id }, now, sink, false);
            }
            AppCommand::AnnounceOnline => {
                self.announce_online(now, sink);
            }
            AppCommand::SaveConfig => {
                self.mark_config_dirty(now);
                self.force_save_if_dirty(storage);
            }
            AppCommand::SystemCheck => self.system_check(now, io, sink),
        }
        Ok(())
    }

    /// Storage failures degrade to in-memory state and are only recorded.
    fn note_storage(&mut self, what: &str, result: Result<(), StorageError>) {
        if let Err(e) = result {
            self.last_error = Some(format!("Failed to save {what}: {e}"));
        }
    }

    fn configured_recipient(&self, raw: u8) -> Result<ApartmentId, Error> {
        let id = ApartmentId::new(raw)?;
        if !self.recipients.is_configured(id) {
            return Err(ValidationError::NotConfigured(raw).into());
        }
        Ok(id)
    }

    fn set_sensor(&mut self, raw: u8, on: bool, storage: &mut impl StoragePort) -> Result<(), Error> {
        let id = ApartmentId::new(raw)?;
        let saved = self.scanner.set_enabled(id, on, storage);
        self.note_storage("apartment states", saved);
        Ok(())
    }

    fn set_all_sensors(&mut self, on: bool, storage: &mut impl StoragePort) {
        let saved = self.scanner.set_all_enabled(on, storage);
        self.note_storage("apartment states", saved);
    }

    /// Self-test: list every circuit that is cut (latched or live) without
    /// touching the latches, and chirp each idle siren.  Sounding sides are
    /// skipped; their siren is evidently working.
    fn system_check(&mut self, now: u64, io: &mut impl DigitalIo, sink: &mut impl EventSink) {
        let faulty = self.monitor.inspect(io);
        let mut sirens_chirped = 0;
        for side in Side::ALL {
            if self.alarm.chirp(side, now, io) {
                sirens_chirped += 1;
            }
        }
        if faulty.is_empty() {
            info!("System check passed");
        } else {
            warn!("System check: {} circuit(s) cut", faulty.len());
            self.last_error = Some(format!("System check found {} cut circuit(s)", faulty.len()));
        }
        sink.emit(&AppEvent::SystemCheckCompleted {
            faulty,
            sirens_chirped,
        });
    }

    /// Send the online greeting to every notifiable apartment.
    pub fn announce_online(&mut self, now: u64, sink: &mut impl EventSink) {
        let host = host_name(&self.config.device_hostname, self.config.building_number);
        for id in ApartmentId::all() {
            self.notify(
                id,
                MessageTemplate::SystemOnline {
                    apartment: id,
                    host: host.clone(),
                },
                now,
                sink,
            );
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> SystemStatus {
        self.status
    }

    pub fn is_alarm_active(&self, side: Side) -> bool {
        self.alarm.is_active(side)
    }

    pub fn active_alarm_count(&self) -> usize {
        self.alarm.active_count()
    }

    pub fn circuit_status(&self, circuit: Circuit) -> CircuitStatus {
        self.monitor.status(circuit)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn uptime_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.boot_at)
    }

    /// `None` if no alarm has sounded since boot.
    pub fn last_alarm_age_ms(&self, now: u64) -> Option<u64> {
        self.alarm.last_alarm_at().map(|t| now.saturating_sub(t))
    }

    pub fn is_sensor_enabled(&self, id: ApartmentId) -> bool {
        self.scanner.is_enabled(id)
    }

    pub fn is_sensor_triggered(&self, id: ApartmentId) -> bool {
        self.scanner.is_triggered(id)
    }

    pub fn is_recipient_notifiable(&self, id: ApartmentId) -> bool {
        self.recipients.is_notifiable(id)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    /// Total ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> AlarmConfig {
        self.config.clone()
    }

    pub fn status_report(&self, now: u64) -> StatusReport {
        StatusReport {
            status: self.status,
            circuits: Circuit::ALL.map(|c| (c, self.monitor.status(c))),
            alarms: Side::ALL.map(|s| self.alarm.phase(s)),
            uptime_ms: self.uptime_ms(now),
            last_alarm_age_ms: self.last_alarm_age_ms(now),
            last_error: self.last_error.clone(),
            enabled_sensors: self.scanner.enabled_count(),
            notifiable_recipients: self.recipients.notifiable_count(),
            queue_len: self.queue.len(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn raise_alarm(
        &mut self,
        side: Side,
        now: u64,
        io: &mut impl DigitalIo,
        timer: &mut impl SirenTimer,
        sink: &mut impl EventSink,
    ) {
        if self.alarm.activate(side, now, io, timer) {
            sink.emit(&AppEvent::AlarmActivated { side });
        }
    }

    fn set_status(&mut self, to: SystemStatus, sink: &mut impl EventSink) {
        if self.status != to {
            let from = self.status;
            self.status = to;
            info!("Status: {} -> {}", from, to);
            sink.emit(&AppEvent::StatusChanged { from, to });
        }
    }

    /// While any siren sounds the status set at event time stands.
    fn recompute_status(&mut self, sink: &mut impl EventSink) {
        if self.alarm.active_count() > 0 {
            return;
        }
        let derived = if self.monitor.any_cut() {
            SystemStatus::WireCutDetected
        } else if self.scanner.any_triggered() {
            SystemStatus::TheftDetected
        } else {
            SystemStatus::Normal
        };
        self.set_status(derived, sink);
    }

    fn fan_out_theft(&mut self, id: ApartmentId, now: u64, sink: &mut impl EventSink) {
        self.notify(id, MessageTemplate::TheftOwner, now, sink);
        for n in topology::same_box(id) {
            self.notify(n, MessageTemplate::TheftSameBox { apartment: id }, now, sink);
        }
        for n in topology::adjacent_box(id) {
            self.notify(n, MessageTemplate::TheftAdjacentBox { apartment: id }, now, sink);
        }
        for n in topology::other_side(id) {
            self.notify(n, MessageTemplate::TheftOtherSide { apartment: id }, now, sink);
        }
    }

    /// Runtime cuts alert the whole side; a box harness found cut at boot
    /// only alerts that box.
    fn fan_out_cut(&mut self, circuit: Circuit, at_startup: bool, now: u64, sink: &mut impl EventSink) {
        let (targets, template): (ApartmentList, _) = match (circuit, at_startup) {
            (Circuit::Box { side, .. }, false) => {
                (topology::apartments_on_side(side), MessageTemplate::SensorWireCut)
            }
            (Circuit::Box { side, box_pos }, true) => (
                topology::apartments_in_box(side, box_pos),
                MessageTemplate::StartupSensorWireCut,
            ),
            (Circuit::Distribution(side), false) => {
                (topology::apartments_on_side(side), MessageTemplate::DistributionWireCut)
            }
            (Circuit::Distribution(side), true) => (
                topology::apartments_on_side(side),
                MessageTemplate::StartupDistributionWireCut,
            ),
        };
        for id in targets {
            self.notify(id, template.clone(), now, sink);
        }
    }

    fn notify(&mut self, to: ApartmentId, template: MessageTemplate, now: u64, sink: &mut impl EventSink) {
        self.enqueue_for(to, template, now, sink, true);
    }

    fn enqueue_for(
        &mut self,
        to: ApartmentId,
        template: MessageTemplate,
        now: u64,
        sink: &mut impl EventSink,
        require_enabled: bool,
    ) {
        let rec = self.recipients.get(to);
        let eligible = if require_enabled {
            rec.is_notifiable()
        } else {
            rec.configured
        };
        if !eligible {
            return;
        }
        let kind = template.kind();
        match self
            .queue
            .enqueue(&rec.token, rec.chat_id, template.render_bilingual(), now)
        {
            Ok(_) => sink.emit(&AppEvent::NotificationQueued { apartment: to, kind }),
            Err(e) => {
                self.last_error = Some(e.to_string());
                sink.emit(&AppEvent::NotificationRejected { apartment: to, kind });
            }
        }
    }

    /// Validate a candidate config, then adopt it and mark it dirty.
    fn update_config(&mut self, now: u64, change: impl FnOnce(&mut AlarmConfig)) -> Result<(), Error> {
        let mut candidate = self.config.clone();
        change(&mut candidate);
        candidate.validate().map_err(|e| match e {
            ConfigError::ValidationFailed(msg) => Error::Config(msg),
            _ => Error::Config("invalid configuration"),
        })?;
        self.config = candidate;
        self.mark_config_dirty(now);
        Ok(())
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.  The save window restarts on every change.
    pub fn mark_config_dirty(&mut self, now: u64) {
        self.config_dirty = true;
        self.dirty_since = now;
    }

    /// Save once the config has been quiet for [`AUTO_SAVE_DELAY_MS`].
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, now: u64, store: &impl ConfigPort) -> bool {
        if !self.config_dirty || now.saturating_sub(self.dirty_since) < AUTO_SAVE_DELAY_MS {
            return false;
        }
        let saved = self.save_config(store);
        if !saved {
            // Wait a full quiet period before the next attempt.
            self.dirty_since = now;
        }
        saved
    }

    /// Save now if dirty (explicit request, or before a planned restart).
    pub fn force_save_if_dirty(&mut self, store: &impl ConfigPort) -> bool {
        self.config_dirty && self.save_config(store)
    }

    /// A failed save stays dirty and is retried on the next check.
    fn save_config(&mut self, store: &impl ConfigPort) -> bool {
        match store.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config save failed: {}", e);
                self.last_error = Some(format!("Failed to save config: {e}"));
                false
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
