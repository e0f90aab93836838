//! Integration tests for the AppService pipeline: detection → siren →
//! fan-out → status, driven entirely through mock adapters.

use embedded_hal::digital::PinState;

use meterguard::app::commands::AppCommand;
use meterguard::app::events::{AppEvent, SystemStatus};
use meterguard::app::ports::{Clock, Line, StorageError};
use meterguard::error::{Error, ValidationError};
use meterguard::notify::templates::TemplateKind;
use meterguard::scanner::{ENABLE_KEY, ENABLE_NAMESPACE};
use meterguard::topology::{ApartmentId, BoxPosition, Side};
use meterguard::wire_monitor::Circuit;

use crate::mock_hw::{Rig, chat_for, token_for};

const SIDE_A: [u8; 12] = [1, 5, 9, 13, 17, 21, 2, 6, 10, 14, 18, 22];
const SIDE_B: [u8; 12] = [3, 7, 11, 15, 19, 23, 4, 8, 12, 16, 20, 24];

fn apt(raw: u8) -> ApartmentId {
    ApartmentId::new(raw).unwrap()
}

/// Start, then tick through side A's settling so the next tick samples.
fn started_rig() -> Rig {
    let mut rig = Rig::new();
    rig.seed_all_recipients();
    rig.seed_all_sensors();
    rig.start();
    rig.tick();
    rig
}

// ── Theft ─────────────────────────────────────────────────────

#[test]
fn theft_fans_out_four_ways_and_sounds_the_side() {
    let mut rig = started_rig();

    // Apartment 5: side A, left box, first floor → shared line 1.
    rig.io.set(Line::Vibration(1), PinState::High);
    rig.tick_after(100);

    assert!(rig.sink.events.contains(&AppEvent::TheftDetected { apartment: apt(5) }));
    assert!(rig.sink.events.contains(&AppEvent::AlarmActivated { side: Side::A }));
    assert_eq!(rig.app.status(), SystemStatus::TheftDetected);
    assert!(rig.app.is_sensor_triggered(apt(5)));

    assert_eq!(rig.queued(TemplateKind::TheftOwner), vec![5]);
    assert_eq!(rig.queued(TemplateKind::TheftSameBox), vec![1, 9, 13, 17, 21]);
    assert_eq!(rig.queued(TemplateKind::TheftAdjacentBox), vec![2, 6, 10, 14, 18, 22]);
    assert_eq!(rig.queued(TemplateKind::TheftOtherSide), SIDE_B.to_vec());

    // The owner's alert went out in the same tick.
    assert_eq!(rig.transport.sent.len(), 1);
    assert_eq!(rig.transport.sent[0].chat_id, chat_for(5));
    assert_eq!(rig.transport.sent[0].token, token_for(5));
    assert_eq!(rig.app.queue_len(), 23);

    assert_eq!(rig.io.last_write(Line::Siren(Side::A)), Some(PinState::Low));
    assert_eq!(rig.timer.interval(Side::A), Some(1_000));
    assert!(!rig.app.is_alarm_active(Side::B));
}

#[test]
fn theft_on_shared_line_only_reports_the_powered_side() {
    let mut rig = started_rig();

    // Line 1 is shared by apartment 5 (A) and apartment 7 (B).
    rig.io.set(Line::Vibration(1), PinState::High);
    rig.tick_after(100);

    let thefts: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::TheftDetected { apartment } => Some(apartment.get()),
            _ => None,
        })
        .collect();
    assert_eq!(thefts, vec![5]);
    assert!(!rig.app.is_sensor_triggered(apt(7)));
}

#[test]
fn unconfigured_recipients_are_skipped() {
    let mut rig = Rig::new();
    rig.seed_recipient(5);
    rig.seed_recipient(3);
    rig.seed_all_sensors();
    rig.start();
    rig.tick();

    rig.io.set(Line::Vibration(1), PinState::High);
    rig.tick_after(100);

    assert_eq!(rig.queued(TemplateKind::TheftOwner), vec![5]);
    assert!(rig.queued(TemplateKind::TheftSameBox).is_empty());
    assert_eq!(rig.queued(TemplateKind::TheftOtherSide), vec![3]);
}

// ── Wire cuts ─────────────────────────────────────────────────

#[test]
fn startup_box_cut_alerts_only_that_box_and_stays_silent() {
    let mut rig = Rig::new();
    rig.seed_all_recipients();
    let circuit = Circuit::Box {
        side: Side::A,
        box_pos: BoxPosition::Right,
    };
    rig.io.set(Line::Circuit(circuit), PinState::High);
    rig.start();

    assert!(rig.sink.events.contains(&AppEvent::WireCutDetected {
        circuit,
        at_startup: true
    }));
    assert!(rig.sink.events.contains(&AppEvent::Started { cut_circuits: 1 }));
    assert_eq!(
        rig.queued(TemplateKind::StartupSensorWireCut),
        vec![2, 6, 10, 14, 18, 22]
    );
    assert!(rig.queued(TemplateKind::SensorWireCut).is_empty());
    assert_eq!(rig.app.status(), SystemStatus::WireCutDetected);
    assert!(rig.timer.calls.is_empty(), "no siren for a cut found at boot");

    let st = rig.app.circuit_status(circuit);
    assert!(st.cut);
    assert!(!st.monitoring_enabled);

    // Latched: later ticks do not report it again.
    rig.tick();
    rig.tick_after(10);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::WireCutDetected { .. })),
        1
    );
    assert!(!rig.app.is_alarm_active(Side::A));
}

#[test]
fn startup_distribution_cut_alerts_the_whole_side() {
    let mut rig = Rig::new();
    rig.seed_all_recipients();
    rig.io
        .set(Line::Circuit(Circuit::Distribution(Side::B)), PinState::High);
    rig.start();

    assert_eq!(
        rig.queued(TemplateKind::StartupDistributionWireCut),
        SIDE_B.to_vec()
    );
    assert!(rig.queued(TemplateKind::DistributionWireCut).is_empty());
}

#[test]
fn runtime_box_cut_sounds_and_alerts_the_side() {
    let mut rig = started_rig();
    let circuit = Circuit::Box {
        side: Side::A,
        box_pos: BoxPosition::Left,
    };
    rig.io.set(Line::Circuit(circuit), PinState::High);
    rig.tick_after(10);

    assert!(rig.sink.events.contains(&AppEvent::WireCutDetected {
        circuit,
        at_startup: false
    }));
    assert!(rig.app.is_alarm_active(Side::A));
    assert_eq!(rig.queued(TemplateKind::SensorWireCut), SIDE_A.to_vec());
    assert!(rig.queued(TemplateKind::StartupSensorWireCut).is_empty());
    assert_eq!(rig.app.status(), SystemStatus::WireCutDetected);
}

#[test]
fn runtime_distribution_cut_sounds_its_side() {
    let mut rig = started_rig();
    rig.io
        .set(Line::Circuit(Circuit::Distribution(Side::B)), PinState::High);
    rig.tick_after(10);

    assert!(rig.sink.events.contains(&AppEvent::AlarmActivated { side: Side::B }));
    assert!(!rig.app.is_alarm_active(Side::A));
    assert_eq!(rig.queued(TemplateKind::DistributionWireCut), SIDE_B.to_vec());
}

// ── Status precedence ─────────────────────────────────────────

#[test]
fn status_follows_events_then_precedence_once_sirens_stop() {
    let mut rig = Rig::new();
    rig.seed_all_sensors();
    rig.start();
    rig.tick();

    rig.io
        .set(Line::Circuit(Circuit::Distribution(Side::B)), PinState::High);
    rig.tick_after(10);
    assert_eq!(rig.app.status(), SystemStatus::WireCutDetected);

    // A later theft overrides the status while sirens sound.
    rig.io.set(Line::Vibration(1), PinState::High);
    rig.tick_after(90);
    rig.io.set(Line::Vibration(1), PinState::Low);
    assert_eq!(rig.app.status(), SystemStatus::TheftDetected);

    // Side B expires first; side A still sounds, so nothing is recomputed.
    rig.run_until(20_050, 50);
    assert!(!rig.app.is_alarm_active(Side::B));
    assert!(rig.app.is_alarm_active(Side::A));
    assert_eq!(rig.app.status(), SystemStatus::TheftDetected);

    // Both silent: the latched cut outranks the theft.
    rig.tick_after(50);
    assert_eq!(rig.app.active_alarm_count(), 0);
    assert_eq!(rig.app.status(), SystemStatus::WireCutDetected);
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::AlarmStopped {
                reason: meterguard::alarm::StopReason::DurationElapsed,
                ..
            }
        )),
        2
    );

    // Repair and reset the circuit.
    rig.io
        .set(Line::Circuit(Circuit::Distribution(Side::B)), PinState::Low);
    rig.command(AppCommand::ResetCircuit(5)).unwrap();
    rig.tick_after(10);
    assert_eq!(rig.app.status(), SystemStatus::Normal);
    assert!(rig.sink.events.contains(&AppEvent::StatusChanged {
        from: SystemStatus::WireCutDetected,
        to: SystemStatus::Normal,
    }));
}

// ── Circuit reset ─────────────────────────────────────────────

#[test]
fn reset_is_audited_and_validated() {
    let mut rig = started_rig();

    assert_eq!(
        rig.command(AppCommand::ResetCircuit(9)),
        Err(Error::Validation(ValidationError::InvalidCircuit(9)))
    );
    assert_eq!(rig.app.last_error(), Some("Invalid circuit: 9"));

    rig.command(AppCommand::ResetCircuit(1)).unwrap();
    assert!(rig.sink.events.contains(&AppEvent::CircuitReset {
        circuit: Circuit::Box {
            side: Side::A,
            box_pos: BoxPosition::Right
        },
        was_cut: false,
    }));
}

#[test]
fn reset_rearms_a_circuit_that_is_still_cut() {
    let mut rig = started_rig();
    let circuit = Circuit::Distribution(Side::A);
    rig.io.set(Line::Circuit(circuit), PinState::High);
    rig.tick_after(10);

    rig.command(AppCommand::ResetCircuit(4)).unwrap();
    assert!(!rig.app.circuit_status(circuit).cut);
    rig.tick_after(10);

    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::WireCutDetected { .. })),
        2
    );
}

// ── Sensor enable map ─────────────────────────────────────────

#[test]
fn fresh_unit_watches_nothing() {
    let mut rig = Rig::new();
    rig.seed_all_recipients();
    rig.start();
    assert!(ApartmentId::all().all(|id| !rig.app.is_sensor_enabled(id)));

    for id in ApartmentId::all() {
        rig.io.set(Line::Vibration(id.record().shared_line), PinState::High);
    }
    rig.run_until(1_000, 50);

    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::TheftDetected { .. })), 0);
    assert_eq!(rig.app.active_alarm_count(), 0);
    assert_eq!(rig.app.queue_len(), 0);
}

#[test]
fn disabled_sensor_is_ignored_and_the_map_persists() {
    let mut rig = Rig::new();
    rig.seed_all_sensors();
    rig.start();
    rig.command(AppCommand::DisableSensor(5)).unwrap();

    // Apartment 5 is table index 1.
    assert_eq!(rig.nvs.raw(ENABLE_NAMESPACE, ENABLE_KEY), Some(&[0xFD, 0xFF, 0xFF][..]));

    rig.tick();
    rig.io.set(Line::Vibration(1), PinState::High);
    rig.tick_after(100);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::TheftDetected { .. })), 0);
    assert!(!rig.app.is_sensor_enabled(apt(5)));

    // The next boot picks the map up.
    let mut next = Rig::new();
    next.nvs = rig.nvs;
    next.start();
    assert!(!next.app.is_sensor_enabled(apt(5)));
    assert!(next.app.is_sensor_enabled(apt(1)));
}

#[test]
fn side_without_enabled_sensors_is_never_powered() {
    let mut rig = Rig::new();
    rig.start();
    rig.command(AppCommand::DisableAllSensors).unwrap();
    rig.command(AppCommand::EnableSensor(3)).unwrap();

    rig.tick();
    rig.tick_after(10);

    assert!(
        !rig.io
            .writes
            .contains(&(Line::SidePower(Side::A), PinState::Low))
    );
    assert_eq!(rig.io.last_write(Line::SidePower(Side::B)), Some(PinState::Low));
}

#[test]
fn sensor_commands_reject_bad_apartments() {
    let mut rig = Rig::new();
    rig.start();
    assert_eq!(
        rig.command(AppCommand::DisableSensor(0)),
        Err(Error::Validation(ValidationError::InvalidApartment(0)))
    );
    assert_eq!(
        rig.command(AppCommand::EnableSensor(25)),
        Err(Error::Validation(ValidationError::InvalidApartment(25)))
    );
    assert_eq!(rig.app.last_error(), Some("Invalid apartment number: 25"));
}

#[test]
fn storage_failure_keeps_the_in_memory_change() {
    let mut rig = Rig::new();
    rig.seed_all_sensors();
    rig.start();
    rig.nvs.fail_writes = Some(StorageError::Full);

    rig.command(AppCommand::DisableSensor(2)).unwrap();
    assert!(!rig.app.is_sensor_enabled(apt(2)));
    assert_eq!(
        rig.app.last_error(),
        Some("Failed to save apartment states: partition full")
    );
}

// ── Recipients ────────────────────────────────────────────────

#[test]
fn recipient_lifecycle_sends_enable_and_disable_notices() {
    let mut rig = Rig::new();
    rig.start();

    rig.command(AppCommand::ConfigureRecipient {
        apartment: 3,
        token: token_for(3),
        chat_id: chat_for(3),
    })
    .unwrap();
    assert!(!rig.app.is_recipient_notifiable(apt(3)));

    rig.command(AppCommand::EnableRecipient(3)).unwrap();
    assert!(rig.app.is_recipient_notifiable(apt(3)));
    assert_eq!(rig.queued(TemplateKind::ServiceEnabled), vec![3]);

    rig.command(AppCommand::DisableRecipient(3)).unwrap();
    assert!(!rig.app.is_recipient_notifiable(apt(3)));
    assert_eq!(rig.queued(TemplateKind::ServiceDisabled), vec![3]);

    // Both notices reach the apartment, 500 ms apart.
    rig.tick();
    rig.tick_after(500);
    assert_eq!(rig.transport.sent.len(), 2);
    assert!(rig.transport.sent.iter().all(|m| m.chat_id == chat_for(3)));
    assert!(rig.transport.sent[1].text.contains("deactivated"));
}

#[test]
fn recipient_write_failure_is_recorded() {
    let mut rig = Rig::new();
    rig.start();
    rig.nvs.fail_writes = Some(StorageError::Full);

    rig.command(AppCommand::ConfigureRecipient {
        apartment: 6,
        token: token_for(6),
        chat_id: chat_for(6),
    })
    .unwrap();
    assert_eq!(
        rig.app.last_error(),
        Some("Failed to save recipient: partition full")
    );

    // Usable for this boot even though flash refused it.
    rig.command(AppCommand::EnableRecipient(6)).unwrap();
    assert!(rig.app.is_recipient_notifiable(apt(6)));

    // Nothing reached flash, so the next boot has no recipient.
    let mut next = Rig::new();
    next.nvs = rig.nvs;
    next.nvs.fail_writes = None;
    next.start();
    assert!(!next.app.is_recipient_notifiable(apt(6)));
}

#[test]
fn recipient_commands_validate_input() {
    let mut rig = Rig::new();
    rig.start();

    assert_eq!(
        rig.command(AppCommand::EnableRecipient(4)),
        Err(Error::Validation(ValidationError::NotConfigured(4)))
    );
    assert_eq!(
        rig.command(AppCommand::ConfigureRecipient {
            apartment: 4,
            token: "short".into(),
            chat_id: 1,
        }),
        Err(Error::Validation(ValidationError::InvalidToken))
    );
    assert_eq!(
        rig.command(AppCommand::ConfigureRecipient {
            apartment: 4,
            token: token_for(4),
            chat_id: 0,
        }),
        Err(Error::Validation(ValidationError::InvalidChatId))
    );
    assert!(rig.sink.count(|e| matches!(e, AppEvent::NotificationQueued { .. })) == 0);
}

#[test]
fn removed_recipient_stays_removed_after_reboot() {
    let mut rig = Rig::new();
    rig.seed_recipient(8);
    rig.start();
    assert!(rig.app.is_recipient_notifiable(apt(8)));

    rig.command(AppCommand::RemoveRecipient(8)).unwrap();
    assert!(!rig.app.is_recipient_notifiable(apt(8)));

    let mut next = Rig::new();
    next.nvs = rig.nvs;
    next.start();
    assert!(!next.app.is_recipient_notifiable(apt(8)));
}

#[test]
fn announce_online_greets_every_notifiable_apartment() {
    let mut rig = Rig::new();
    rig.seed_recipient(1);
    rig.seed_recipient(2);
    rig.start();

    rig.command(AppCommand::AnnounceOnline).unwrap();
    assert_eq!(rig.queued(TemplateKind::SystemOnline), vec![1, 2]);

    rig.tick();
    let text = &rig.transport.sent[0].text;
    assert!(text.contains("Hello Apartment 1!"));
    assert!(text.contains("http://watermeter-Building-1.local"));
}

// ── Config ────────────────────────────────────────────────────

#[test]
fn setters_validate_and_auto_save_after_quiet_period() {
    let mut rig = Rig::new();
    rig.start();
    rig.clock.advance(1_000);

    rig.command(AppCommand::SetAlarmDuration(30_000)).unwrap();
    assert!(rig.app.is_config_dirty());

    assert!(matches!(
        rig.command(AppCommand::SetAlarmInterval(40)),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        rig.command(AppCommand::SetSettlingTime(5_000)),
        Err(Error::Config(_))
    ));

    assert!(!rig.app.auto_save_if_needed(5_999, &rig.nvs));
    assert!(rig.app.auto_save_if_needed(6_000, &rig.nvs));
    assert!(!rig.app.is_config_dirty());

    let saved = rig.nvs.saved_configs();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].alarm_duration_ms, 30_000);
    assert_eq!(saved[0].alarm_interval_ms, 1_000);
}

#[test]
fn ticking_saves_the_config_once_it_settles() {
    let mut rig = Rig::new();
    rig.start();

    rig.command(AppCommand::SetAlarmInterval(500)).unwrap();
    rig.run_until(4_950, 50);
    assert!(rig.nvs.saved_configs().is_empty());
    assert!(rig.app.is_config_dirty());

    rig.tick_after(50);
    assert!(!rig.app.is_config_dirty());
    let saved = rig.nvs.saved_configs();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].alarm_interval_ms, 500);

    // Clean config: further ticks write nothing.
    rig.run_until(20_000, 500);
    assert_eq!(rig.nvs.saved_configs().len(), 1);
}

#[test]
fn save_config_writes_without_waiting() {
    let mut rig = Rig::new();
    rig.start();
    rig.command(AppCommand::SetAlarmDuration(45_000)).unwrap();

    rig.command(AppCommand::SaveConfig).unwrap();
    let saved = rig.nvs.saved_configs();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].alarm_duration_ms, 45_000);
    assert!(!rig.app.is_config_dirty());

    // Nothing left for the quiet period to write.
    rig.run_until(10_000, 500);
    assert_eq!(rig.nvs.saved_configs().len(), 1);
}

// ── System check ──────────────────────────────────────────────

#[test]
fn system_check_reports_cuts_and_chirps_each_siren() {
    let mut rig = started_rig();
    let circuit = Circuit::Box {
        side: Side::B,
        box_pos: BoxPosition::Left,
    };
    rig.io.set(Line::Circuit(circuit), PinState::High);

    rig.command(AppCommand::SystemCheck).unwrap();

    let report = rig.sink.events.iter().find_map(|e| match e {
        AppEvent::SystemCheckCompleted {
            faulty,
            sirens_chirped,
        } => Some((faulty.clone(), *sirens_chirped)),
        _ => None,
    });
    let (faulty, chirped) = report.expect("check reported");
    assert_eq!(faulty.as_slice(), &[circuit]);
    assert_eq!(chirped, 2);
    assert_eq!(rig.app.last_error(), Some("System check found 1 cut circuit(s)"));

    // Looking is not latching.
    assert!(!rig.app.circuit_status(circuit).cut);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::WireCutDetected { .. })), 0);

    // Both sirens sound without a timer, then fall silent.
    assert_eq!(rig.io.last_write(Line::Siren(Side::A)), Some(PinState::Low));
    assert_eq!(rig.io.last_write(Line::Siren(Side::B)), Some(PinState::Low));
    assert!(rig.timer.calls.is_empty());
    assert_eq!(rig.app.active_alarm_count(), 0);

    rig.io.set(Line::Circuit(circuit), PinState::Low);
    rig.tick_after(100);
    assert_eq!(rig.io.last_write(Line::Siren(Side::A)), Some(PinState::High));
    assert_eq!(rig.io.last_write(Line::Siren(Side::B)), Some(PinState::High));
}

#[test]
fn system_check_leaves_a_sounding_side_alone() {
    let mut rig = started_rig();
    rig.command(AppCommand::ActivateAlarm(1)).unwrap();
    rig.sink.clear();

    rig.command(AppCommand::SystemCheck).unwrap();
    assert!(rig.sink.events.contains(&AppEvent::SystemCheckCompleted {
        faulty: Default::default(),
        sirens_chirped: 1,
    }));
    assert!(rig.app.is_alarm_active(Side::B));
    assert_eq!(rig.app.last_error(), None);
}

#[test]
fn status_report_lists_circuits_and_alarms() {
    let mut rig = Rig::new();
    let circuit = Circuit::Box {
        side: Side::A,
        box_pos: BoxPosition::Right,
    };
    rig.io.set(Line::Circuit(circuit), PinState::High);
    rig.start();
    rig.command(AppCommand::ActivateAlarm(1)).unwrap();
    rig.clock.advance(3_723_000);

    let text = rig.app.status_report(rig.clock.now_ms()).to_string();
    assert!(text.contains("System status: Wire Cut Detected"));
    assert!(text.contains("side A right box harness: Cut"));
    assert!(text.contains("side B distribution link: OK"));
    assert!(text.contains("Side A alarm: Inactive"));
    assert!(text.contains("Side B alarm: Active"));
    assert!(text.contains("Uptime: 1h 02m 03s"));
    assert!(text.contains("Last error: none"));
}
