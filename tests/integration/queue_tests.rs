//! Notification delivery through the service: spacing, head-of-line
//! blocking, provider back-pressure and overflow.

use embedded_hal::digital::PinState;

use meterguard::app::events::AppEvent;
use meterguard::app::ports::Line;
use meterguard::error::{EnqueueOutcome, QueueError, SendFailure};
use meterguard::notify::{NotificationQueue, RetryPolicy};
use meterguard::topology::{BoxPosition, Side};
use meterguard::wire_monitor::Circuit;

use crate::mock_hw::{MockTransport, Rig, chat_for, token_for};

const RATE_LIMITED: &str = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#;
const UNAUTHORIZED: &str = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#;

/// Theft on apartment 5 at t=100 with every recipient configured.  The
/// vibration line drops straight away so nothing re-triggers.
fn rig_after_theft(script: &[&str]) -> Rig {
    let mut rig = Rig::new();
    rig.seed_all_recipients();
    rig.seed_all_sensors();
    for raw in script {
        rig.transport.push_failure(raw);
    }
    rig.start();
    rig.tick();
    rig.io.set(Line::Vibration(1), PinState::High);
    rig.tick_after(100);
    rig.io.set(Line::Vibration(1), PinState::Low);
    rig
}

#[test]
fn sends_are_spaced_and_fifo() {
    let mut rig = rig_after_theft(&[]);
    assert_eq!(rig.transport.sent.len(), 1);

    rig.run_until(590, 10);
    assert_eq!(rig.transport.sent.len(), 1);

    rig.tick_after(10);
    assert_eq!(rig.transport.sent.len(), 2);
    // Owner first, then the same-box neighbours in table order.
    assert_eq!(rig.transport.sent[0].chat_id, chat_for(5));
    assert_eq!(rig.transport.sent[1].chat_id, chat_for(1));
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::NotificationDelivered { .. })),
        2
    );
}

#[test]
fn rate_limit_delay_is_honoured_and_blocks_the_queue() {
    let mut rig = rig_after_theft(&[RATE_LIMITED]);

    assert!(rig.sink.events.contains(&AppEvent::NotificationRetrying {
        failure: SendFailure::RateLimited {
            retry_after_secs: 7
        },
        retries: 1,
        next_attempt_at: 7_100,
    }));

    rig.run_until(7_090, 10);
    assert_eq!(rig.transport.sent.len(), 1, "head waits; nothing behind it goes");

    rig.tick_after(10);
    assert_eq!(rig.transport.sent.len(), 2);
    assert_eq!(rig.transport.sent[1].chat_id, chat_for(5));
}

#[test]
fn persistent_failure_is_dropped_after_three_attempts() {
    let mut rig = rig_after_theft(&[UNAUTHORIZED, UNAUTHORIZED, UNAUTHORIZED]);

    rig.run_until(1_100, 100);
    assert_eq!(rig.transport.sent.len(), 3);
    assert!(rig.transport.sent.iter().all(|m| m.chat_id == chat_for(5)));

    let retries: Vec<(u8, u64)> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::NotificationRetrying {
                retries,
                next_attempt_at,
                ..
            } => Some((*retries, *next_attempt_at)),
            _ => None,
        })
        .collect();
    // 100 + 200, then 600 + 400.
    assert_eq!(retries, vec![(1, 300), (2, 1_000)]);
    assert!(rig.sink.events.contains(&AppEvent::NotificationDropped {
        failure: SendFailure::Unauthorized
    }));
    assert_eq!(rig.app.last_error(), Some("Invalid bot token"));
    assert_eq!(rig.app.queue_len(), 23);

    // The queue moves on.
    rig.run_until(1_600, 100);
    assert_eq!(rig.transport.sent.len(), 4);
    assert_eq!(rig.transport.sent[3].chat_id, chat_for(1));
}

#[test]
fn overflow_is_rejected_and_recorded() {
    let mut rig = rig_after_theft(&[]);
    assert_eq!(rig.app.queue_len(), 23);

    for circuit in [Circuit::Distribution(Side::A), Circuit::Distribution(Side::B)] {
        rig.io.set(Line::Circuit(circuit), PinState::High);
    }
    rig.tick_after(10);
    assert_eq!(rig.app.queue_len(), 47);

    for side in Side::ALL {
        let circuit = Circuit::Box {
            side,
            box_pos: BoxPosition::Left,
        };
        rig.io.set(Line::Circuit(circuit), PinState::High);
    }
    rig.tick_after(10);

    assert_eq!(rig.app.queue_len(), 50);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::NotificationRejected { .. })),
        21
    );
    assert_eq!(rig.app.last_error(), Some("Message queue is full"));
}

// ── Queue on its own ──────────────────────────────────────────

#[test]
fn duplicate_is_accepted_again_once_delivered() {
    let mut q = NotificationQueue::new(RetryPolicy::default());
    let mut transport = MockTransport::new();
    let token = token_for(1);

    assert_eq!(
        q.enqueue(&token, 7, "hello".into(), 0),
        Ok(EnqueueOutcome::Queued)
    );
    assert_eq!(
        q.enqueue(&token, 7, "hello".into(), 0),
        Ok(EnqueueOutcome::DuplicateSuppressed)
    );
    assert_eq!(q.len(), 1);

    q.process_tick(0, &mut transport);
    assert!(q.is_empty());
    assert_eq!(
        q.enqueue(&token, 7, "hello".into(), 10),
        Ok(EnqueueOutcome::Queued)
    );
}

#[test]
fn full_queue_rejects_even_duplicates() {
    let mut q = NotificationQueue::new(RetryPolicy::default());
    let token = token_for(2);
    for i in 0..50 {
        q.enqueue(&token, 9, format!("alert {i}"), 0).unwrap();
    }
    assert_eq!(
        q.enqueue(&token, 9, "alert 0".into(), 0),
        Err(QueueError::QueueFull)
    );
    assert_eq!(
        q.enqueue(&token, 9, "alert 50".into(), 0),
        Err(QueueError::QueueFull)
    );
}
