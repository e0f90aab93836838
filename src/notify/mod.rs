//! Bounded, retrying notification delivery.
//!
//! Alerts are rendered at event time and parked in a fixed 50-slot ring
//! buffer.  The main loop calls [`NotificationQueue::process_tick`] once per
//! iteration; each call makes at most one send attempt, always for the head
//! entry, so ordering is strict FIFO and a head waiting out its backoff
//! blocks the entries behind it.
//!
//! ## Retry policy
//!
//! | failure            | next attempt                          |
//! |--------------------|---------------------------------------|
//! | rate limited       | `now + retry_after` (provider value)  |
//! | anything else      | `now + base * 2^retries`              |
//!
//! `retries` is incremented before the delay is computed; once it reaches
//! the cap the entry is dropped.

pub mod recipients;
pub mod response;
pub mod templates;

use heapless::Deque;
use log::{debug, error, info, warn};

use crate::app::ports::MessageTransport;
use crate::config::AlarmConfig;
use crate::error::{DeliveryOutcome, EnqueueOutcome, QueueError, SendFailure};

use self::recipients::BotToken;

pub const QUEUE_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNotification {
    pub token: BotToken,
    pub chat_id: i64,
    pub body: String,
    pub retries: u8,
    pub next_attempt_at: u64,
}

impl QueuedNotification {
    fn same_message(&self, token: &str, chat_id: i64, body: &str) -> bool {
        self.chat_id == chat_id && self.token.as_str() == token && self.body == body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub min_interval_ms: u32,
    pub base_delay_ms: u32,
    pub max_retries: u8,
    pub default_retry_after_secs: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &AlarmConfig) -> Self {
        Self {
            min_interval_ms: config.notify_min_interval_ms,
            base_delay_ms: config.notify_retry_base_ms,
            max_retries: config.notify_max_retries,
            default_retry_after_secs: config.default_retry_after_secs,
        }
    }

    /// Delay before the next attempt, given the already-incremented count.
    pub fn delay_ms(&self, failure: &SendFailure, retries: u8) -> u64 {
        match failure {
            SendFailure::RateLimited { retry_after_secs } => u64::from(*retry_after_secs) * 1000,
            _ => {
                let factor = 1u64.checked_shl(u32::from(retries)).unwrap_or(u64::MAX);
                u64::from(self.base_delay_ms).saturating_mul(factor)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AlarmConfig::default())
    }
}

pub struct NotificationQueue {
    entries: Deque<QueuedNotification, QUEUE_CAPACITY>,
    policy: RetryPolicy,
    last_attempt_at: Option<u64>,
}

impl NotificationQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            entries: Deque::new(),
            policy,
            last_attempt_at: None,
        }
    }

    /// Park a message.  The capacity check comes first, so a full queue
    /// reports [`QueueError::QueueFull`] even for a duplicate.
    pub fn enqueue(
        &mut self,
        token: &str,
        chat_id: i64,
        body: String,
        now: u64,
    ) -> Result<EnqueueOutcome, QueueError> {
        if self.entries.is_full() {
            error!("Notify: queue full ({} entries), message dropped", QUEUE_CAPACITY);
            return Err(QueueError::QueueFull);
        }
        if self
            .entries
            .iter()
            .any(|e| e.same_message(token, chat_id, &body))
        {
            debug!("Notify: duplicate for chat {} suppressed", chat_id);
            return Ok(EnqueueOutcome::DuplicateSuppressed);
        }
        let mut tok = BotToken::new();
        tok.push_str(token).map_err(|()| QueueError::TokenTooLong)?;
        self.entries
            .push_back(QueuedNotification {
                token: tok,
                chat_id,
                body,
                retries: 0,
                next_attempt_at: now,
            })
            .map_err(|_| QueueError::QueueFull)?;
        Ok(EnqueueOutcome::Queued)
    }

    /// One non-blocking delivery step.  Returns `None` when nothing was
    /// attempted.
    pub fn process_tick(
        &mut self,
        now: u64,
        transport: &mut impl MessageTransport,
    ) -> Option<DeliveryOutcome> {
        let head = self.entries.front()?;
        if let Some(last) = self.last_attempt_at {
            if now.saturating_sub(last) < u64::from(self.policy.min_interval_ms) {
                return None;
            }
        }
        if now < head.next_attempt_at {
            return None;
        }

        self.last_attempt_at = Some(now);
        let result = transport.send(&head.token, head.chat_id, &head.body);

        match result {
            Ok(message_id) => {
                self.entries.pop_front();
                info!("Notify: delivered (message_id={}, {} pending)", message_id, self.entries.len());
                Some(DeliveryOutcome::Delivered { message_id })
            }
            Err(raw) => {
                let failure = response::classify(&raw, self.policy.default_retry_after_secs);
                let policy = self.policy;
                let head = self.entries.front_mut()?;
                head.retries = head.retries.saturating_add(1);
                if head.retries >= policy.max_retries {
                    let chat_id = head.chat_id;
                    self.entries.pop_front();
                    error!("Notify: giving up on chat {} after {} attempts: {}", chat_id, policy.max_retries, failure);
                    return Some(DeliveryOutcome::MaxRetriesExceeded { failure });
                }
                let next_attempt_at = now.saturating_add(policy.delay_ms(&failure, head.retries));
                head.next_attempt_at = next_attempt_at;
                warn!("Notify: attempt {} failed ({}), retry at {} ms", head.retries, failure, next_attempt_at);
                Some(DeliveryOutcome::Retrying {
                    failure,
                    retries: head.retries,
                    next_attempt_at,
                })
            }
        }
    }

    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn front(&self) -> Option<&QueuedNotification> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedNotification> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
