//! Unified error types for the MeterGuard firmware.
//!
//! Every boundary failure funnels into [`Error`] so command handlers can
//! record a single human-readable "last error".  Detection and actuation
//! paths never produce errors; only input validation, the notification
//! queue and the delivery transport do.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Input rejected at the command boundary.
    Validation(ValidationError),
    /// The notification queue refused an entry.
    Queue(QueueError),
    /// Configuration is invalid or could not be persisted.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Queue(e) => write!(f, "{e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Apartment identifier outside `1..=24`.
    InvalidApartment(u8),
    /// Side index other than 0 (A) or 1 (B).
    InvalidSide(u8),
    /// Box index other than 0 (left) or 1 (right).
    InvalidBox(u8),
    /// Bot token failed the shape check.
    InvalidToken,
    /// Chat identifier was zero.
    InvalidChatId,
    /// Recipient has no stored credentials.
    NotConfigured(u8),
    /// Circuit index outside the six monitored circuits.
    InvalidCircuit(u8),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidApartment(id) => write!(f, "Invalid apartment number: {id}"),
            Self::InvalidSide(s) => write!(f, "Invalid side: {s}"),
            Self::InvalidBox(b) => write!(f, "Invalid box: {b}"),
            Self::InvalidToken => write!(f, "Invalid bot token format"),
            Self::InvalidChatId => write!(f, "Invalid chat ID"),
            Self::NotConfigured(id) => write!(f, "Apartment {id} is not configured"),
            Self::InvalidCircuit(c) => write!(f, "Invalid circuit: {c}"),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Notification queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Every slot of the ring buffer is occupied.
    QueueFull,
    /// The token does not fit the fixed-capacity credential slot.
    TokenTooLong,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "Message queue is full"),
            Self::TokenTooLong => write!(f, "Bot token too long"),
        }
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

/// Successful result of an enqueue.  Both variants mean "the message will
/// be delivered"; the second one means an identical entry was already
/// pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    DuplicateSuppressed,
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Classified failure of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    /// Provider throttled the bot; retry after the given delay.
    RateLimited { retry_after_secs: u32 },
    ChatNotFound,
    Unauthorized,
    /// Anything else, carrying the raw provider response.
    Other(String),
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited. Retry after {retry_after_secs} seconds")
            }
            Self::ChatNotFound => write!(f, "Chat ID not found"),
            Self::Unauthorized => write!(f, "Invalid bot token"),
            Self::Other(raw) => write!(f, "Failed to send message: {raw}"),
        }
    }
}

/// What one queue step did with the head entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Delivered; the provider's message identifier.
    Delivered { message_id: i64 },
    /// Failed and rescheduled for `next_attempt_at`.
    Retrying {
        failure: SendFailure,
        retries: u8,
        next_attempt_at: u64,
    },
    /// Failed for the last permitted time and removed.
    MaxRetriesExceeded { failure: SendFailure },
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
