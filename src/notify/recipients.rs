//! Per-apartment bot credentials.
//!
//! Each apartment can register one bot token and chat.  A recipient
//! receives alerts only when it is both configured and enabled.  Entries
//! are persisted individually as postcard blobs in the `telegram`
//! namespace so one corrupt slot never takes the others down.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::error::ValidationError;
use crate::topology::{APARTMENT_COUNT, ApartmentId};

pub const RECIPIENT_NAMESPACE: &str = "telegram";
/// Minimum plausible token length.
pub const MIN_TOKEN_LEN: usize = 20;

pub type BotToken = heapless::String<64>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub token: BotToken,
    pub chat_id: i64,
    pub enabled: bool,
    pub configured: bool,
}

impl Recipient {
    pub fn is_notifiable(&self) -> bool {
        self.configured && self.enabled
    }
}

/// Token shape check: long enough, fits the slot, and mixes digits with
/// letters.
pub fn validate_token(token: &str) -> Result<BotToken, ValidationError> {
    if token.len() < MIN_TOKEN_LEN {
        return Err(ValidationError::InvalidToken);
    }
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let has_letter = token.chars().any(|c| c.is_ascii_alphabetic());
    if !(has_digit && has_letter) {
        return Err(ValidationError::InvalidToken);
    }
    let mut out = BotToken::new();
    out.push_str(token)
        .map_err(|()| ValidationError::InvalidToken)?;
    Ok(out)
}

pub fn validate_chat_id(chat_id: i64) -> Result<i64, ValidationError> {
    if chat_id == 0 {
        Err(ValidationError::InvalidChatId)
    } else {
        Ok(chat_id)
    }
}

fn storage_key(id: ApartmentId) -> heapless::String<8> {
    let mut key = heapless::String::new();
    let _ = core::fmt::Write::write_fmt(&mut key, format_args!("apt_{}", id.get()));
    key
}

pub struct RecipientDirectory {
    entries: [Recipient; APARTMENT_COUNT],
}

impl Default for RecipientDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipientDirectory {
    pub fn new() -> Self {
        Self {
            entries: core::array::from_fn(|_| Recipient::default()),
        }
    }

    pub fn get(&self, id: ApartmentId) -> &Recipient {
        &self.entries[id.index()]
    }

    pub fn is_notifiable(&self, id: ApartmentId) -> bool {
        self.get(id).is_notifiable()
    }

    pub fn is_configured(&self, id: ApartmentId) -> bool {
        self.get(id).configured
    }

    pub fn notifiable_count(&self) -> usize {
        self.entries.iter().filter(|r| r.is_notifiable()).count()
    }

    // ── Mutations ─────────────────────────────────────────────
    //
    // Inputs arrive validated.  The in-memory entry always changes; the
    // returned error only says the flash copy is stale.

    /// Store credentials.  The enabled flag is left as it was.
    pub fn configure(
        &mut self,
        id: ApartmentId,
        token: BotToken,
        chat_id: i64,
        storage: &mut impl StoragePort,
    ) -> Result<(), StorageError> {
        let entry = &mut self.entries[id.index()];
        entry.token = token;
        entry.chat_id = chat_id;
        entry.configured = true;
        info!("Recipients: {} configured", id);
        self.persist(id, storage)
    }

    pub fn remove(&mut self, id: ApartmentId, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        self.entries[id.index()] = Recipient::default();
        info!("Recipients: {} removed", id);
        storage.delete(RECIPIENT_NAMESPACE, &storage_key(id)).inspect_err(|e| {
            warn!("Recipients: delete {} failed: {}", id, e);
        })
    }

    /// Enable or disable a recipient.  Unconfigured slots are left alone;
    /// callers check [`is_configured`](Self::is_configured) first.
    pub fn set_enabled(
        &mut self,
        id: ApartmentId,
        on: bool,
        storage: &mut impl StoragePort,
    ) -> Result<(), StorageError> {
        let entry = &mut self.entries[id.index()];
        if !entry.configured {
            return Ok(());
        }
        entry.enabled = on;
        info!("Recipients: {} {}", id, if on { "enabled" } else { "disabled" });
        self.persist(id, storage)
    }

    // ── Persistence ───────────────────────────────────────────

    /// Load every stored slot.  Corrupt or unreadable slots are logged and
    /// left unconfigured; the count of such slots is returned.
    pub fn load(&mut self, storage: &impl StoragePort) -> usize {
        let mut failures = 0;
        for id in ApartmentId::all() {
            let mut buf = [0u8; 128];
            match storage.read(RECIPIENT_NAMESPACE, &storage_key(id), &mut buf) {
                Ok(len) => match postcard::from_bytes::<Recipient>(&buf[..len]) {
                    Ok(rec) => {
                        let configured = !rec.token.is_empty() && rec.chat_id != 0;
                        self.entries[id.index()] = Recipient { configured, ..rec };
                    }
                    Err(_) => {
                        warn!("Recipients: slot for {} is corrupt, ignoring", id);
                        failures += 1;
                    }
                },
                Err(StorageError::NotFound) => {}
                Err(e) => {
                    warn!("Recipients: reading {} failed: {}", id, e);
                    failures += 1;
                }
            }
        }
        info!("Recipients: {} notifiable", self.notifiable_count());
        failures
    }

    fn persist(&self, id: ApartmentId, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        postcard::to_allocvec(self.get(id))
            .map_err(|_| StorageError::IoError)
            .and_then(|bytes| storage.write(RECIPIENT_NAMESPACE, &storage_key(id), &bytes))
            .inspect_err(|e| warn!("Recipients: saving {} failed: {}", id, e))
    }
}
