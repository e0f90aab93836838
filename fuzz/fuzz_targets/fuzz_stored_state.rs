//! Fuzz target: persisted sensor map and recipient slots
//!
//! Seeds an in-memory store with arbitrary bytes under the keys the
//! firmware reads at boot, then loads them, verifying:
//! - No panics on corrupt postcard blobs or short bitmaps
//! - Loaded recipients are only notifiable with a non-empty token and
//!   a non-zero chat id
//! - The enable count never exceeds the apartment count
//!
//! cargo fuzz run fuzz_stored_state

#![no_main]

use libfuzzer_sys::fuzz_target;
use meterguard::app::ports::{StorageError, StoragePort};
use meterguard::notify::recipients::{RECIPIENT_NAMESPACE, RecipientDirectory};
use meterguard::scanner::{ENABLE_KEY, ENABLE_NAMESPACE, SensorScanner};
use meterguard::topology::{APARTMENT_COUNT, ApartmentId};
use std::collections::HashMap;

// ── In-memory StoragePort for fuzz testing ────────────────────

struct MemStore {
    data: HashMap<String, Vec<u8>>,
}

impl StoragePort for MemStore {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.data.get(&format!("{ns}::{key}")) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.data.insert(format!("{ns}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&format!("{ns}::{key}"));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.contains_key(&format!("{ns}::{key}"))
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let (bitmap, blob) = rest.split_at((split as usize).min(rest.len()));

    let mut store = MemStore { data: HashMap::new() };
    store.data.insert(format!("{ENABLE_NAMESPACE}::{ENABLE_KEY}"), bitmap.to_vec());
    for id in ApartmentId::all() {
        store
            .data
            .insert(format!("{RECIPIENT_NAMESPACE}::apt_{}", id.get()), blob.to_vec());
    }

    let mut scanner = SensorScanner::new(100, 500);
    let _ = scanner.load(&store);
    assert!(scanner.enabled_count() as usize <= APARTMENT_COUNT);

    let mut recipients = RecipientDirectory::new();
    let _ = recipients.load(&store);
    for id in ApartmentId::all() {
        let rec = recipients.get(id);
        if rec.is_notifiable() {
            assert!(!rec.token.is_empty());
            assert_ne!(rec.chat_id, 0);
        }
    }
});
