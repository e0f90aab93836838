//! Flash-backed persistence for MeterGuard.
//!
//! [`NvsAdapter`] serves both [`ConfigPort`] and [`StoragePort`]:
//!
//! | namespace    | key          | contents                         |
//! |--------------|--------------|----------------------------------|
//! | `meterguard` | `alarmcfg`   | postcard [`AlarmConfig`]         |
//! | `alarm_sys`  | `apt_states` | 24-bit sensor enable bitmap      |
//! | `telegram`   | `apt_<n>`    | postcard recipient per apartment |
//!
//! Bot tokens live in `telegram`; enable partition-wide NVS encryption on
//! production boards.  Off target the store is an in-memory map.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::AlarmConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub const CONFIG_NAMESPACE: &str = "meterguard";
pub const CONFIG_KEY: &str = "alarmcfg";

const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

/// NVS names are NUL-terminated and at most 15 characters.
#[cfg(target_os = "espidf")]
fn c_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

impl NvsAdapter {
    /// Bring up the default NVS partition.  A full or version-mismatched
    /// partition is erased once and initialised again.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let first = unsafe { nvs_flash_init() };
            let needs_erase = first == ESP_ERR_NVS_NO_FREE_PAGES as i32
                || first == ESP_ERR_NVS_NEW_VERSION_FOUND as i32;
            let outcome = if needs_erase {
                warn!("NVS: partition unusable (rc={}), erasing", first);
                // SAFETY: as above.
                esp_check(unsafe { nvs_flash_erase() }).and_then(|()| esp_check(unsafe { nvs_flash_init() }))
            } else {
                esp_check(first)
            };
            outcome.map_err(|rc| {
                warn!("NVS: flash init failed (rc={})", rc);
                ConfigError::IoError
            })?;
            info!("NVS: flash ready");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS: in-memory store");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn sim_key(namespace: &str, key: &str) -> String {
        format!("{namespace}/{key}")
    }

    /// Open `namespace`, run `f` on the handle, close it again.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<T>(
        namespace: &str,
        mode: nvs_open_mode_t,
        f: impl FnOnce(nvs_handle_t) -> Result<T, i32>,
    ) -> Result<T, i32> {
        let ns = c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        // SAFETY: `ns` is NUL-terminated; `handle` is a valid out-pointer.
        esp_check(unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) })?;
        let result = f(handle);
        // SAFETY: opened above, closed exactly once.
        unsafe { nvs_close(handle) };
        result
    }

    /// Store one blob and commit.  Shared by config saves and raw writes.
    fn put_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::sim_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            Self::with_nvs_handle(namespace, nvs_open_mode_t_NVS_READWRITE, |h| {
                // SAFETY: open handle, NUL-terminated key, `data` outlives the call.
                esp_check(unsafe { nvs_set_blob(h, key.as_ptr().cast(), data.as_ptr().cast(), data.len()) })?;
                // SAFETY: open handle.
                esp_check(unsafe { nvs_commit(h) })
            })
            .map_err(|rc| match rc {
                rc if rc == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 => StorageError::Full,
                _ => StorageError::IoError,
            })
        }
    }
}

#[cfg(target_os = "espidf")]
fn esp_check(rc: i32) -> Result<(), i32> {
    if rc == ESP_OK as i32 { Ok(()) } else { Err(rc) }
}

impl ConfigPort for NvsAdapter {
    /// Missing, unreadable or undecodable blobs all yield defaults; only
    /// the log tells them apart.
    fn load(&self) -> Result<AlarmConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let stored = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => postcard::from_bytes::<AlarmConfig>(&buf[..len]).ok(),
            Err(StorageError::NotFound) => {
                info!("NVS: no stored config, using defaults");
                return Ok(AlarmConfig::default());
            }
            Err(e) => {
                warn!("NVS: config read failed ({}), using defaults", e);
                return Ok(AlarmConfig::default());
            }
        };
        match stored {
            Some(cfg) if cfg.validate().is_ok() => {
                info!("NVS: config loaded");
                Ok(cfg)
            }
            Some(_) => {
                warn!("NVS: stored config out of range, using defaults");
                Ok(AlarmConfig::default())
            }
            None => {
                warn!("NVS: stored config undecodable, using defaults");
                Ok(AlarmConfig::default())
            }
        }
    }

    fn save(&self, config: &AlarmConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(|e| {
                warn!("NVS: config write failed ({})", e);
                ConfigError::IoError
            })?;
        info!("NVS: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let store = self.store.borrow();
            let data = store
                .get(&Self::sim_key(namespace, key))
                .ok_or(StorageError::NotFound)?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok(len)
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            Self::with_nvs_handle(namespace, nvs_open_mode_t_NVS_READONLY, |h| {
                let mut len = buf.len();
                // SAFETY: `len` is the capacity of `buf`; NVS writes at most that.
                esp_check(unsafe { nvs_get_blob(h, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut len) })?;
                Ok(len)
            })
            .map_err(|rc| match rc {
                rc if rc == ESP_ERR_NVS_NOT_FOUND as i32 => StorageError::NotFound,
                rc if rc == ESP_ERR_NVS_INVALID_LENGTH as i32 => StorageError::Corrupted,
                _ => StorageError::IoError,
            })
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put_blob(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().remove(&Self::sim_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            let result = Self::with_nvs_handle(namespace, nvs_open_mode_t_NVS_READWRITE, |h| {
                // SAFETY: open handle, NUL-terminated key.
                let rc = unsafe { nvs_erase_key(h, key.as_ptr().cast()) };
                if rc != ESP_ERR_NVS_NOT_FOUND as i32 {
                    esp_check(rc)?;
                }
                // SAFETY: open handle.
                esp_check(unsafe { nvs_commit(h) })
            });
            match result {
                // Namespace never created: nothing to delete.
                Err(rc) if rc == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(()),
                other => other.map_err(|_| StorageError::IoError),
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow().contains_key(&Self::sim_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            Self::with_nvs_handle(namespace, nvs_open_mode_t_NVS_READONLY, |h| {
                // SAFETY: open handle, NUL-terminated key; the type out-param may be null.
                Ok(unsafe { nvs_find_key(h, key.as_ptr().cast(), core::ptr::null_mut()) } == ESP_OK as i32)
            })
            .unwrap_or(false)
        }
    }
}

impl Default for NvsAdapter {
    /// Fallback when flash init failed: on target every call then reports
    /// an I/O error, on the host it is an empty store.
    fn default() -> Self {
        Self::new().unwrap_or(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }
}
