//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] with string values, so the layout stays
//! readable by other NVS string tooling (`nvs_get_str`/`nvs_set_str`).
//!
//! - Every operation opens its namespace, works, and closes the handle.
//! - Multi-key writes set each key in turn and commit at the end.  A
//!   failed set stops there, but keys already set are not rolled back;
//!   callers that need a consistent group restore it themselves.
//! - The simulation backend keeps namespaces in memory (host tests).

use crate::app::ports::{StorageError, StoragePort};
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
use std::ffi::CString;

/// NVS keys and namespaces are limited to 15 bytes.
const NVS_NAME_MAX: usize = 15;

/// Longest value read back (SSID 32 + passphrase 64 with slack).
#[cfg(target_os = "espidf")]
const MAX_STR_LEN: usize = 128;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, HashMap<String, String>>>,
}

impl NvsAdapter {
    /// Create the adapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    fn check_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty() || name.len() > NVS_NAME_MAX {
            return Err(StorageError::IoError);
        }
        Ok(())
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = CString::new(namespace).map_err(|_| ESP_ERR_INVALID_ARG)?;

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: `ns` is a valid NUL-terminated string for the call.
        let ret = unsafe { nvs_open(ns.as_ptr(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is not used after this.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn map_err(rc: i32) -> StorageError {
        if rc == ESP_ERR_NVS_NOT_FOUND {
            StorageError::NotFound
        } else if rc == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
            StorageError::Full
        } else {
            StorageError::IoError
        }
    }
}

impl StoragePort for NvsAdapter {
    fn get_str(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        Self::check_name(namespace)?;
        Self::check_name(key)?;

        #[cfg(not(target_os = "espidf"))]
        {
            Ok(self
                .store
                .borrow()
                .get(namespace)
                .and_then(|ns| ns.get(key))
                .cloned())
        }

        #[cfg(target_os = "espidf")]
        {
            let key_c = CString::new(key).map_err(|_| StorageError::IoError)?;
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size: usize = 0;
                // SAFETY: null out-pointer asks NVS for the required length.
                let ret = unsafe {
                    nvs_get_str(handle, key_c.as_ptr(), core::ptr::null_mut(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size == 0 || size > MAX_STR_LEN {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH);
                }
                let mut buf = vec![0u8; size];
                // SAFETY: buf holds `size` bytes as reported above.
                let ret = unsafe {
                    nvs_get_str(handle, key_c.as_ptr(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                // Drop the NUL terminator.
                buf.truncate(size.saturating_sub(1));
                Ok(buf)
            });

            match result {
                Ok(bytes) => String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|_| StorageError::IoError),
                Err(rc) if rc == ESP_ERR_NVS_NOT_FOUND => Ok(None),
                Err(rc) => {
                    warn!("NvsAdapter: read {namespace}/{key} failed ({rc})");
                    Err(Self::map_err(rc))
                }
            }
        }
    }

    fn set_strs(&mut self, namespace: &str, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        Self::check_name(namespace)?;
        for (key, _) in entries {
            Self::check_name(key)?;
        }

        #[cfg(not(target_os = "espidf"))]
        {
            let mut store = self.store.borrow_mut();
            let ns = store.entry(namespace.to_string()).or_default();
            for (key, value) in entries {
                ns.insert((*key).to_string(), (*value).to_string());
            }
            info!("NvsAdapter(sim): {} key(s) committed to '{namespace}'", entries.len());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let mut owned = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let k = CString::new(*key).map_err(|_| StorageError::IoError)?;
                let v = CString::new(*value).map_err(|_| StorageError::IoError)?;
                owned.push((k, v));
            }
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                for (k, v) in &owned {
                    // SAFETY: both CStrings outlive the call.
                    let ret = unsafe { nvs_set_str(handle, k.as_ptr(), v.as_ptr()) };
                    if ret != ESP_OK {
                        return Err(ret);
                    }
                }
                // SAFETY: handle is open read-write.
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: {} key(s) committed to '{namespace}'", owned.len());
                    Ok(())
                }
                Err(rc) => {
                    warn!("NvsAdapter: write to '{namespace}' failed ({rc})");
                    Err(Self::map_err(rc))
                }
            }
        }
    }

    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        Self::check_name(namespace)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().remove(namespace);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                // SAFETY: handle is open read-write.
                let ret = unsafe { nvs_erase_all(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                // Namespace never created: nothing to erase.
                Err(rc) if rc == ESP_ERR_NVS_NOT_FOUND => Ok(()),
                Err(rc) => {
                    warn!("NvsAdapter: erase '{namespace}' failed ({rc})");
                    Err(Self::map_err(rc))
                }
            }
        }
    }
}
