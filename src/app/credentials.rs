//! Persisted station credentials.
//!
//! One (SSID, passphrase) pair in NVS namespace `wifi`, keys `ssid` and
//! `pass`.  NVS applies keys one at a time, so a write that fails part way
//! can leave a new SSID next to the old passphrase; [`CredentialStore::save`]
//! puts the previous pair back (or erases the namespace when that fails
//! too) so a reader never observes a mixed pair.  Storage failures are
//! logged and reported as "nothing stored"; they never reach a caller as
//! an error.

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::DefaultCredentials;

pub const NAMESPACE: &str = "wifi";
pub const KEY_SSID: &str = "ssid";
pub const KEY_PASS: &str = "pass";

/// Radio-side limits on credential length.
pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

/// Where the credentials for a station attempt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Stored,
    BuildDefault,
}

impl CredentialSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::BuildDefault => "build default",
        }
    }
}

/// Stored credentials win; the build-time default is used only when it is
/// not the placeholder; otherwise there is no station attempt.
pub fn choose_station_credentials(
    stored: Option<Credentials>,
    defaults: &DefaultCredentials,
) -> Option<(Credentials, CredentialSource)> {
    if let Some(creds) = stored {
        return Some((creds, CredentialSource::Stored));
    }
    if defaults.is_usable() {
        return Some((
            Credentials {
                ssid: defaults.ssid.into(),
                password: defaults.password.into(),
            },
            CredentialSource::BuildDefault,
        ));
    }
    None
}

pub struct CredentialStore {
    storage: Box<dyn StoragePort>,
}

impl CredentialStore {
    pub fn new(storage: Box<dyn StoragePort>) -> Self {
        Self { storage }
    }

    /// Stored pair, present iff the SSID is non-empty.
    pub fn load(&self) -> Option<Credentials> {
        let ssid = match self.storage.get_str(NAMESPACE, KEY_SSID) {
            Ok(Some(s)) if !s.is_empty() => s,
            Ok(_) | Err(StorageError::NotFound) => return None,
            Err(e) => {
                warn!("Credentials: read failed ({e}), treating as absent");
                return None;
            }
        };
        let password = match self.storage.get_str(NAMESPACE, KEY_PASS) {
            Ok(p) => p.unwrap_or_default(),
            Err(e) => {
                warn!("Credentials: password read failed ({e}), treating as absent");
                return None;
            }
        };
        Some(Credentials { ssid, password })
    }

    /// SSID only, for status pages.
    pub fn stored_ssid(&self) -> Option<String> {
        self.load().map(|c| c.ssid)
    }

    /// Persist a pair.  Returns `false` (and logs) when refused or when the
    /// write failed; the previous pair is then restored.
    pub fn save(&mut self, ssid: &str, password: &str) -> bool {
        if ssid.is_empty() {
            warn!("Credentials: refusing to store empty SSID");
            return false;
        }
        let previous = self.load();
        match self
            .storage
            .set_strs(NAMESPACE, &[(KEY_SSID, ssid), (KEY_PASS, password)])
        {
            Ok(()) => {
                info!("Credentials: saved SSID '{ssid}'");
                true
            }
            Err(e) => {
                warn!("Credentials: save failed ({e}), restoring previous pair");
                self.restore(previous.as_ref());
                false
            }
        }
    }

    /// Undo a partial write.  If the old pair cannot be written back the
    /// namespace is erased instead.
    fn restore(&mut self, previous: Option<&Credentials>) {
        let restored = match previous {
            Some(c) => self.storage.set_strs(
                NAMESPACE,
                &[(KEY_SSID, c.ssid.as_str()), (KEY_PASS, c.password.as_str())],
            ),
            None => self.storage.erase_namespace(NAMESPACE),
        };
        match restored {
            Ok(()) | Err(StorageError::NotFound) => {}
            Err(e) => {
                warn!("Credentials: restore failed ({e}), erasing '{NAMESPACE}'");
                if let Err(e) = self.storage.erase_namespace(NAMESPACE) {
                    warn!("Credentials: erase after failed restore also failed ({e})");
                }
            }
        }
    }

    /// Erase the namespace.  Clearing an empty store is a no-op.
    pub fn clear(&mut self) {
        match self.storage.erase_namespace(NAMESPACE) {
            Ok(()) | Err(StorageError::NotFound) => info!("Credentials: cleared"),
            Err(e) => warn!("Credentials: clear skipped ({e})"),
        }
    }
}
