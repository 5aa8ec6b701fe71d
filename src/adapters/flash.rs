//! Flash writer for firmware updates.
//!
//! On ESP-IDF: wraps `esp-ota` (inactive OTA slot, image verification on
//! finalize, boot partition switch).
//! On host: [`SimFlashWriter`] keeps the image in memory and checks the
//! ESP image magic byte on commit.

use crate::app::ports::FlashWriterPort;
use crate::error::FlashError;
use log::{info, warn};

/// First byte of every ESP application image.
pub const ESP_IMAGE_MAGIC: u8 = 0xE9;

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct EspFlashWriter {
    update: Option<esp_ota::OtaUpdate>,
    max_size: u32,
    written: u32,
}

#[cfg(target_os = "espidf")]
impl EspFlashWriter {
    pub fn new() -> Self {
        Self {
            update: None,
            max_size: 0,
            written: 0,
        }
    }
}

#[cfg(target_os = "espidf")]
impl Default for EspFlashWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl FlashWriterPort for EspFlashWriter {
    fn free_space(&self) -> u32 {
        // SAFETY: a null start argument asks for the slot after the
        // running one; the returned pointer refers to the static table.
        let part = unsafe { esp_idf_svc::sys::esp_ota_get_next_update_partition(core::ptr::null()) };
        if part.is_null() {
            return 0;
        }
        // SAFETY: non-null partition pointers stay valid for the whole run.
        unsafe { (*part).size }
    }

    fn begin(&mut self, max_size: u32) -> Result<(), FlashError> {
        if self.update.is_some() {
            warn!("Flash: begin while a session is open, discarding it");
            self.update = None;
        }
        if max_size == 0 {
            return Err(FlashError::NoPartition);
        }
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("Flash: esp-ota begin failed: {:?}", e);
            FlashError::BeginFailed
        })?;
        self.update = Some(update);
        self.max_size = max_size;
        self.written = 0;
        info!("Flash: writer open ({} bytes max)", max_size);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        let Some(update) = self.update.as_mut() else {
            return 0;
        };
        let room = self.max_size.saturating_sub(self.written) as usize;
        let take = chunk.len().min(room);
        if take == 0 {
            return 0;
        }
        match update.write(&chunk[..take]) {
            Ok(()) => {
                self.written += take as u32;
                take
            }
            Err(e) => {
                warn!("Flash: esp-ota write failed: {:?}", e);
                0
            }
        }
    }

    fn end(&mut self) -> Result<u32, FlashError> {
        let update = self.update.take().ok_or(FlashError::NotOpen)?;
        let mut completed = update.finalize().map_err(|e| {
            warn!("Flash: esp-ota finalize failed: {:?}", e);
            FlashError::VerifyFailed
        })?;
        completed.set_as_boot_partition().map_err(|e| {
            warn!("Flash: set_as_boot_partition failed: {:?}", e);
            FlashError::BootSetFailed
        })?;
        info!("Flash: new image selected for next boot");
        Ok(self.written)
    }

    fn abort(&mut self) {
        // esp-ota aborts the handle when OtaUpdate is dropped.
        if self.update.take().is_some() {
            warn!("Flash: session aborted after {} bytes", self.written);
        }
        self.written = 0;
    }
}

// ── Simulation backend ────────────────────────────────────────

/// In-memory update slot.
#[cfg(not(target_os = "espidf"))]
pub struct SimFlashWriter {
    capacity: u32,
    max_size: u32,
    staging: Option<Vec<u8>>,
    committed: Option<Vec<u8>>,
    aborts: u32,
}

#[cfg(not(target_os = "espidf"))]
impl SimFlashWriter {
    /// Slot with `capacity` bytes of free space.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            max_size: 0,
            staging: None,
            committed: None,
            aborts: 0,
        }
    }

    /// Image selected for next boot, if any.
    pub fn committed(&self) -> Option<&[u8]> {
        self.committed.as_deref()
    }

    pub fn aborts(&self) -> u32 {
        self.aborts
    }
}

#[cfg(not(target_os = "espidf"))]
impl FlashWriterPort for SimFlashWriter {
    fn free_space(&self) -> u32 {
        self.capacity
    }

    fn begin(&mut self, max_size: u32) -> Result<(), FlashError> {
        if max_size == 0 {
            return Err(FlashError::NoPartition);
        }
        self.max_size = max_size;
        self.staging = Some(Vec::new());
        info!("Flash(sim): writer open ({max_size} bytes max)");
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        let Some(staging) = self.staging.as_mut() else {
            return 0;
        };
        let room = (self.max_size as usize).saturating_sub(staging.len());
        let take = chunk.len().min(room);
        staging.extend_from_slice(&chunk[..take]);
        take
    }

    fn end(&mut self) -> Result<u32, FlashError> {
        let image = self.staging.take().ok_or(FlashError::NotOpen)?;
        if image.first() != Some(&ESP_IMAGE_MAGIC) {
            warn!("Flash(sim): bad image magic");
            return Err(FlashError::VerifyFailed);
        }
        let len = image.len() as u32;
        self.committed = Some(image);
        info!("Flash(sim): image committed ({len} bytes)");
        Ok(len)
    }

    fn abort(&mut self) {
        if self.staging.take().is_some() {
            self.aborts += 1;
            warn!("Flash(sim): session aborted");
        }
    }
}
