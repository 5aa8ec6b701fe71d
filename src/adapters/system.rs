//! System adapter: restart, rollback cancel, and the partition table.
//!
//! On host the restart is recorded instead of performed, so a simulated
//! run can observe it.

use log::{info, warn};

use crate::app::ports::{PartitionInfo, PartitionKind, SystemPort};

pub struct EspSystem {
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl EspSystem {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            restarts: 0,
        }
    }

    /// Restarts requested so far (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

impl Default for EspSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
fn collect_partitions(kind: PartitionKind, out: &mut Vec<PartitionInfo>) {
    use esp_idf_svc::sys::*;

    let raw_type = match kind {
        PartitionKind::App => esp_partition_type_t_ESP_PARTITION_TYPE_APP,
        PartitionKind::Data => esp_partition_type_t_ESP_PARTITION_TYPE_DATA,
    };
    // SAFETY: the iterator API is walked to completion and released; every
    // partition pointer refers to the static partition table.
    unsafe {
        let mut it = esp_partition_find(
            raw_type,
            esp_partition_subtype_t_ESP_PARTITION_SUBTYPE_ANY,
            core::ptr::null(),
        );
        while !it.is_null() {
            let p = esp_partition_get(it);
            if !p.is_null() {
                let label = core::ffi::CStr::from_ptr((*p).label.as_ptr())
                    .to_string_lossy()
                    .into_owned();
                out.push(PartitionInfo {
                    label,
                    kind,
                    subtype: (*p).subtype as u8,
                    address: (*p).address,
                    size: (*p).size,
                });
            }
            it = esp_partition_next(it);
        }
        // Releasing a null iterator is a no-op.
        esp_partition_iterator_release(it);
    }
}

impl SystemPort for EspSystem {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        info!("System: restarting");
        esp_idf_svc::hal::reset::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        self.restarts += 1;
        warn!("System(sim): restart requested (#{})", self.restarts);
    }

    #[cfg(target_os = "espidf")]
    fn mark_running_image_valid(&mut self) {
        match esp_ota::mark_app_valid() {
            Ok(()) => info!("System: firmware marked valid (rollback cancelled)"),
            Err(e) => warn!("System: mark_app_valid failed: {:?}", e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn mark_running_image_valid(&mut self) {
        info!("System(sim): rollback check skipped");
    }

    #[cfg(target_os = "espidf")]
    fn partitions(&self) -> Vec<PartitionInfo> {
        let mut out = Vec::new();
        collect_partitions(PartitionKind::App, &mut out);
        collect_partitions(PartitionKind::Data, &mut out);
        out
    }

    #[cfg(not(target_os = "espidf"))]
    fn partitions(&self) -> Vec<PartitionInfo> {
        // Representative two-slot OTA layout.
        vec![
            PartitionInfo {
                label: "ota_0".into(),
                kind: PartitionKind::App,
                subtype: 0x10,
                address: 0x1_0000,
                size: 0x18_0000,
            },
            PartitionInfo {
                label: "ota_1".into(),
                kind: PartitionKind::App,
                subtype: 0x11,
                address: 0x19_0000,
                size: 0x18_0000,
            },
            PartitionInfo {
                label: "nvs".into(),
                kind: PartitionKind::Data,
                subtype: 0x02,
                address: 0x9000,
                size: 0x4000,
            },
            PartitionInfo {
                label: "otadata".into(),
                kind: PartitionKind::Data,
                subtype: 0x00,
                address: 0xD000,
                size: 0x2000,
            },
        ]
    }
}
