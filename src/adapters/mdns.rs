//! mDNS responder adapter.
//!
//! Registers `<hostname>.local` and a list of DNS-SD services through the
//! ESP-IDF `mdns` component.  Started once, after the station joins the
//! LAN; it lives until the next reboot.  No-op logging on simulation
//! targets.

use log::info;

use crate::app::ports::{MdnsPort, MdnsService};
use crate::error::RadioError;

pub struct MdnsAdapter {
    active: bool,
    registered: usize,
}

impl MdnsAdapter {
    pub fn new() -> Self {
        Self {
            active: false,
            registered: 0,
        }
    }

    /// Whether the responder is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Services registered by the last `start`.
    pub fn registered(&self) -> usize {
        self.registered
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(
        &self,
        hostname: &str,
        instance: &str,
        services: &[MdnsService],
    ) -> Result<(), RadioError> {
        use std::ffi::CString;

        use esp_idf_svc::sys::*;

        let host = CString::new(hostname).map_err(|_| RadioError::MdnsFailed)?;
        let inst = CString::new(instance).map_err(|_| RadioError::MdnsFailed)?;
        // SAFETY: every pointer handed to the component is a NUL-terminated
        // string that outlives the call; the component copies them.
        unsafe {
            let ret = mdns_init();
            if ret != ESP_OK as i32 {
                log::error!("mDNS: mdns_init failed ({})", ret);
                return Err(RadioError::MdnsFailed);
            }
            if mdns_hostname_set(host.as_ptr()) != ESP_OK as i32 {
                return Err(RadioError::MdnsFailed);
            }
            mdns_instance_name_set(inst.as_ptr());

            for svc in services {
                let kind = CString::new(svc.service).map_err(|_| RadioError::MdnsFailed)?;
                let proto = CString::new(svc.proto).map_err(|_| RadioError::MdnsFailed)?;
                let ret = mdns_service_add(
                    core::ptr::null(),
                    kind.as_ptr(),
                    proto.as_ptr(),
                    svc.port,
                    core::ptr::null_mut(),
                    0,
                );
                if ret != ESP_OK as i32 {
                    log::error!(
                        "mDNS: service_add {}.{} failed ({})",
                        svc.service,
                        svc.proto,
                        ret
                    );
                    return Err(RadioError::MdnsFailed);
                }
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(
        &self,
        hostname: &str,
        _instance: &str,
        services: &[MdnsService],
    ) -> Result<(), RadioError> {
        if hostname.is_empty() {
            return Err(RadioError::MdnsFailed);
        }
        for svc in services {
            info!("mDNS(sim): {}.local {}.{}:{}", hostname, svc.service, svc.proto, svc.port);
        }
        Ok(())
    }
}

impl Default for MdnsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MdnsPort for MdnsAdapter {
    fn start(
        &mut self,
        hostname: &str,
        instance: &str,
        services: &[MdnsService],
    ) -> Result<(), RadioError> {
        if self.active {
            return Ok(());
        }
        self.platform_start(hostname, instance, services)?;
        self.active = true;
        self.registered = services.len();
        info!(
            "mDNS: advertising {}.local ({} services)",
            hostname,
            services.len()
        );
        Ok(())
    }
}
