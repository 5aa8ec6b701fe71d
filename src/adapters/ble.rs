//! BLE streaming adapter.
//!
//! Implements [`BlePort`]: a single-central GATT server exposing one
//! notify-only characteristic that carries the CSV sample line.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: raw Bluedroid GATT server via
//!   `esp_idf_svc::sys`.
//! - **all other targets**: simulation with a test hook for the
//!   connection state.
//!
//! ## GATT layout
//!
//! | Attribute | UUID                                     | Perms  |
//! |-----------|------------------------------------------|--------|
//! | Service   | `6E400001-B5A3-F393-E0A9-E50E24DCCA9E`   |        |
//! | TX        | `6E400003-B5A3-F393-E0A9-E50E24DCCA9E`   | Notify |
//! | CCCD      | `0x2902`                                 | R/W    |
//!
//! Advertising is not restarted from the disconnect callback; the main
//! tick does that through [`BlePort::restart_advertising`] once the stack
//! has settled.

use log::info;

use crate::app::ports::BlePort;
use crate::config::BleConfig;
use crate::error::BleError;

pub const SERVICE_UUID: u128 = 0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E;
pub const CHAR_TX: u128 = 0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E;

/// Largest notification payload (one CSV line buffer).
pub const MAX_NOTIFY_BYTES: usize = 64;

// ── ESP-IDF static state ──────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures.  These atomics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONNECTED: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_TX_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_MIN_INTERVAL: AtomicU16 = AtomicU16::new(0x06);
#[cfg(target_os = "espidf")]
static BLE_MAX_INTERVAL: AtomicU16 = AtomicU16::new(0x12);

/// Service UUID in the little-endian order the controller expects.
#[cfg(target_os = "espidf")]
static SERVICE_UUID_LE: [u8; 16] = SERVICE_UUID.to_le_bytes();

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    // SAFETY: esp_bt_uuid_t is plain data; all-zero is a valid value.
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    // SAFETY: as above.
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
fn start_advertising() {
    use esp_idf_svc::sys::*;
    // SAFETY: the parameter block is copied by the stack.
    unsafe {
        let mut adv_params = esp_ble_adv_params_t {
            adv_int_min: 0x20,
            adv_int_max: 0x40,
            adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
            adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
            ..core::mem::zeroed()
        };
        esp_ble_gap_start_advertising(&mut adv_params);
    }
}

/// Advertising payload carries the name; the 128-bit service UUID does
/// not fit next to it and goes into the scan response.
#[cfg(target_os = "espidf")]
unsafe fn configure_adv_data() {
    use esp_idf_svc::sys::*;
    unsafe {
        let mut adv: esp_ble_adv_data_t = core::mem::zeroed();
        adv.set_scan_rsp = false;
        adv.include_name = true;
        adv.min_interval = i32::from(BLE_MIN_INTERVAL.load(AtomicOrdering::Relaxed));
        adv.max_interval = i32::from(BLE_MAX_INTERVAL.load(AtomicOrdering::Relaxed));
        adv.flag = (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8;
        esp_ble_gap_config_adv_data(&mut adv);

        let mut rsp: esp_ble_adv_data_t = core::mem::zeroed();
        rsp.set_scan_rsp = true;
        rsp.service_uuid_len = SERVICE_UUID_LE.len() as u16;
        // The stack only reads through this pointer.
        rsp.p_service_uuid = SERVICE_UUID_LE.as_ptr() as *mut u8;
        esp_ble_gap_config_adv_data(&mut rsp);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    #[allow(non_upper_case_globals)]
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RSP_DATA_SET_COMPLETE_EVT => {
            start_advertising();
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    #[allow(non_upper_case_globals)]
    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            BLE_GATTS_IF.store(u32::from(gatts_if), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            // Service declaration, characteristic declaration, value, CCCD.
            unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 4) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(u32::from(svc_handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            let mut char_uuid = uuid128_to_esp(CHAR_TX);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                esp_ble_gatts_add_char(
                    svc_handle,
                    &mut char_uuid,
                    ESP_GATT_PERM_READ as esp_gatt_perm_t,
                    ESP_GATT_CHAR_PROP_BIT_NOTIFY as esp_gatt_char_prop_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            BLE_TX_HANDLE.store(u32::from(handle), AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: TX char (handle={})", handle);
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            let mut cccd = uuid16_to_esp(ESP_GATT_UUID_CHAR_CLIENT_CONFIG as u16);
            unsafe {
                esp_ble_gatts_add_char_descr(
                    svc_handle,
                    &mut cccd,
                    (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            log::info!("BLE GATTS: CCCD added");
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            BLE_CONN_ID.store(u32::from(p.conn_id), AtomicOrdering::Relaxed);
            BLE_CONNECTED.store(true, AtomicOrdering::Release);
            log::info!("BLE GATTS: central connected (conn_id={})", p.conn_id);
            // SAFETY: zeroed is a valid parameter block; the stack copies it.
            unsafe {
                let mut conn: esp_ble_conn_update_params_t = core::mem::zeroed();
                conn.bda = p.remote_bda;
                conn.min_int = BLE_MIN_INTERVAL.load(AtomicOrdering::Relaxed);
                conn.max_int = BLE_MAX_INTERVAL.load(AtomicOrdering::Relaxed);
                conn.latency = 0;
                conn.timeout = 400;
                esp_ble_gap_update_conn_params(&mut conn);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONNECTED.store(false, AtomicOrdering::Release);
            BLE_CONN_ID.store(0, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: central disconnected");
        }
        _ => {}
    }
}

pub struct BleAdapter {
    initialized: bool,
    notified: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
}

impl BleAdapter {
    pub fn new() -> Self {
        Self {
            initialized: false,
            notified: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_connected: false,
        }
    }

    /// Notifications sent since boot.
    pub fn notified(&self) -> u32 {
        self.notified
    }

    /// Simulate a central connecting or dropping.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_connected(&mut self, connected: bool) {
        self.sim_connected = connected;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_init(&mut self, config: &BleConfig) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;

        let name = std::ffi::CString::new(config.device_name.as_str())
            .map_err(|_| BleError::StackInitFailed(ESP_ERR_INVALID_ARG as i32))?;
        BLE_MIN_INTERVAL.store(config.min_preferred, AtomicOrdering::Relaxed);
        BLE_MAX_INTERVAL.store(config.max_preferred, AtomicOrdering::Relaxed);

        // SAFETY: one-shot stack bring-up from the main task; callbacks are
        // plain extern "C" fns touching only atomics.
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK as i32 {
                log::error!("BLE: bt_controller_init failed ({})", ret);
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK as i32 {
                log::error!("BLE: bt_controller_enable failed ({})", ret);
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bluedroid_init();
            if ret != ESP_OK as i32 {
                log::error!("BLE: bluedroid_init failed ({})", ret);
                return Err(BleError::StackInitFailed(ret));
            }
            let ret = esp_bluedroid_enable();
            if ret != ESP_OK as i32 {
                log::error!("BLE: bluedroid_enable failed ({})", ret);
                return Err(BleError::StackInitFailed(ret));
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            let ret = esp_ble_gatts_app_register(0);
            if ret != ESP_OK as i32 {
                log::error!("BLE: gatts_app_register failed ({})", ret);
                return Err(BleError::RegisterFailed(ret));
            }

            esp_ble_gap_set_device_name(name.as_ptr());
            // Advertising starts once the scan response is configured.
            configure_adv_data();
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_init(&mut self, config: &BleConfig) -> Result<(), BleError> {
        info!(
            "BLE(sim): advertising '{}' (service {:032X})",
            config.device_name, SERVICE_UUID
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, payload: &[u8]) {
        use esp_idf_svc::sys::*;
        let handle = BLE_TX_HANDLE.load(AtomicOrdering::Relaxed) as u16;
        let conn = BLE_CONN_ID.load(AtomicOrdering::Relaxed) as u16;
        let gatts_if = BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as esp_gatt_if_t;
        // SAFETY: `payload` outlives both calls; the stack copies the value.
        unsafe {
            esp_ble_gatts_set_attr_value(handle, payload.len() as u16, payload.as_ptr());
            esp_ble_gatts_send_indicate(
                gatts_if,
                conn,
                handle,
                payload.len() as u16,
                payload.as_ptr() as *mut u8,
                false,
            );
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_notify(&mut self, payload: &[u8]) {
        log::trace!("BLE(sim): notify {} bytes", payload.len());
    }
}

impl Default for BleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl BlePort for BleAdapter {
    fn init(&mut self, config: &BleConfig) -> Result<(), BleError> {
        self.platform_init(config)?;
        self.initialized = true;
        info!("BLE: GATT server up as '{}'", config.device_name);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn is_connected(&self) -> bool {
        BLE_CONNECTED.load(AtomicOrdering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_connected(&self) -> bool {
        self.initialized && self.sim_connected
    }

    #[cfg(target_os = "espidf")]
    fn has_characteristic(&self) -> bool {
        BLE_TX_HANDLE.load(AtomicOrdering::Relaxed) != 0
    }

    #[cfg(not(target_os = "espidf"))]
    fn has_characteristic(&self) -> bool {
        self.initialized
    }

    fn notify(&mut self, payload: &[u8]) {
        if !self.initialized {
            return;
        }
        let payload = &payload[..payload.len().min(MAX_NOTIFY_BYTES)];
        self.platform_notify(payload);
        self.notified = self.notified.wrapping_add(1);
    }

    #[cfg(target_os = "espidf")]
    fn restart_advertising(&mut self) {
        start_advertising();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart_advertising(&mut self) {
        info!("BLE(sim): advertising restarted");
    }
}
