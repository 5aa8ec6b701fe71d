//! One-shot hardware peripheral initialization.
//!
//! Configures the ADC2 oneshot unit for the FSR channels using raw
//! ESP-IDF sys calls.  Called once from `main()` before the event loop
//! starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicPtr, Ordering};

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    AdcChannelFailed(u32, i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC2 init failed (rc={})", rc),
            Self::AdcChannelFailed(ch, rc) => {
                write!(f, "ADC2 channel {} config failed (rc={})", ch, rc)
            }
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        Self::Init("ADC2 oneshot unit")
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the event loop; single-threaded.
    unsafe { init_adc() }?;
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC2 (oneshot) ────────────────────────────────────────────

/// Written once by `init_adc`, read by the main loop afterwards.
#[cfg(target_os = "espidf")]
static ADC2_HANDLE: AtomicPtr<adc_oneshot_unit_ctx_t> = AtomicPtr::new(core::ptr::null_mut());

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_2,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
    // SAFETY: init_cfg and handle outlive the call.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) };
    if ret != ESP_OK {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // 12 dB attenuation: full 0..3.1 V swing of the FSR dividers.
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for &ch in &pins::FSR_ADC2_CHANNELS {
        // SAFETY: handle was created above.
        let ret = unsafe { adc_oneshot_config_channel(handle, ch, &chan_cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::AdcChannelFailed(ch, ret));
        }
    }

    ADC2_HANDLE.store(handle, Ordering::Release);
    info!(
        "hw_init: ADC2 configured (GPIO {:?} -> CH {:?})",
        pins::FSR_GPIOS,
        pins::FSR_ADC2_CHANNELS
    );
    Ok(())
}

/// One conversion.  `Err(rc)` when the unit is missing or busy (ADC2 is
/// shared with the Wi-Fi PHY and can time out while the radio is active).
#[cfg(target_os = "espidf")]
pub fn adc2_read(channel: u32) -> Result<u16, i32> {
    let handle = ADC2_HANDLE.load(Ordering::Acquire);
    if handle.is_null() {
        return Err(ESP_ERR_INVALID_STATE);
    }
    let mut raw: i32 = 0;
    // SAFETY: handle is non-null and only used from the main task.
    let ret = unsafe { adc_oneshot_read(handle, channel, &mut raw) };
    if ret != ESP_OK {
        return Err(ret);
    }
    Ok(raw.max(0) as u16)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc2_read(_channel: u32) -> Result<u16, i32> {
    Ok(0)
}
