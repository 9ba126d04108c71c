//! One-shot hardware peripheral initialization and raw pin access.
//!
//! Configures ADC channels and GPIO directions using raw ESP-IDF sys calls.
//! Called once from `main()` before the main loop starts.  On the host the
//! same entry points read from simulation atomics so the adapters above
//! them run unchanged.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

use crate::error::{ActuatorError, SensorError};

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the main loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the init path or the main-loop read
/// path.  `init_adc()` completes before the main loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    for channel in [pins::MOISTURE_ADC_CHANNEL, pins::AIR_QUALITY_ADC_CHANNEL] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!(
        "hw_init: ADC1 configured (CH{}=moisture, CH{}=air)",
        pins::MOISTURE_ADC_CHANNEL,
        pins::AIR_QUALITY_ADC_CHANNEL
    );
    Ok(())
}

/// 12-bit raw reading.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Result<u16, SensorError> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract: single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return Err(SensorError::AdcReadFailed);
    }
    Ok(raw.clamp(0, 4095) as u16)
}

#[cfg(not(target_os = "espidf"))]
static SIM_ADC: [AtomicU16; 10] = [const { AtomicU16::new(0) }; 10];

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(channel: u32) -> Result<u16, SensorError> {
    SIM_ADC
        .get(channel as usize)
        .map(|a| a.load(Ordering::Relaxed))
        .ok_or(SensorError::AdcReadFailed)
}

/// Set the raw value the simulated ADC returns for `channel` (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: u16) {
    if let Some(a) = SIM_ADC.get(channel as usize) {
        a.store(raw.min(4095), Ordering::Relaxed);
    }
}

// ── GPIO ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio() -> Result<(), HwInitError> {
    let inputs = [
        (pins::BUTTON_GPIO, gpio_pullup_t_GPIO_PULLUP_DISABLE),
        (pins::DUST_PULSE_GPIO, gpio_pullup_t_GPIO_PULLUP_ENABLE),
    ];
    for (pin, pull_up) in inputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: pull_up,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    let pump_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::PUMP_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&pump_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    // Relay starts de-energised.
    unsafe { gpio_set_level(pins::PUMP_GPIO, 0) };

    info!("hw_init: GPIO configured (button, dust in; pump out)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
static SIM_GPIO_LEVELS: AtomicU32 = AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    SIM_GPIO_LEVELS.load(Ordering::Relaxed) & (1 << (pin & 31)) != 0
}

/// Drive a simulated input level (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_gpio(pin: i32, high: bool) {
    let bit = 1 << (pin & 31);
    if high {
        SIM_GPIO_LEVELS.fetch_or(bit, Ordering::Relaxed);
    } else {
        SIM_GPIO_LEVELS.fetch_and(!bit, Ordering::Relaxed);
    }
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), ActuatorError> {
    // SAFETY: gpio_set_level writes to an output pin configured in
    // init_gpio(). Main-loop only.
    let ret = unsafe { gpio_set_level(pin, u32::from(high)) };
    if ret != ESP_OK as i32 {
        return Err(ActuatorError::GpioWriteFailed);
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), ActuatorError> {
    sim_set_gpio(pin, high);
    Ok(())
}

// ── Pulse measurement ─────────────────────────────────────────

/// Width of the next LOW pulse on `pin` in microseconds, or 0 when no
/// complete pulse is seen within `timeout_us`.
///
/// Waits for any pulse already in progress to end, then for the falling
/// edge, then times the low phase.  Busy-waits the calling task.
#[cfg(target_os = "espidf")]
pub fn pulse_in_low(pin: i32, timeout_us: u32) -> u32 {
    // SAFETY: esp_timer_get_time is a monotonic counter read.
    let now = || unsafe { esp_timer_get_time() };
    let deadline = now() + i64::from(timeout_us);

    while !gpio_read(pin) {
        if now() >= deadline {
            return 0;
        }
    }
    while gpio_read(pin) {
        if now() >= deadline {
            return 0;
        }
    }
    let start = now();
    while !gpio_read(pin) {
        if now() >= deadline {
            return 0;
        }
    }
    (now() - start).clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(not(target_os = "espidf"))]
static SIM_PULSE_LOW_US: AtomicU32 = AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn pulse_in_low(_pin: i32, timeout_us: u32) -> u32 {
    let width = SIM_PULSE_LOW_US.load(Ordering::Relaxed);
    if width > timeout_us { 0 } else { width }
}

/// Width every simulated `pulse_in_low` call reports (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_pulse_low_us(width_us: u32) {
    SIM_PULSE_LOW_US.store(width_us, Ordering::Relaxed);
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn dust_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: register read and RTC counter read; both safe in ISR context.
    let (low, now_us) = unsafe {
        (
            gpio_get_level(pins::DUST_PULSE_GPIO) == 0,
            esp_timer_get_time(),
        )
    };
    crate::sensors::particulate::dust_edge_isr(low, now_us as u64);
}

/// Install the GPIO ISR service and register the dust-edge handler.
/// Call after init_peripherals() and before the main loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed.  The handler only touches atomics.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        gpio_set_intr_type(pins::DUST_PULSE_GPIO, gpio_int_type_t_GPIO_INTR_ANYEDGE);
        gpio_isr_handler_add(pins::DUST_PULSE_GPIO, Some(dust_gpio_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::DUST_PULSE_GPIO);

        info!("hw_init: ISR service installed (dust any-edge)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
