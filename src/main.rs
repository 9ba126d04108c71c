//! PlantCare Firmware: Main Entry Point
//!
//! Hexagonal architecture driven by a single cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter     EspBroker    TextDisplay  LogEventSink    │
//! │  (Sensor+Actuator+   (Broker)     (Display)    (EventSink)     │
//! │   Clock)                                                       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                Scheduler (pure logic)                  │    │
//! │  │  Timers · PumpController · ConnectionManager · Dust    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::{Result, anyhow};
use log::{error, info, warn};

use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use plantcare::adapters::hardware::HardwareAdapter;
use plantcare::adapters::log_sink::LogEventSink;
use plantcare::adapters::mqtt::EspBroker;
use plantcare::adapters::text_display::TextDisplay;
use plantcare::adapters::time::Esp32Clock;
use plantcare::app::ports::ClockPort;
use plantcare::config::SystemConfig;
use plantcare::drivers::{self, pump::RelayDriver};
use plantcare::pins;
use plantcare::scheduler::Scheduler;
use plantcare::sensors::SensorHub;

// ── Credentials (build-time, never committed) ─────────────────
const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(s) => s,
    None => "",
};
const WIFI_PASS: &str = match option_env!("WIFI_PASS") {
    Some(s) => s,
    None => "",
};

fn load_config() -> SystemConfig {
    match option_env!("PLANTCARE_CONFIG") {
        Some(json) => SystemConfig::from_json(json).unwrap_or_else(|e| {
            warn!("PLANTCARE_CONFIG rejected ({}), using defaults", e);
            SystemConfig::default()
        }),
        None => SystemConfig::default(),
    }
}

fn start_wifi(
    modem: esp_idf_hal::modem::Modem,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
) -> Result<BlockingWifi<EspWifi<'static>>> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), Some(nvs))?, sysloop)?;

    let auth_method = if WIFI_PASS.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID.try_into().map_err(|_| anyhow!("SSID too long"))?,
        password: WIFI_PASS.try_into().map_err(|_| anyhow!("password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("WiFi: connecting to '{}'", WIFI_SSID);
    wifi.connect()?;
    wifi.wait_netif_up()?;
    info!("WiFi: up");
    Ok(wifi)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PlantCare v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config();

    // ── 2. Peripherals ────────────────────────────────────────
    drivers::hw_init::init_peripherals().map_err(|e| anyhow!("HAL init failed: {}", e))?;
    if let Err(e) = drivers::hw_init::init_isr_service() {
        error!("ISR service init failed: {}; interrupt dust sampling will read zero", e);
    }

    let peripherals = Peripherals::take()?;
    const _: () = assert!(pins::I2C_SDA_GPIO == 8 && pins::I2C_SCL_GPIO == 9);
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio9,
        &I2cConfig::new().baudrate(100.kHz().into()),
    )?;

    // ── 3. Network + time ─────────────────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let _wifi = match start_wifi(peripherals.modem, sysloop, nvs) {
        Ok(w) => Some(w),
        Err(e) => {
            // The connection manager keeps retrying the broker regardless.
            error!("WiFi bring-up failed: {}", e);
            None
        }
    };
    let _sntp = EspSntp::new_default()
        .inspect_err(|e| warn!("SNTP unavailable ({}), showing uptime", e))
        .ok();

    // ── 4. Adapters + scheduler ───────────────────────────────
    let clock = Esp32Clock::new(config.utc_offset_hours);
    let mut hw = HardwareAdapter::new(SensorHub::new(i2c), RelayDriver::new(), clock);
    let mut display = TextDisplay::new();
    let mut sink = LogEventSink::new();

    let broker = EspBroker::new(config.broker.clone(), "plantcare");
    let mut scheduler = Scheduler::new(config, broker, hw.uptime_ms())?;

    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    // The subscription poll timeout paces the loop and yields to the idle task.
    loop {
        scheduler.iterate(&mut hw, &mut display, &mut sink);
    }
}
