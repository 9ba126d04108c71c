//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the pump relay, exposing them through
//! [`SensorPort`] and [`ActuatorPort`].  It also owns the clock so the
//! blocking dust sample can interleave pulse reads with uptime checks
//! through a single `&mut` borrow.  On non-espidf targets the underlying
//! drivers use cfg-gated simulation stubs.

use embedded_hal::delay::DelayNs;

use crate::adapters::time::Esp32Clock;
use crate::app::ports::{ActuatorPort, ClimateReading, ClockPort, SensorPort, WallClock};
use crate::drivers::pump::RelayDriver;
use crate::sensors::SensorHub;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    sensor_hub: SensorHub,
    pump: RelayDriver,
    clock: Esp32Clock,
}

impl HardwareAdapter {
    pub fn new(sensor_hub: SensorHub, pump: RelayDriver, clock: Esp32Clock) -> Self {
        Self {
            sensor_hub,
            pump,
            clock,
        }
    }

    pub fn pump_on(&self) -> bool {
        self.pump.is_on()
    }

    pub fn sensor_hub(&self) -> &SensorHub {
        &self.sensor_hub
    }
}

// ── ClockPort implementation ──────────────────────────────────

impl DelayNs for HardwareAdapter {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }
}

impl ClockPort for HardwareAdapter {
    fn uptime_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }

    fn wall_clock(&self) -> Option<WallClock> {
        self.clock.wall_clock()
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn read_climate(&mut self) -> ClimateReading {
        self.sensor_hub.read_climate()
    }

    fn read_air_quality(&mut self) -> i32 {
        self.sensor_hub.read_air_quality()
    }

    fn read_moisture(&mut self) -> u16 {
        self.sensor_hub.read_moisture()
    }

    fn button_pressed(&mut self) -> bool {
        self.sensor_hub.button_pressed()
    }

    fn dust_low_pulse_us(&mut self, timeout_us: u32) -> u32 {
        self.sensor_hub.dust_low_pulse_us(timeout_us)
    }

    fn take_dust_low_pulse_us(&mut self) -> u32 {
        self.sensor_hub.take_dust_low_pulse_us()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_pump(&mut self, on: bool) {
        self.pump.set(on);
    }
}
