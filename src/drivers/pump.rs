//! Pump relay driver.
//!
//! Single digital output: HIGH energises the relay and runs the pump.
//!
//! ## Safety contract
//!
//! This driver is a dumb actuator.  Run duration is bounded by the cutoff
//! in [`PumpController`](crate::pump::PumpController); nothing here times
//! out on its own.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO via hw_init helpers.
//! On host/test: the write lands in the simulated GPIO level register.

use log::warn;

use crate::drivers::hw_init;
use crate::pins;

pub struct RelayDriver {
    gpio: i32,
    on: bool,
    switch_count: u32,
}

impl Default for RelayDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayDriver {
    pub fn new() -> Self {
        Self::on_pin(pins::PUMP_GPIO)
    }

    pub fn on_pin(gpio: i32) -> Self {
        if let Err(e) = hw_init::gpio_write(gpio, false) {
            warn!("pump: initial OFF on GPIO {} failed: {}", gpio, e);
        }
        Self {
            gpio,
            on: false,
            switch_count: 0,
        }
    }

    /// Write the relay level.  Writing the current level is harmless and
    /// still reaches the pin.  A failed write leaves the recorded level
    /// unchanged.
    pub fn set(&mut self, on: bool) {
        if let Err(e) = hw_init::gpio_write(self.gpio, on) {
            warn!("pump: GPIO {} write failed: {}", self.gpio, e);
            return;
        }
        if on != self.on {
            self.switch_count = self.switch_count.wrapping_add(1);
        }
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Level changes since construction.
    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }
}
