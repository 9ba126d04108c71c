//! ESP32 clock adapter.
//!
//! Implements [`ClockPort`] (and the embedded-hal [`DelayNs`] it extends).
//!
//! - **`target_os = "espidf"`**: uptime from `esp_timer_get_time()`,
//!   wall clock from `gettimeofday()` once SNTP has set it, delays through
//!   FreeRTOS (ms) or the ROM busy-wait (sub-ms).
//! - **`not(target_os = "espidf")`**: `std::time` for host-side runs.
//!
//! The UTC offset is applied arithmetically; no TZ database is involved.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{ClockPort, WallClock};

/// Reject obviously unsynced time (before 2020-01-01).
const EPOCH_2020: i64 = 1_577_836_800;

/// Local time of day for a Unix timestamp, or `None` if the clock has
/// clearly never been set.
pub fn wall_clock_from_epoch(epoch_secs: i64, utc_offset_hours: i8) -> Option<WallClock> {
    if epoch_secs < EPOCH_2020 {
        return None;
    }
    let local = epoch_secs + i64::from(utc_offset_hours) * 3_600;
    let day_secs = local.rem_euclid(86_400);
    Some(WallClock {
        hour: (day_secs / 3_600) as u8,
        minute: ((day_secs / 60) % 60) as u8,
        second: (day_secs % 60) as u8,
    })
}

pub struct Esp32Clock {
    utc_offset_hours: i8,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Esp32Clock {
    pub fn new(utc_offset_hours: i8) -> Self {
        Self {
            utc_offset_hours,
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: esp_timer_get_time is a monotonic counter read.
        (unsafe { esp_idf_sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    #[cfg(target_os = "espidf")]
    fn epoch_secs(&self) -> Option<i64> {
        let mut tv = esp_idf_sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: gettimeofday writes into the provided struct only.
        if unsafe { esp_idf_sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        Some(tv.tv_sec as i64)
    }

    #[cfg(not(target_os = "espidf"))]
    fn epoch_secs(&self) -> Option<i64> {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs() as i64)
    }
}

impl DelayNs for Esp32Clock {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        use esp_idf_hal::delay::{Ets, FreeRtos};
        if ns >= 1_000_000 {
            FreeRtos::delay_ms(ns / 1_000_000);
        } else {
            Ets::delay_us(ns.div_ceil(1_000));
        }
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

impl ClockPort for Esp32Clock {
    fn uptime_ms(&self) -> u64 {
        self.uptime_us() / 1_000
    }

    fn wall_clock(&self) -> Option<WallClock> {
        self.epoch_secs()
            .and_then(|s| wall_clock_from_epoch(s, self.utc_offset_hours))
    }
}
