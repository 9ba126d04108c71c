//! Optical dust sensor (low-pulse occupancy) sampler.
//!
//! The sensor pulls its output LOW while particles cross the beam.  The
//! fraction of a sampling window spent LOW ("occupancy", in percent) maps to
//! a particle concentration through the manufacturer's cubic curve:
//!
//! ```text
//!   ratio = low_us / (window_ms * 10)
//!   pcs   = 1.1·ratio³ − 3.8·ratio² + 520·ratio + 0.62
//! ```
//!
//! Two acquisition strategies:
//!
//! - **Blocking**: measure pulses back to back for the whole window.  The
//!   calling task does nothing else for 30 s.
//! - **Interrupt**: an any-edge ISR accumulates LOW time into an atomic;
//!   the main loop opens a window, keeps ticking, and collects the total
//!   once the window has elapsed.  Same pattern as an ISR pulse counter
//!   swapped to zero on read.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::{debug, info};

use crate::app::ports::{ClockPort, SensorPort};

/// Concentration reported before the first sample completes.
pub const UNSAMPLED: f32 = 0.0;

// ── ISR accumulator ───────────────────────────────────────────

/// Total LOW time seen by the edge ISR since the last swap (µs).
static DUST_LOW_ACCUM_US: AtomicU32 = AtomicU32::new(0);
/// Timestamp of the falling edge of the pulse in progress (µs), 0 = none.
static DUST_FALL_AT_US: AtomicU64 = AtomicU64::new(0);

/// Called from the GPIO ISR on every edge of the dust input.
/// Lock-free; safe in interrupt context.
pub fn dust_edge_isr(level_low: bool, now_us: u64) {
    if level_low {
        DUST_FALL_AT_US.store(now_us.max(1), Ordering::Relaxed);
    } else {
        let fell = DUST_FALL_AT_US.swap(0, Ordering::Relaxed);
        if fell != 0 {
            let width = now_us.saturating_sub(fell).min(u64::from(u32::MAX)) as u32;
            let _ = DUST_LOW_ACCUM_US.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |acc| {
                Some(acc.saturating_add(width))
            });
        }
    }
}

/// Swap the accumulated LOW time to zero and return it.
pub fn take_low_pulse_us() -> u32 {
    DUST_LOW_ACCUM_US.swap(0, Ordering::Relaxed)
}

// ── Curve ─────────────────────────────────────────────────────

/// Occupancy ratio in percent for `low_us` of LOW time over `window_ms`.
pub fn occupancy_ratio(low_us: u64, window_ms: u32) -> f32 {
    if window_ms == 0 {
        return 0.0;
    }
    low_us as f32 / (window_ms as f32 * 10.0)
}

/// Particle concentration for a given occupancy ratio.
///
/// Evaluated in double precision and narrowed, matching the C `pow` path.
pub fn concentration_from_ratio(ratio: f32) -> f32 {
    let r = f64::from(ratio);
    (1.1 * r.powi(3) - 3.8 * r.powi(2) + 520.0 * r + 0.62) as f32
}

pub fn concentration(low_us: u64, window_ms: u32) -> f32 {
    concentration_from_ratio(occupancy_ratio(low_us, window_ms))
}

// ── Sampler ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Closed,
    Open { started_ms: u64 },
}

pub struct ParticulateSampler {
    window_ms: u32,
    pulse_timeout_us: u32,
    window: Window,
    last_concentration: f32,
    samples: u32,
}

impl ParticulateSampler {
    pub fn new(window_ms: u32, pulse_timeout_us: u32) -> Self {
        Self {
            window_ms,
            pulse_timeout_us,
            window: Window::Closed,
            last_concentration: UNSAMPLED,
            samples: 0,
        }
    }

    /// Measure LOW pulses back to back until the window has elapsed.
    ///
    /// Occupies the caller for at least `window_ms`.  A pulse that times out
    /// contributes 0 but the time spent waiting still counts toward the
    /// window.
    pub fn sample_blocking(&mut self, hw: &mut (impl ClockPort + SensorPort)) -> f32 {
        let start = hw.uptime_ms();
        let mut low_us: u64 = 0;
        let mut pulses = 0u32;
        info!("Dust: blocking sample for {} ms", self.window_ms);

        while hw.uptime_ms().saturating_sub(start) < u64::from(self.window_ms) {
            low_us += u64::from(hw.dust_low_pulse_us(self.pulse_timeout_us));
            pulses += 1;
        }

        debug!("Dust: {} pulse reads, {} us low", pulses, low_us);
        self.finish(low_us)
    }

    /// Open an ISR accumulation window.  Discards anything accumulated
    /// while no window was open.
    pub fn begin(&mut self, now_ms: u64, hw: &mut impl SensorPort) {
        let stale = hw.take_dust_low_pulse_us();
        if stale > 0 {
            debug!("Dust: discarded {} us accumulated outside a window", stale);
        }
        self.window = Window::Open { started_ms: now_ms };
        info!("Dust: window opened for {} ms", self.window_ms);
    }

    /// Collect the ISR total once the window has elapsed.
    ///
    /// Returns `Some(concentration)` exactly once per window.
    pub fn poll(&mut self, now_ms: u64, hw: &mut impl SensorPort) -> Option<f32> {
        match self.window {
            Window::Open { started_ms }
                if now_ms.saturating_sub(started_ms) >= u64::from(self.window_ms) =>
            {
                self.window = Window::Closed;
                let low_us = u64::from(hw.take_dust_low_pulse_us());
                Some(self.finish(low_us))
            }
            _ => None,
        }
    }

    fn finish(&mut self, low_us: u64) -> f32 {
        let ratio = occupancy_ratio(low_us, self.window_ms);
        let pcs = concentration_from_ratio(ratio);
        self.last_concentration = pcs;
        self.samples = self.samples.wrapping_add(1);
        info!("Dust: ratio {:.3}% -> {:.2} pcs/0.01cf", ratio, pcs);
        pcs
    }

    pub fn window_open(&self) -> bool {
        matches!(self.window, Window::Open { .. })
    }

    /// Most recent concentration, [`UNSAMPLED`] until the first sample.
    pub fn last_concentration(&self) -> f32 {
        self.last_concentration
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{ClimateReading, WallClock};
    use embedded_hal::delay::DelayNs;

    #[test]
    fn curve_endpoints() {
        assert!((concentration_from_ratio(0.0) - 0.62).abs() < 1e-6);
        assert!((concentration_from_ratio(1.0) - 517.92).abs() < 1e-3);
    }

    #[test]
    fn one_percent_occupancy() {
        // 300 ms LOW in a 30 s window is 1 %.
        assert!((occupancy_ratio(300_000, 30_000) - 1.0).abs() < 1e-6);
        assert!((concentration(300_000, 30_000) - 517.92).abs() < 1e-3);
    }

    #[test]
    fn zero_window_is_safe() {
        assert_eq!(occupancy_ratio(1_000, 0), 0.0);
    }

    #[test]
    fn isr_accumulates_low_time() {
        take_low_pulse_us();
        dust_edge_isr(true, 1_000);
        dust_edge_isr(false, 3_500);
        dust_edge_isr(false, 9_000); // rising edge with no fall: ignored
        dust_edge_isr(true, 10_000);
        dust_edge_isr(false, 10_500);
        assert_eq!(take_low_pulse_us(), 3_000);
        assert_eq!(take_low_pulse_us(), 0);
    }

    /// Board whose every pulse read takes 100 ms and reports a fixed width.
    struct Board {
        now_ms: u64,
        pulse_us: u32,
        isr_total: u32,
    }

    impl DelayNs for Board {
        fn delay_ns(&mut self, ns: u32) {
            self.now_ms += u64::from(ns / 1_000_000);
        }
    }

    impl ClockPort for Board {
        fn uptime_ms(&self) -> u64 {
            self.now_ms
        }

        fn wall_clock(&self) -> Option<WallClock> {
            None
        }
    }

    impl SensorPort for Board {
        fn read_climate(&mut self) -> ClimateReading {
            ClimateReading::default()
        }

        fn read_air_quality(&mut self) -> i32 {
            0
        }

        fn read_moisture(&mut self) -> u16 {
            0
        }

        fn button_pressed(&mut self) -> bool {
            false
        }

        fn dust_low_pulse_us(&mut self, _timeout_us: u32) -> u32 {
            self.now_ms += 100;
            self.pulse_us
        }

        fn take_dust_low_pulse_us(&mut self) -> u32 {
            core::mem::take(&mut self.isr_total)
        }
    }

    #[test]
    fn blocking_sample_spans_window() {
        let mut board = Board { now_ms: 5_000, pulse_us: 1_000, isr_total: 0 };
        let mut sampler = ParticulateSampler::new(30_000, 1_000_000);
        let pcs = sampler.sample_blocking(&mut board);
        assert_eq!(board.now_ms, 35_000);
        // 300 reads × 1000 µs = 300 ms LOW = 1 %.
        assert!((pcs - 517.92).abs() < 1e-3);
        assert_eq!(sampler.last_concentration(), pcs);
    }

    #[test]
    fn window_completes_once() {
        let mut board = Board { now_ms: 0, pulse_us: 0, isr_total: 77 };
        let mut sampler = ParticulateSampler::new(30_000, 1_000_000);
        assert_eq!(sampler.last_concentration(), UNSAMPLED);

        sampler.begin(1_000, &mut board);
        assert_eq!(board.isr_total, 0, "stale total discarded");
        board.isr_total = 300_000;

        assert_eq!(sampler.poll(30_999, &mut board), None);
        let pcs = sampler.poll(31_000, &mut board).unwrap();
        assert!((pcs - 517.92).abs() < 1e-3);
        assert_eq!(sampler.poll(40_000, &mut board), None);
        assert!(!sampler.window_open());
        assert_eq!(sampler.samples(), 1);
    }
}
