//! Controller context: the single owned blackboard the scheduler reads
//! and writes each iteration.
//!
//! Everything the tick steps share lives here: the refreshed time, the
//! latest readings, the four cadence timers and the pending-refresh flag.
//! The pump and connection state are not here; they are owned
//! by [`PumpController`](crate::pump::PumpController) and
//! [`ConnectionManager`](crate::connection::ConnectionManager).

use crate::app::events::TelemetryData;
use crate::app::ports::{ClimateReading, WallClock};
use crate::config::SystemConfig;
use crate::sensors::{celsius_to_fahrenheit, pascals_to_in_hg, particulate};
use crate::timer::OneShotTimer;

/// Latest converted sensor values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingSet {
    pub temperature_f: f32,
    /// Stored for completeness; never displayed or published.
    pub pressure_in_hg: f32,
    pub humidity_pct: f32,
    pub air_quality: i32,
    pub moisture_raw: u16,
    /// [`particulate::UNSAMPLED`] until the first dust sample completes.
    pub dust_concentration: f32,
}

impl Default for ReadingSet {
    fn default() -> Self {
        Self {
            temperature_f: 0.0,
            pressure_in_hg: 0.0,
            humidity_pct: 0.0,
            air_quality: 0,
            moisture_raw: 0,
            dust_concentration: particulate::UNSAMPLED,
        }
    }
}

impl ReadingSet {
    pub fn apply_climate(&mut self, c: ClimateReading) {
        self.temperature_f = celsius_to_fahrenheit(c.temperature_c);
        self.pressure_in_hg = pascals_to_in_hg(c.pressure_pa);
        self.humidity_pct = c.humidity_pct;
    }

    pub fn telemetry(&self) -> TelemetryData {
        TelemetryData {
            humidity_pct: self.humidity_pct,
            temperature_f: self.temperature_f,
            air_quality: self.air_quality,
            moisture_raw: self.moisture_raw,
            dust_concentration: self.dust_concentration,
        }
    }

    pub fn dust_sampled(&self) -> bool {
        self.dust_concentration != particulate::UNSAMPLED
    }
}

/// Cadence timers, one per periodic activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct CadenceTimers {
    pub status: OneShotTimer,
    pub sensors: OneShotTimer,
    pub publish: OneShotTimer,
    pub dust: OneShotTimer,
}

pub struct ControllerContext {
    pub now_ms: u64,
    pub wall_clock: Option<WallClock>,
    pub readings: ReadingSet,
    pub timers: CadenceTimers,
    /// Request a full sensor read + repaint on the next tick regardless
    /// of the sensor timer.
    pub refresh_pending: bool,
    pub iterations: u64,
}

impl ControllerContext {
    /// Context with every timer armed at its initial delay from `now_ms`.
    pub fn new(config: &SystemConfig, now_ms: u64) -> Self {
        let mut timers = CadenceTimers::default();
        timers.status.arm(now_ms, config.status_initial_ms);
        timers.sensors.arm(now_ms, config.sensor_initial_ms);
        timers.publish.arm(now_ms, config.publish_initial_ms);
        timers.dust.arm(now_ms, config.dust_initial_ms);
        Self {
            now_ms,
            wall_clock: None,
            readings: ReadingSet::default(),
            timers,
            refresh_pending: false,
            iterations: 0,
        }
    }
}
