//! Mock board for integration tests.
//!
//! Virtual time only moves when a test advances it or when the code under
//! test blocks (delays, pulse measurements), so every run is deterministic.
//! Actuator writes and display output are recorded for assertions.

use std::collections::HashMap;

use embedded_hal::delay::DelayNs;
use plantcare::adapters::mqtt::SimBroker;
use plantcare::app::events::AppEvent;
use plantcare::app::ports::{
    ActuatorPort, ClimateReading, ClockPort, DisplayPort, EventSink, Region, SensorPort, WallClock,
};
use plantcare::config::SystemConfig;
use plantcare::scheduler::Scheduler;

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    pub now_ms: u64,
    pub wall: Option<WallClock>,
    pub climate: ClimateReading,
    pub air_quality: i32,
    pub moisture: u16,
    pub button: bool,
    /// Width returned by each blocking pulse measurement.
    pub pulse_low_us: u32,
    /// Virtual time one blocking pulse measurement takes.
    pub pulse_period_ms: u64,
    /// Stands in for the edge-ISR accumulator.
    pub isr_low_us: u32,
    pub pump_writes: Vec<(u64, bool)>,
    pub delays: Vec<u32>,
    pub moisture_reads: u32,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            wall: None,
            climate: ClimateReading {
                temperature_c: 20.0,
                pressure_pa: 101_325.0,
                humidity_pct: 40.0,
            },
            air_quality: 321,
            moisture: 1_800,
            button: false,
            pulse_low_us: 0,
            pulse_period_ms: 100,
            isr_low_us: 0,
            pump_writes: Vec::new(),
            delays: Vec::new(),
            moisture_reads: 0,
        }
    }

    /// Level of the most recent relay write.
    pub fn pump_on(&self) -> bool {
        self.pump_writes.last().is_some_and(|&(_, on)| on)
    }

    pub fn pump_levels(&self) -> Vec<bool> {
        self.pump_writes.iter().map(|&(_, on)| on).collect()
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for MockBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ms += u64::from(ns) / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.now_ms += u64::from(ms);
    }
}

impl ClockPort for MockBoard {
    fn uptime_ms(&self) -> u64 {
        self.now_ms
    }

    fn wall_clock(&self) -> Option<WallClock> {
        self.wall
    }
}

impl SensorPort for MockBoard {
    fn read_climate(&mut self) -> ClimateReading {
        self.climate
    }

    fn read_air_quality(&mut self) -> i32 {
        self.air_quality
    }

    fn read_moisture(&mut self) -> u16 {
        self.moisture_reads += 1;
        self.moisture
    }

    fn button_pressed(&mut self) -> bool {
        self.button
    }

    fn dust_low_pulse_us(&mut self, timeout_us: u32) -> u32 {
        self.now_ms += self.pulse_period_ms;
        self.pulse_low_us.min(timeout_us)
    }

    fn take_dust_low_pulse_us(&mut self) -> u32 {
        std::mem::take(&mut self.isr_low_us)
    }
}

impl ActuatorPort for MockBoard {
    fn set_pump(&mut self, on: bool) {
        self.pump_writes.push((self.now_ms, on));
    }
}

// ── MockPanel ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPanel {
    pub rows: HashMap<Region, String>,
    pub writes: Vec<(Region, String)>,
    pub clears: u32,
    pub flushes: u32,
}

#[allow(dead_code)]
impl MockPanel {
    pub fn row(&self, region: Region) -> &str {
        self.rows.get(&region).map_or("", String::as_str)
    }

    pub fn writes_to(&self, region: Region) -> usize {
        self.writes.iter().filter(|(r, _)| *r == region).count()
    }
}

impl DisplayPort for MockPanel {
    fn clear(&mut self) {
        self.clears += 1;
        self.rows.clear();
    }

    fn clear_region(&mut self, region: Region) {
        self.rows.remove(&region);
    }

    fn write_line(&mut self, region: Region, text: &str) {
        self.rows.insert(region, text.to_owned());
        self.writes.push((region, text.to_owned()));
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn dust_samples(&self) -> Vec<f32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::DustSampled { concentration } => Some(*concentration),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A scheduler wired to the mock board, panel, sink and in-memory broker.
pub struct Rig {
    pub scheduler: Scheduler<SimBroker>,
    pub hw: MockBoard,
    pub panel: MockPanel,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(config: SystemConfig) -> Self {
        let hw = MockBoard::new();
        let scheduler = Scheduler::new(config, SimBroker::new(), hw.now_ms).unwrap();
        Self {
            scheduler,
            hw,
            panel: MockPanel::default(),
            sink: RecordingSink::default(),
        }
    }

    pub fn iterate(&mut self) {
        self.scheduler
            .iterate(&mut self.hw, &mut self.panel, &mut self.sink);
    }

    /// Advance virtual time by `ms`, then run one iteration.
    pub fn step(&mut self, ms: u64) {
        self.hw.now_ms += ms;
        self.iterate();
    }

    /// Iterate every `step_ms` until virtual time reaches `t_ms`.
    pub fn run_until(&mut self, t_ms: u64, step_ms: u64) {
        while self.hw.now_ms < t_ms {
            self.step(step_ms);
        }
    }

    pub fn broker(&mut self) -> &mut SimBroker {
        self.scheduler.connection_mut().broker_mut()
    }

    /// Deliver a payload on the pump-command topic.
    pub fn command(&mut self, payload: &str) {
        let topic = self.scheduler.topics().pump.clone();
        self.broker().deliver(&topic, payload);
    }
}
