//! Port traits: the hexagonal boundary between the controller and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Scheduler (domain)
//! ```
//!
//! Driven adapters (sensors, pump relay, display, broker, event sinks)
//! implement these traits.  The [`Scheduler`](crate::scheduler::Scheduler)
//! consumes them via generics, so the control logic never touches hardware
//! directly and runs unchanged against the mock board in `tests/`.

use embedded_hal::delay::DelayNs;

use crate::app::commands::RemoteCommand;
use crate::error::{CommsError, ConnectError};

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Local time of day as shown on the status view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Monotonic uptime plus a blocking delay.
///
/// The delay comes from [`DelayNs`] so any embedded-hal delay provider can
/// back it; the simulated clock in tests advances virtual time instead.
pub trait ClockPort: DelayNs {
    /// Milliseconds since boot.
    fn uptime_ms(&self) -> u64;

    /// Local wall-clock time, or `None` before the network time sync.
    fn wall_clock(&self) -> Option<WallClock>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Raw output of the temperature / pressure / humidity sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub pressure_pa: f32,
    pub humidity_pct: f32,
}

/// Read-side port: the domain calls this to obtain sensor data.
///
/// All reads are synchronous and assumed to return immediately, except
/// [`dust_low_pulse_us`](Self::dust_low_pulse_us) which blocks for up to
/// `timeout_us`.
pub trait SensorPort {
    fn read_climate(&mut self) -> ClimateReading;

    /// Air-quality scalar (unitless, the raw ADC value on this board).
    fn read_air_quality(&mut self) -> i32;

    /// Raw soil-moisture ADC value (0–4095).
    fn read_moisture(&mut self) -> u16;

    /// Level of the active-high push button.
    fn button_pressed(&mut self) -> bool;

    /// Width of the next low pulse on the dust input in microseconds, or 0
    /// if none completes within `timeout_us`.
    fn dust_low_pulse_us(&mut self, timeout_us: u32) -> u32;

    /// Low-pulse time accumulated by the edge ISR since the last call,
    /// resetting the accumulator.
    fn take_dust_low_pulse_us(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

pub trait ActuatorPort {
    /// Drive the pump relay.  Idempotent.
    fn set_pump(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Display port
// ───────────────────────────────────────────────────────────────

/// Fixed single-line regions of the status view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Clock,
    Climate,
    AirQuality,
    Moisture,
    Dust,
    Pump,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Clock,
        Region::Climate,
        Region::AirQuality,
        Region::Moisture,
        Region::Dust,
        Region::Pump,
    ];

    /// Text row (8 px each on a 128×64 panel).
    pub const fn row(self) -> u8 {
        match self {
            Region::Clock => 0,
            Region::Climate => 2,
            Region::AirQuality => 3,
            Region::Moisture => 4,
            Region::Dust => 5,
            Region::Pump => 7,
        }
    }
}

/// Region-addressable monochrome text surface.
pub trait DisplayPort {
    /// Blank the whole surface.
    fn clear(&mut self);
    fn clear_region(&mut self, region: Region);
    /// Replace the content of `region` with one line of text.
    fn write_line(&mut self, region: Region, text: &str);
    /// Commit pending writes to the panel.
    fn flush(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Broker port (publish/subscribe transport)
// ───────────────────────────────────────────────────────────────

/// Contract of the telemetry broker client.  The transport itself is an
/// external collaborator; only this surface is used by the domain.
pub trait BrokerPort {
    /// Register a subscription.  Takes effect on the next connect.
    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError>;

    /// Attempt one connect.  Blocks for the duration of the handshake.
    fn connect(&mut self) -> Result<(), ConnectError>;

    /// Tear down the session.  Safe to call when already disconnected.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Liveness round-trip.  `false` means the session is dead.
    fn ping(&mut self) -> bool;

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CommsError>;

    /// Next pending message on a subscribed topic, waiting at most
    /// `timeout_ms` for one to arrive.
    fn read_subscription(&mut self, timeout_ms: u32) -> Option<RemoteCommand>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
