//! Outbound application events.
//!
//! The [`Scheduler`](crate::scheduler::Scheduler) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them (serial log, test recorder).

use crate::app::commands::PumpIntent;
use crate::pump::PumpTrigger;

/// Structured events emitted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The five readings were published to the broker.
    Telemetry(TelemetryData),

    /// Publish was due but the broker session is down.
    PublishSkipped,

    /// The pump relay was driven.
    PumpChanged { on: bool, trigger: PumpTrigger },

    /// A remote command was drained and parsed.
    CommandReceived(PumpIntent),

    /// A particulate sample completed.
    DustSampled { concentration: f32 },

    /// Broker session established.
    Connected { attempts: u32 },

    /// Broker session dropped (keepalive failure or retries exhausted).
    Disconnected,

    /// The button was pressed and the display cleared.
    DisplayCleared,
}

/// The published reading set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryData {
    pub humidity_pct: f32,
    pub temperature_f: f32,
    pub air_quality: i32,
    pub moisture_raw: u16,
    /// `0.0` until the first dust sample completes.
    pub dust_concentration: f32,
}
