//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production) as pipe-delimited
//! lines that are easy to grep from a serial capture.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | T={:.1}\u{00b0}F | RH={:.1}% | air={} | moisture={} | dust={:.2}",
                    t.temperature_f,
                    t.humidity_pct,
                    t.air_quality,
                    t.moisture_raw,
                    t.dust_concentration,
                );
            }
            AppEvent::PublishSkipped => {
                warn!("TELEM | skipped, broker disconnected");
            }
            AppEvent::PumpChanged { on, trigger } => {
                info!("PUMP | {} | trigger={:?}", if *on { "ON" } else { "OFF" }, trigger);
            }
            AppEvent::CommandReceived(intent) => {
                info!("CMD | {:?}", intent);
            }
            AppEvent::DustSampled { concentration } => {
                info!("DUST | {:.2} pcs/0.01cf", concentration);
            }
            AppEvent::Connected { attempts } => {
                info!("MQTT | connected after {} attempt(s)", attempts);
            }
            AppEvent::Disconnected => {
                warn!("MQTT | disconnected");
            }
            AppEvent::DisplayCleared => {
                info!("UI | display cleared");
            }
        }
    }
}
