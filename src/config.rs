//! System configuration parameters
//!
//! All tunable parameters for the PlantCare controller.  Defaults reproduce
//! the field-deployed timing; a JSON override can be supplied at build time
//! through the `PLANTCARE_CONFIG` environment variable.

use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::app::commands::TOPIC_CAP;
use crate::error::{CommsError, Error};

/// How the connection manager behaves when the broker refuses a connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Block and retry at a fixed delay until the broker accepts.
    Forever { delay_ms: u32 },
    /// Give up after `max_attempts`, doubling the delay up to `max_delay_ms`.
    /// Opt-in only; the default config retries forever.
    Bounded {
        max_attempts: u32,
        initial_delay_ms: u32,
        max_delay_ms: u32,
    },
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> u32 {
        match *self {
            Self::Forever { delay_ms } => delay_ms,
            Self::Bounded {
                initial_delay_ms,
                max_delay_ms,
                ..
            } => {
                let shift = attempt.saturating_sub(1).min(16);
                initial_delay_ms
                    .saturating_mul(1 << shift)
                    .min(max_delay_ms)
            }
        }
    }

    /// `true` if another attempt is allowed after `attempts` failures.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        match *self {
            Self::Forever { .. } => true,
            Self::Bounded { max_attempts, .. } => attempts < max_attempts,
        }
    }
}

/// Particulate sampling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DustSampling {
    /// Busy-measure pulses for the whole window, stalling the loop.
    Blocking,
    /// Accumulate pulses from the edge ISR while the loop keeps ticking.
    Interrupt,
}

/// Broker endpoint and feed naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub server: heapless::String<48>,
    pub port: u16,
    pub username: heapless::String<32>,
    pub key: heapless::String<48>,
    /// Feed carrying remote pump commands.
    pub pump_feed: heapless::String<24>,
    pub humidity_feed: heapless::String<24>,
    pub temperature_feed: heapless::String<24>,
    pub air_quality_feed: heapless::String<24>,
    pub moisture_feed: heapless::String<24>,
    pub dust_feed: heapless::String<24>,
}

fn hstr<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl BrokerConfig {
    /// Full topic for a feed: `"{username}/feeds/{feed}"`.
    pub fn topic(&self, feed: &str) -> Result<heapless::String<TOPIC_CAP>, CommsError> {
        let mut t = heapless::String::new();
        write!(t, "{}/feeds/{}", self.username, feed).map_err(|_| CommsError::TopicTooLong)?;
        Ok(t)
    }

    /// `mqtt://host:port` for the client library.
    pub fn url(&self) -> heapless::String<64> {
        let mut u = heapless::String::new();
        // 48-byte host + port always fits.
        let _ = write!(u, "mqtt://{}:{}", self.server, self.port);
        u
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            server: hstr("io.adafruit.com"),
            port: 1883,
            username: hstr(option_env!("AIO_USERNAME").unwrap_or("plantcare")),
            key: hstr(option_env!("AIO_KEY").unwrap_or("")),
            pump_feed: hstr("turnonpump"),
            humidity_feed: hstr("humidity"),
            temperature_feed: hstr("temperature"),
            air_quality_feed: hstr("airquality"),
            moisture_feed: hstr("moisture"),
            dust_feed: hstr("dust"),
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Status view ---
    /// Clock region repaint period (milliseconds)
    pub status_refresh_ms: u32,
    /// First clock repaint after boot (milliseconds)
    pub status_initial_ms: u32,

    // --- Sensors ---
    /// Sensor read + full repaint period (milliseconds)
    pub sensor_refresh_ms: u32,
    /// First sensor read after boot (milliseconds)
    pub sensor_initial_ms: u32,

    // --- Telemetry ---
    /// Publish period (milliseconds)
    pub publish_interval_ms: u32,
    /// First publish after boot (milliseconds)
    pub publish_initial_ms: u32,

    // --- Particulate ---
    /// Dust sampling cycle period (milliseconds)
    pub dust_interval_ms: u32,
    /// First dust sample after boot (milliseconds)
    pub dust_initial_ms: u32,
    /// Low-pulse accumulation window (milliseconds)
    pub dust_window_ms: u32,
    /// Timeout for one blocking pulse measurement (microseconds)
    pub pulse_timeout_us: u32,
    pub dust_sampling: DustSampling,

    // --- Pump ---
    /// Watering duration after any ON transition (milliseconds)
    pub pump_cutoff_ms: u32,
    /// Raw moisture ADC above which the soil is considered dry
    pub water_above_threshold: u16,

    // --- Broker ---
    pub broker: BrokerConfig,
    pub retry: RetryPolicy,
    /// Minimum spacing between keepalive pings (milliseconds)
    pub keepalive_interval_ms: u32,
    /// Per-call wait when polling the command subscription (milliseconds)
    pub subscription_poll_ms: u32,

    // --- Clock ---
    /// Local time offset from UTC (hours)
    pub utc_offset_hours: i8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            status_refresh_ms: 1_000,
            status_initial_ms: 100,

            sensor_refresh_ms: 15_000,
            sensor_initial_ms: 1_000,

            publish_interval_ms: 120_000,
            publish_initial_ms: 120_000,

            dust_interval_ms: 30 * 60 * 1_000,
            dust_initial_ms: 1_000,
            dust_window_ms: 30_000,
            pulse_timeout_us: 1_000_000,
            dust_sampling: DustSampling::Interrupt,

            pump_cutoff_ms: 500,
            water_above_threshold: 2_500,

            broker: BrokerConfig::default(),
            retry: RetryPolicy::Forever { delay_ms: 5_000 },
            keepalive_interval_ms: 120_000,
            subscription_poll_ms: 100,

            utc_offset_hours: -6,
        }
    }
}

impl SystemConfig {
    /// Field-parity timing: the default config with a blocking dust sample.
    pub fn parity() -> Self {
        Self {
            dust_sampling: DustSampling::Blocking,
            ..Self::default()
        }
    }

    /// Parse a JSON override and validate it.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would wedge the scheduler.
    pub fn validate(&self) -> Result<(), Error> {
        let periods = [
            self.status_refresh_ms,
            self.sensor_refresh_ms,
            self.publish_interval_ms,
            self.dust_interval_ms,
            self.dust_window_ms,
            self.pump_cutoff_ms,
            self.keepalive_interval_ms,
        ];
        if periods.contains(&0) {
            return Err(Error::Config("periods must be non-zero"));
        }
        if self.dust_window_ms >= self.dust_interval_ms {
            return Err(Error::Config("dust window must be shorter than its cycle"));
        }
        if self.pump_cutoff_ms >= self.sensor_refresh_ms {
            return Err(Error::Config("pump cutoff must be shorter than sensor refresh"));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(Error::Config("utc offset out of range"));
        }
        if self.broker.username.is_empty() {
            return Err(Error::Config("broker username is empty"));
        }
        match self.retry {
            RetryPolicy::Forever { delay_ms } if delay_ms == 0 => {
                Err(Error::Config("retry delay must be non-zero"))
            }
            RetryPolicy::Bounded {
                max_attempts,
                initial_delay_ms,
                max_delay_ms,
            } if max_attempts == 0 || initial_delay_ms == 0 || max_delay_ms < initial_delay_ms => {
                Err(Error::Config("bounded retry parameters invalid"))
            }
            _ => Ok(()),
        }
    }
}
