//! Unified error types for the PlantCare firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the scheduler and logged without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or failed to initialise.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// The broker link failed.
    Comms(CommsError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The climate sensor did not answer at its bus address.
    ClimateNotFound(u8),
    /// ADC conversion returned an error.
    AdcReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClimateNotFound(addr) => write!(f, "climate sensor not found at 0x{addr:02X}"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// Broker refused or could not be reached.
    ConnectFailed(ConnectError),
    /// The bounded retry policy gave up.
    RetriesExhausted { attempts: u32 },
    /// Publish was rejected by the transport.
    PublishFailed,
    /// Operation requires an established session.
    NotConnected,
    /// Topic does not fit its fixed-capacity buffer.
    TopicTooLong,
    /// Formatted payload does not fit its fixed-capacity buffer.
    PayloadTooLong,
    /// No room left in the subscription table.
    SubscriptionsFull,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed(e) => write!(f, "connect failed: {e}"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "gave up after {attempts} connect attempts")
            }
            Self::PublishFailed => write!(f, "publish failed"),
            Self::NotConnected => write!(f, "not connected"),
            Self::TopicTooLong => write!(f, "topic too long"),
            Self::PayloadTooLong => write!(f, "payload too long"),
            Self::SubscriptionsFull => write!(f, "subscription table full"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

/// Broker connect outcome codes.
///
/// Codes 1–5 are the MQTT 3.1.1 CONNACK return codes; the remaining
/// variants cover failures before a CONNACK is ever received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ConnectError {
    WrongProtocol = 1,
    IdRejected = 2,
    ServerUnavailable = 3,
    BadCredentials = 4,
    NotAuthorized = 5,
    Network = -1,
    Timeout = -2,
}

impl ConnectError {
    /// Numeric code as reported in the connect log line.
    pub const fn code(self) -> i8 {
        self as i8
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongProtocol => write!(f, "The Server does not support the level of the MQTT protocol requested"),
            Self::IdRejected => write!(f, "The Client identifier is correct UTF-8 but not allowed by the Server"),
            Self::ServerUnavailable => write!(f, "The MQTT service is unavailable"),
            Self::BadCredentials => write!(f, "The data in the user name or password is malformed"),
            Self::NotAuthorized => write!(f, "Not authorized to connect"),
            Self::Network => write!(f, "Connection failed"),
            Self::Timeout => write!(f, "Connection timed out"),
        }
    }
}

impl From<ConnectError> for CommsError {
    fn from(e: ConnectError) -> Self {
        Self::ConnectFailed(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
