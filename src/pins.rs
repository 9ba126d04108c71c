//! GPIO / peripheral pin assignments for the PlantCare board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Pump relay
// ---------------------------------------------------------------------------

/// Digital output: HIGH = pump running.
pub const PUMP_GPIO: i32 = 11;

// ---------------------------------------------------------------------------
// Sensors: Analog (ADC1)
// ---------------------------------------------------------------------------

/// Capacitive soil-moisture probe.  ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const MOISTURE_ADC_CHANNEL: u32 = 4;

/// Air-quality sensor analog output.  ADC1 channel 3 (GPIO 4 on ESP32-S3).
pub const AIR_QUALITY_ADC_CHANNEL: u32 = 3;

// ---------------------------------------------------------------------------
// Sensors: Digital / Pulse
// ---------------------------------------------------------------------------

/// Optical dust sensor output.  LOW while particles occlude the beam.
pub const DUST_PULSE_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// I²C bus (climate sensor)
// ---------------------------------------------------------------------------

/// `main` hands the matching typed pins to the I²C driver and checks them
/// against these at compile time.
pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;

/// Climate sensor bus address (SDO tied low).
pub const CLIMATE_I2C_ADDR: u8 = 0x76;
// ---------------------------------------------------------------------------
// User button (active-high with external pull-down)
// ---------------------------------------------------------------------------

/// Momentary push-button that blanks the display.
pub const BUTTON_GPIO: i32 = 16;
