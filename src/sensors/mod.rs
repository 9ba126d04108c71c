//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor input on the board and is wrapped by the
//! hardware adapter to serve the [`SensorPort`](crate::app::ports::SensorPort).
//! Unit conversions applied to raw readings live here too.

pub mod climate;
pub mod particulate;

use log::warn;

use crate::app::ports::ClimateReading;
use crate::drivers::hw_init;
use crate::pins;
use climate::ClimateSensor;

#[cfg(target_os = "espidf")]
use esp_idf_hal::i2c::I2cDriver;

/// Inches of mercury per pascal.
pub const IN_HG_PER_PA: f32 = 0.000_295_30;

pub fn celsius_to_fahrenheit(c: f32) -> f32 {
    c * 9.0 / 5.0 + 32.0
}

pub fn pascals_to_in_hg(pa: f32) -> f32 {
    pa * IN_HG_PER_PA
}

/// Owns every sensor input.
pub struct SensorHub {
    climate: Option<ClimateSensor>,
    /// Last good ADC values, served again when a conversion fails.
    air_quality: i32,
    moisture: u16,
    #[cfg(target_os = "espidf")]
    i2c: I2cDriver<'static>,
}

impl SensorHub {
    /// Probe the climate sensor on the shared bus.  A missing sensor is
    /// logged and its readings stay at zero; the rest of the board works.
    #[cfg(target_os = "espidf")]
    pub fn new(mut i2c: I2cDriver<'static>) -> Self {
        let climate = match ClimateSensor::probe(&mut i2c, pins::CLIMATE_I2C_ADDR) {
            Ok(sensor) => Some(sensor),
            Err(e) => {
                log::error!("sensors: {}", e);
                None
            }
        };
        Self {
            climate,
            air_quality: 0,
            moisture: 0,
            i2c,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            climate: Some(ClimateSensor::new(pins::CLIMATE_I2C_ADDR)),
            air_quality: 0,
            moisture: 0,
        }
    }

    #[cfg(target_os = "espidf")]
    pub fn read_climate(&mut self) -> ClimateReading {
        match self.climate.as_mut() {
            Some(sensor) => sensor.read(&mut self.i2c),
            None => ClimateReading::default(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn read_climate(&mut self) -> ClimateReading {
        self.climate
            .as_mut()
            .map_or_else(ClimateReading::default, ClimateSensor::read)
    }

    pub fn climate_present(&self) -> bool {
        self.climate.is_some()
    }

    /// Raw air-quality ADC value.
    pub fn read_air_quality(&mut self) -> i32 {
        match hw_init::adc1_read(pins::AIR_QUALITY_ADC_CHANNEL) {
            Ok(raw) => self.air_quality = i32::from(raw),
            Err(e) => warn!("sensors: air quality {}, keeping {}", e, self.air_quality),
        }
        self.air_quality
    }

    /// Raw soil-moisture ADC value, 0–4095.  Higher is drier.
    pub fn read_moisture(&mut self) -> u16 {
        match hw_init::adc1_read(pins::MOISTURE_ADC_CHANNEL) {
            Ok(raw) => self.moisture = raw,
            Err(e) => warn!("sensors: moisture {}, keeping {}", e, self.moisture),
        }
        self.moisture
    }

    pub fn button_pressed(&mut self) -> bool {
        hw_init::gpio_read(pins::BUTTON_GPIO)
    }

    pub fn dust_low_pulse_us(&mut self, timeout_us: u32) -> u32 {
        hw_init::pulse_in_low(pins::DUST_PULSE_GPIO, timeout_us)
    }

    pub fn take_dust_low_pulse_us(&mut self) -> u32 {
        particulate::take_low_pulse_us()
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SensorHub {
    fn default() -> Self {
        Self::new()
    }
}
