//! BME280 temperature / pressure / humidity sensor.
//!
//! Calibration parsing and compensation are pure and run on the host; only
//! the I²C transfers are ESP-IDF specific.  The sensor keeps the last good
//! reading so a failed bus transfer shows stale values instead of zeros.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: burst-reads the data registers over I²C (bus owned by main).
//! On host/test: reads from static atomics for injection.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::warn;

use crate::app::ports::ClimateReading;

#[cfg(target_os = "espidf")]
use esp_idf_hal::i2c::I2cDriver;

pub const CHIP_ID: u8 = 0x60;

#[cfg(target_os = "espidf")]
mod reg {
    pub const CALIB_00: u8 = 0x88;
    pub const CALIB_H1: u8 = 0xA1;
    pub const CHIP_ID: u8 = 0xD0;
    pub const CALIB_26: u8 = 0xE1;
    pub const CTRL_HUM: u8 = 0xF2;
    pub const CTRL_MEAS: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF5;
    pub const DATA: u8 = 0xF7;
}

// ── Simulation injection (host) ───────────────────────────────

static SIM_TEMP_BITS: AtomicU32 = AtomicU32::new(0x41C8_0000); // 25.0
static SIM_PRESS_BITS: AtomicU32 = AtomicU32::new(0x47C5_E680); // 101325.0
static SIM_HUM_BITS: AtomicU32 = AtomicU32::new(0x4220_0000); // 40.0
static SIM_FAIL: AtomicBool = AtomicBool::new(false);

pub fn sim_set_climate(reading: ClimateReading) {
    SIM_TEMP_BITS.store(reading.temperature_c.to_bits(), Ordering::Relaxed);
    SIM_PRESS_BITS.store(reading.pressure_pa.to_bits(), Ordering::Relaxed);
    SIM_HUM_BITS.store(reading.humidity_pct.to_bits(), Ordering::Relaxed);
}

/// Make subsequent simulated bus reads fail (host only).
pub fn sim_set_climate_fault(fail: bool) {
    SIM_FAIL.store(fail, Ordering::Relaxed);
}

// ── Compensation ──────────────────────────────────────────────

/// Factory trim values burned into the sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

/// Uncompensated ADC words from one burst read of 0xF7..=0xFE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub adc_p: i32,
    pub adc_t: i32,
    pub adc_h: i32,
}

impl RawSample {
    pub fn from_registers(r: &[u8; 8]) -> Self {
        let w20 = |msb: u8, lsb: u8, xlsb: u8| {
            (i32::from(msb) << 12) | (i32::from(lsb) << 4) | (i32::from(xlsb) >> 4)
        };
        Self {
            adc_p: w20(r[0], r[1], r[2]),
            adc_t: w20(r[3], r[4], r[5]),
            adc_h: (i32::from(r[6]) << 8) | i32::from(r[7]),
        }
    }
}

impl Calibration {
    /// Decode the two calibration blocks (0x88..=0xA1 and 0xE1..=0xE7).
    pub fn from_registers(block1: &[u8; 26], h1: u8, block2: &[u8; 7]) -> Self {
        let u = |i: usize| u16::from_le_bytes([block1[i], block1[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([block1[i], block1[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
            h1,
            h2: i16::from_le_bytes([block2[0], block2[1]]),
            h3: block2[2],
            h4: (i16::from(block2[3] as i8) << 4) | i16::from(block2[4] & 0x0F),
            h5: (i16::from(block2[5] as i8) << 4) | i16::from(block2[4] >> 4),
            h6: block2[6] as i8,
        }
    }

    /// Fine temperature shared by the pressure and humidity formulas.
    fn t_fine(&self, adc_t: i32) -> i32 {
        let t1 = i32::from(self.t1);
        let var1 = (((adc_t >> 3) - (t1 << 1)) * i32::from(self.t2)) >> 11;
        let d = (adc_t >> 4) - t1;
        let var2 = (((d * d) >> 12) * i32::from(self.t3)) >> 14;
        var1 + var2
    }

    /// Pressure in Pa, 64-bit integer datasheet formula.
    fn pressure_pa(&self, adc_p: i32, t_fine: i32) -> f32 {
        let mut var1 = i64::from(t_fine) - 128_000;
        let mut var2 = var1 * var1 * i64::from(self.p6);
        var2 += (var1 * i64::from(self.p5)) << 17;
        var2 += i64::from(self.p4) << 35;
        var1 = ((var1 * var1 * i64::from(self.p3)) >> 8) + ((var1 * i64::from(self.p2)) << 12);
        var1 = (((1i64 << 47) + var1) * i64::from(self.p1)) >> 33;
        if var1 == 0 {
            return 0.0;
        }
        let mut p = 1_048_576 - i64::from(adc_p);
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (i64::from(self.p9) * (p >> 13) * (p >> 13)) >> 25;
        var2 = (i64::from(self.p8) * p) >> 19;
        p = ((p + var1 + var2) >> 8) + (i64::from(self.p7) << 4);
        p as f32 / 256.0
    }

    /// Relative humidity in %, clamped to 0–100.
    fn humidity_pct(&self, adc_h: i32, t_fine: i32) -> f32 {
        let v = i64::from(t_fine) - 76_800;
        let (h1, h2, h3) = (i64::from(self.h1), i64::from(self.h2), i64::from(self.h3));
        let (h4, h5, h6) = (i64::from(self.h4), i64::from(self.h5), i64::from(self.h6));

        let a = ((i64::from(adc_h) << 14) - (h4 << 20) - (h5 * v) + 16_384) >> 15;
        let b = ((((((v * h6) >> 10) * (((v * h3) >> 11) + 32_768)) >> 10) + 2_097_152) * h2 + 8_192)
            >> 14;
        let mut h = a * b;
        h -= ((((h >> 15) * (h >> 15)) >> 7) * h1) >> 4;
        let h = h.clamp(0, 419_430_400);
        (h >> 12) as f32 / 1024.0
    }

    pub fn compensate(&self, raw: RawSample) -> ClimateReading {
        let t_fine = self.t_fine(raw.adc_t);
        ClimateReading {
            temperature_c: ((t_fine * 5 + 128) >> 8) as f32 / 100.0,
            pressure_pa: self.pressure_pa(raw.adc_p, t_fine),
            humidity_pct: self.humidity_pct(raw.adc_h, t_fine),
        }
    }
}

// ── Sensor ────────────────────────────────────────────────────

pub struct ClimateSensor {
    address: u8,
    calibration: Calibration,
    last_good: ClimateReading,
    failures: u32,
}

impl ClimateSensor {
    /// Host constructor: no bus, readings come from `sim_set_climate`.
    pub fn new(address: u8) -> Self {
        Self {
            address,
            calibration: Calibration::default(),
            last_good: ClimateReading::default(),
            failures: 0,
        }
    }

    /// Probe the chip ID, load calibration and start normal-mode sampling.
    #[cfg(target_os = "espidf")]
    pub fn probe(i2c: &mut I2cDriver<'_>, address: u8) -> Result<Self, crate::error::SensorError> {
        use crate::error::SensorError;
        const T: u32 = 100;

        let not_found = |_| SensorError::ClimateNotFound(address);
        let mut id = [0u8];
        i2c.write_read(address, &[reg::CHIP_ID], &mut id, T).map_err(not_found)?;
        if id[0] != CHIP_ID {
            return Err(SensorError::ClimateNotFound(address));
        }

        let mut block1 = [0u8; 26];
        let mut h1 = [0u8];
        let mut block2 = [0u8; 7];
        i2c.write_read(address, &[reg::CALIB_00], &mut block1, T).map_err(not_found)?;
        i2c.write_read(address, &[reg::CALIB_H1], &mut h1, T).map_err(not_found)?;
        i2c.write_read(address, &[reg::CALIB_26], &mut block2, T).map_err(not_found)?;

        // Oversampling x1 everywhere, 1 s standby, filter off, normal mode.
        for cmd in [[reg::CTRL_HUM, 0x01], [reg::CONFIG, 0xA0], [reg::CTRL_MEAS, 0x27]] {
            i2c.write(address, &cmd, T).map_err(not_found)?;
        }

        log::info!("climate: BME280 found at 0x{:02X}", address);
        Ok(Self {
            address,
            calibration: Calibration::from_registers(&block1, h1[0], &block2),
            last_good: ClimateReading::default(),
            failures: 0,
        })
    }

    #[cfg(target_os = "espidf")]
    pub fn read(&mut self, i2c: &mut I2cDriver<'_>) -> ClimateReading {
        let mut regs = [0u8; 8];
        match i2c.write_read(self.address, &[reg::DATA], &mut regs, 100) {
            Ok(()) => {
                self.last_good = self.calibration.compensate(RawSample::from_registers(&regs));
            }
            Err(e) => self.record_failure(&e),
        }
        self.last_good
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn read(&mut self) -> ClimateReading {
        if SIM_FAIL.load(Ordering::Relaxed) {
            self.record_failure(&"simulated bus fault");
        } else {
            self.last_good = ClimateReading {
                temperature_c: f32::from_bits(SIM_TEMP_BITS.load(Ordering::Relaxed)),
                pressure_pa: f32::from_bits(SIM_PRESS_BITS.load(Ordering::Relaxed)),
                humidity_pct: f32::from_bits(SIM_HUM_BITS.load(Ordering::Relaxed)),
            };
        }
        self.last_good
    }

    fn record_failure(&mut self, cause: &dyn core::fmt::Debug) {
        self.failures = self.failures.wrapping_add(1);
        warn!(
            "climate: read at 0x{:02X} failed ({:?}), keeping last value",
            self.address, cause
        );
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }
}
