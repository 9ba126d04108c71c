//! Status view: formats the controller state into fixed display regions.
//!
//! ```text
//!   row 0  14:03:27
//!   row 2  T 72.5F H 41.0%
//!   row 3  Air Quality = 312
//!   row 4  Moisture 2731
//!   row 5  Dust 12.47
//!   row 7  Pump OFF
//! ```
//!
//! Lines are built in fixed-capacity buffers sized to the 21-column panel;
//! a formatted segment that would overflow is dropped.

use core::fmt::{self, Write as _};

use crate::app::ports::{DisplayPort, Region, WallClock};
use crate::context::ReadingSet;

/// Characters per row on a 128 px panel with a 6 px font.
pub const LINE_CAP: usize = 21;

pub type Line = heapless::String<LINE_CAP>;

fn line(args: fmt::Arguments<'_>) -> Line {
    let mut out = Line::new();
    // A segment that does not fit is dropped whole.
    let _ = out.write_fmt(args);
    out
}

pub fn clock_line(wall: Option<WallClock>, uptime_ms: u64) -> Line {
    match wall {
        Some(t) => line(format_args!("{:02}:{:02}:{:02}", t.hour, t.minute, t.second)),
        None => {
            let secs = uptime_ms / 1_000;
            line(format_args!(
                "Up {:02}:{:02}:{:02}",
                (secs / 3_600) % 100,
                (secs / 60) % 60,
                secs % 60
            ))
        }
    }
}

pub fn climate_line(r: &ReadingSet) -> Line {
    line(format_args!("T {:.1}F H {:.1}%", r.temperature_f, r.humidity_pct))
}

pub fn air_quality_line(r: &ReadingSet) -> Line {
    line(format_args!("Air Quality = {}", r.air_quality))
}

pub fn moisture_line(r: &ReadingSet) -> Line {
    line(format_args!("Moisture {}", r.moisture_raw))
}

pub fn dust_line(r: &ReadingSet) -> Line {
    line(format_args!("Dust {:.2}", r.dust_concentration))
}

pub fn pump_line(on: bool) -> Line {
    line(format_args!("Pump {}", if on { "ON" } else { "OFF" }))
}

pub const SAMPLING_BANNER: &str = "Sampling dust";

/// Stateless painter over a [`DisplayPort`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusView;

impl StatusView {
    pub fn clear(&self, display: &mut impl DisplayPort) {
        display.clear();
        display.flush();
    }

    /// Repaint only the time-of-day region.
    pub fn repaint_clock(
        &self,
        display: &mut impl DisplayPort,
        wall: Option<WallClock>,
        uptime_ms: u64,
    ) {
        display.clear_region(Region::Clock);
        display.write_line(Region::Clock, &clock_line(wall, uptime_ms));
        display.flush();
    }

    /// Repaint every region from the current readings.
    pub fn repaint_all(
        &self,
        display: &mut impl DisplayPort,
        readings: &ReadingSet,
        wall: Option<WallClock>,
        uptime_ms: u64,
        pump_on: bool,
    ) {
        for region in Region::ALL {
            display.clear_region(region);
            let text = match region {
                Region::Clock => clock_line(wall, uptime_ms),
                Region::Climate => climate_line(readings),
                Region::AirQuality => air_quality_line(readings),
                Region::Moisture => moisture_line(readings),
                Region::Dust => dust_line(readings),
                Region::Pump => pump_line(pump_on),
            };
            display.write_line(region, &text);
        }
        display.flush();
    }

    pub fn show_pump(&self, display: &mut impl DisplayPort, on: bool) {
        display.clear_region(Region::Pump);
        display.write_line(Region::Pump, &pump_line(on));
        display.flush();
    }

    /// Shown in the dust region while a blocking sample holds the loop.
    pub fn show_sampling_banner(&self, display: &mut impl DisplayPort) {
        display.clear_region(Region::Dust);
        display.write_line(Region::Dust, SAMPLING_BANNER);
        display.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Panel {
        rows: [String; 8],
        flushes: u32,
    }

    impl DisplayPort for Panel {
        fn clear(&mut self) {
            self.rows = Default::default();
        }

        fn clear_region(&mut self, region: Region) {
            self.rows[usize::from(region.row())].clear();
        }

        fn write_line(&mut self, region: Region, text: &str) {
            self.rows[usize::from(region.row())] = text.into();
        }

        fn flush(&mut self) {
            self.flushes += 1;
        }
    }

    fn readings() -> ReadingSet {
        ReadingSet {
            temperature_f: 72.46,
            pressure_in_hg: 29.9,
            humidity_pct: 41.0,
            air_quality: 312,
            moisture_raw: 2731,
            dust_concentration: 12.466,
        }
    }

    #[test]
    fn wall_clock_is_zero_padded() {
        let t = WallClock { hour: 4, minute: 3, second: 9 };
        assert_eq!(clock_line(Some(t), 0).as_str(), "04:03:09");
    }

    #[test]
    fn uptime_fallback_before_sync() {
        assert_eq!(clock_line(None, 3_723_000).as_str(), "Up 01:02:03");
    }

    #[test]
    fn full_repaint_fills_every_region() {
        let mut panel = Panel::default();
        let t = WallClock { hour: 14, minute: 3, second: 27 };
        StatusView.repaint_all(&mut panel, &readings(), Some(t), 0, false);
        assert_eq!(panel.rows[0], "14:03:27");
        assert_eq!(panel.rows[2], "T 72.5F H 41.0%");
        assert_eq!(panel.rows[3], "Air Quality = 312");
        assert_eq!(panel.rows[4], "Moisture 2731");
        assert_eq!(panel.rows[5], "Dust 12.47");
        assert_eq!(panel.rows[7], "Pump OFF");
        assert_eq!(panel.flushes, 1);
    }

    #[test]
    fn pressure_is_never_shown() {
        let mut panel = Panel::default();
        StatusView.repaint_all(&mut panel, &readings(), None, 0, true);
        assert!(panel.rows.iter().all(|r| !r.contains("29.9")));
    }

    #[test]
    fn clock_repaint_touches_only_clock() {
        let mut panel = Panel::default();
        panel.rows[4] = "Moisture 1".into();
        StatusView.repaint_clock(&mut panel, None, 5_000);
        assert_eq!(panel.rows[0], "Up 00:00:05");
        assert_eq!(panel.rows[4], "Moisture 1");
    }

    #[test]
    fn long_line_is_cut_to_panel_width() {
        let l = line(format_args!("{}", "x".repeat(40)));
        assert!(l.len() <= LINE_CAP);
    }
}
