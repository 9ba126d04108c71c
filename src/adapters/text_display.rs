//! In-memory text display adapter.
//!
//! Implements [`DisplayPort`] over a row buffer the size of the 128×64
//! panel in 6×8 text cells.  `flush()` logs rows that changed since the
//! previous flush, so the status view is visible on the serial console
//! even without a panel attached.  The panel driver itself is out of
//! scope; it can read [`TextDisplay::rows`] after each flush.

use log::debug;

use crate::app::ports::{DisplayPort, Region};
use crate::display::{LINE_CAP, Line};

pub const ROWS: usize = 8;

pub struct TextDisplay {
    rows: [Line; ROWS],
    flushed: [Line; ROWS],
    flushes: u32,
}

impl Default for TextDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDisplay {
    pub fn new() -> Self {
        Self {
            rows: Default::default(),
            flushed: Default::default(),
            flushes: 0,
        }
    }

    pub fn rows(&self) -> &[Line; ROWS] {
        &self.rows
    }

    pub fn row(&self, region: Region) -> &str {
        &self.rows[usize::from(region.row())]
    }

    pub fn flushes(&self) -> u32 {
        self.flushes
    }
}

impl DisplayPort for TextDisplay {
    fn clear(&mut self) {
        for row in &mut self.rows {
            row.clear();
        }
    }

    fn clear_region(&mut self, region: Region) {
        self.rows[usize::from(region.row())].clear();
    }

    fn write_line(&mut self, region: Region, text: &str) {
        let row = &mut self.rows[usize::from(region.row())];
        row.clear();
        for c in text.chars().take(LINE_CAP) {
            if row.push(c).is_err() {
                break;
            }
        }
    }

    fn flush(&mut self) {
        for (i, (row, prev)) in self.rows.iter().zip(self.flushed.iter_mut()).enumerate() {
            if row != prev {
                debug!("OLED | row {} | {}", i, row);
                prev.clone_from(row);
            }
        }
        self.flushes = self.flushes.wrapping_add(1);
    }
}
