//! Push-button edge detector.
//!
//! ## Hardware
//!
//! Active-high momentary switch with external pull-down.  The level is
//! polled once per main-loop iteration; there is no debounce beyond the
//! loop period itself.
//!
//! ## Behaviour
//!
//! A press is reported once, on the released→pressed transition.  Holding
//! the button does not repeat, and the release is silent.
//!
//! ```text
//!   level:  ___|‾‾‾‾‾‾‾‾|____|‾‾|__
//!   press:     ^             ^
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    /// Last observed level was released.
    Up,
    /// A press was reported and the button has not yet been released.
    Held,
}

pub struct EdgeDetector {
    latch: Latch,
    presses: u32,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeDetector {
    pub const fn new() -> Self {
        Self {
            latch: Latch::Up,
            presses: 0,
        }
    }

    /// Feed the current button level; `true` exactly once per press.
    pub fn update(&mut self, pressed: bool) -> bool {
        match (self.latch, pressed) {
            (Latch::Up, true) => {
                self.latch = Latch::Held;
                self.presses = self.presses.wrapping_add(1);
                true
            }
            (Latch::Held, false) => {
                self.latch = Latch::Up;
                false
            }
            _ => false,
        }
    }

    /// Presses reported since boot.
    pub fn presses(&self) -> u32 {
        self.presses
    }
}
