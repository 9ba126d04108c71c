//! Application boundary: commands in, events out, ports in between.
//!
//! The domain logic (scheduler, pump state machine, connection manager)
//! lives at the crate root; everything it exchanges with the outside world
//! is defined here.  Hardware only ever appears behind the **port traits**
//! in [`ports`], keeping the control loop testable without peripherals.

pub mod commands;
pub mod events;
pub mod ports;
