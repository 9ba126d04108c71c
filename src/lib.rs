//! PlantCare firmware library.
//!
//! Exposes the controller logic for integration testing on the host.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; host builds substitute simulated peripherals.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod connection;
pub mod context;
pub mod display;
pub mod error;
pub mod pins;
pub mod pump;
pub mod scheduler;
pub mod timer;

pub mod adapters;
pub mod drivers;
pub mod sensors;
