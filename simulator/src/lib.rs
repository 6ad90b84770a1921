//! Simulated ESP32 weather station: serves its own readings and syncs them
//! with the station API the way the firmware does.

pub mod config;
pub mod device;
pub mod sync;
pub mod telemetry;
