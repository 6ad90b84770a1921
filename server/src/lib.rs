//! Station API for networked weather stations: devices push readings over
//! JSON/HTTP and clients read back current values and history.

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod rest;
pub mod seed;
pub mod store;
pub mod validate;
