// src/lib.rs

//! Smart walker navigation controller.
//!
//! Sensor acquisition and the vision describer feed bounded queues; the
//! decision engine pairs their output into telemetry and spoken alerts; the
//! action dispatcher carries those out.

pub mod actions;
pub mod config;
pub mod decision;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod queue;
pub mod scheduler;
pub mod sensor;
pub mod sensor_data;
pub mod vision;
