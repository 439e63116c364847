//! Sensor fusion, alerting, telemetry and feedback logic for a body-worn
//! health monitor. Hardware access goes through the traits in `monitor`,
//! `feedback` and `peak_detector`, so everything here runs on the host too.

#![cfg_attr(not(test), no_std)]

pub mod alerts;
pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod feedback;
pub mod heart_rate;
pub mod monitor;
pub mod peak_detector;
pub mod telemetry;
pub mod timestamp;
