//! Aquifer DB - Groundwater monitoring, forecasting and alerting API
//!
//! This library exposes the core modules for testing and reuse.

pub mod alerting;
pub mod common;
pub mod config;
pub mod entity;
pub mod error;
pub mod forecast;
pub mod jobs;
pub mod recharge;
pub mod routes;
pub mod telemetry;
pub mod weather;
