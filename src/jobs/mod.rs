pub mod scheduler;
pub mod worker;

pub use scheduler::{run_forecast_sync, run_telemetry_sync};
