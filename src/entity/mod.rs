pub mod alert_thresholds;
pub mod alerts;
pub mod live_readings;
pub mod predictions;
pub mod stations;
pub mod water_levels;
