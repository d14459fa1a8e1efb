pub mod engine;
pub mod thresholds;

pub use engine::{advisory_message, classify_station, ensure_alert, Classification, ObservationKind};
pub use thresholds::{AlertLevel, Role, ThresholdBands, ThresholdSource, DEFAULT_BANDS};
