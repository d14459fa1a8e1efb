pub mod forecaster;
pub mod registry;

pub use forecaster::{Forecast, ForecastSource, Forecaster};
pub use registry::{DistrictModel, ModelRegistry};
