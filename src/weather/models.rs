use serde::{Deserialize, Serialize};

/// Response from Open-Meteo `/forecast` with daily aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub daily: DailyForecast,
}

/// Daily arrays; entries can be null for days the upstream model has no value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyForecast {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
}

/// Averaged 7-day forward weather window used as the forecaster's
/// exogenous input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSummary {
    pub avg_precipitation_mm: f64,
    pub avg_max_temp_c: f64,
}

impl WeatherSummary {
    /// Zero-valued summary used when the upstream fetch fails.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            avg_precipitation_mm: 0.0,
            avg_max_temp_c: 0.0,
        }
    }
}

impl From<&ForecastResponse> for WeatherSummary {
    fn from(response: &ForecastResponse) -> Self {
        Self {
            avg_precipitation_mm: average(&response.daily.precipitation_sum),
            avg_max_temp_c: average(&response.daily.temperature_2m_max),
        }
    }
}

fn average(values: &[Option<f64>]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|v| v.unwrap_or(0.0)).sum();
    sum / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_averages_daily_arrays() {
        let response: ForecastResponse = serde_json::from_str(
            r#"{
                "latitude": 12.97,
                "longitude": 77.59,
                "daily": {
                    "time": ["2026-08-30", "2026-08-31", "2026-09-01"],
                    "precipitation_sum": [10.0, 20.0, 30.0],
                    "temperature_2m_max": [30.0, 32.0, 34.0]
                }
            }"#,
        )
        .unwrap();

        let summary = WeatherSummary::from(&response);
        assert!((summary.avg_precipitation_mm - 20.0).abs() < f64::EPSILON);
        assert!((summary.avg_max_temp_c - 32.0).abs() < f64::EPSILON);
    }

    #[test]
    fn null_daily_entries_count_as_zero() {
        let response: ForecastResponse = serde_json::from_str(
            r#"{
                "daily": {
                    "time": ["2026-08-30", "2026-08-31"],
                    "precipitation_sum": [8.0, null],
                    "temperature_2m_max": [null, null]
                }
            }"#,
        )
        .unwrap();

        let summary = WeatherSummary::from(&response);
        assert!((summary.avg_precipitation_mm - 4.0).abs() < f64::EPSILON);
        assert!(summary.avg_max_temp_c.abs() < f64::EPSILON);
    }

    #[test]
    fn empty_daily_arrays_yield_zero_summary() {
        let response: ForecastResponse = serde_json::from_str(r#"{"daily": {}}"#).unwrap();
        assert_eq!(WeatherSummary::from(&response), WeatherSummary::zero());
    }
}
