//! Unit tests for the forecast-and-alert pipeline, exercised end to end
//! through the public library API without a database.
//!
//! Run with: cargo test --test pipeline_unit_test

use chrono::NaiveDate;

use aquifer_db::alerting::{advisory_message, AlertLevel, Role, ThresholdBands, DEFAULT_BANDS};
use aquifer_db::forecast::{DistrictModel, ForecastSource, Forecaster, ModelRegistry};
use aquifer_db::recharge;
use aquifer_db::weather::WeatherSummary;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Declining monthly series, no trained model, default thresholds: the
/// fallback trend must land on 18.5 and classify as normal for every role.
#[test]
fn declining_series_forecasts_and_classifies_normal() {
    let forecaster = Forecaster::new(ModelRegistry::empty());
    let history = vec![
        (date(2025, 2, 1), 20.0),
        (date(2025, 3, 3), 19.5),
        (date(2025, 4, 2), 19.0),
    ];

    let (target, level, source) = forecaster
        .forecast_from_history("nagpur", &history, WeatherSummary::zero())
        .unwrap();

    assert_eq!(source, ForecastSource::LinearTrend);
    assert_eq!(target, date(2025, 5, 2));
    assert!((level - 18.5).abs() < 1e-9);

    for role in Role::ALL {
        assert_eq!(DEFAULT_BANDS.classify(level), AlertLevel::Normal, "{role}");
    }
}

/// Same series continued downward eventually crosses the warning cut and the
/// advisory text changes with the role.
#[test]
fn deeper_decline_crosses_into_warning() {
    let forecaster = Forecaster::new(ModelRegistry::empty());
    // 1 m drop per 30 days from 19.0
    let history = vec![
        (date(2025, 2, 1), 19.0),
        (date(2025, 3, 3), 18.0),
        (date(2025, 4, 2), 17.0),
    ];

    let (_, level, _) = forecaster
        .forecast_from_history("nagpur", &history, WeatherSummary::zero())
        .unwrap();
    assert!((level - 16.0).abs() < 1e-9);

    let class = DEFAULT_BANDS.classify(level);
    assert_eq!(class, AlertLevel::Warning);

    let farmer = advisory_message(Role::Farmer, class, "Nagpur Well 4");
    let policymaker = advisory_message(Role::Policymaker, class, "Nagpur Well 4");
    assert_ne!(farmer, policymaker);
    assert!(farmer.contains("Nagpur Well 4"));
}

/// A trained district model takes priority over the fallback, and heavy
/// forecast rainfall applies the recharge bonus on that path only.
#[test]
fn model_path_with_rainfall_bonus() {
    let model = DistrictModel {
        district: "pune".to_string(),
        origin: date(2024, 1, 1),
        level_offset: 16.0,
        trend_per_day: 0.0,
        monthly: [0.0; 12],
        precip_coefficient: 0.0,
        trained_at: None,
    };
    let forecaster = Forecaster::new(ModelRegistry::from_models([model]));
    let history = vec![
        (date(2025, 1, 1), 22.0),
        (date(2025, 2, 1), 22.0),
        (date(2025, 3, 1), 22.0),
    ];

    let wet = WeatherSummary {
        avg_precipitation_mm: 24.0,
        avg_max_temp_c: 29.0,
    };
    let (_, boosted, source) = forecaster
        .forecast_from_history("Pune", &history, wet)
        .unwrap();
    assert_eq!(source, ForecastSource::DistrictModel);
    assert!((boosted - 16.8).abs() < 1e-9);

    let at_cutoff = WeatherSummary {
        avg_precipitation_mm: 20.0,
        avg_max_temp_c: 29.0,
    };
    let (_, unboosted, _) = forecaster
        .forecast_from_history("pune", &history, at_cutoff)
        .unwrap();
    assert!((unboosted - 16.0).abs() < 1e-9);
}

/// The classification cuts are minima with inclusive boundaries.
#[test]
fn custom_bands_classify_at_boundaries() {
    let bands = ThresholdBands {
        normal_min: 12.0,
        warning_min: 9.0,
        critical_min: 5.0,
        emergency_floor: 0.0,
    };
    assert!(bands.validate().is_ok());

    assert_eq!(bands.classify(12.0), AlertLevel::Normal);
    assert_eq!(bands.classify(11.99), AlertLevel::Warning);
    assert_eq!(bands.classify(9.0), AlertLevel::Warning);
    assert_eq!(bands.classify(8.99), AlertLevel::Critical);
    assert_eq!(bands.classify(5.0), AlertLevel::Critical);
    assert_eq!(bands.classify(4.99), AlertLevel::Emergency);
}

/// A forecast level feeds straight into the recharge estimator with the
/// expected sign convention.
#[test]
fn recharge_sign_follows_level_change() {
    // Level rose 1.5 m over the window: positive recharge.
    let gained = recharge::estimate_windowed(19.5, Some(18.0), 0.1);
    assert!(gained > 0.0);

    // Level fell: negative.
    let lost = recharge::estimate_windowed(16.0, Some(18.0), 0.1);
    assert!(lost < 0.0);

    // Instantaneous rate scales with elapsed time.
    let per_hour = recharge::estimate(19.0, Some(18.0), 10.0, 0.1);
    assert!((per_hour - 0.01).abs() < 1e-12);
}

/// Too little history refuses to forecast rather than extrapolating noise.
#[test]
fn short_history_is_rejected() {
    let forecaster = Forecaster::new(ModelRegistry::empty());
    let history = vec![(date(2025, 1, 1), 20.0), (date(2025, 2, 1), 19.0)];
    assert!(forecaster
        .forecast_from_history("nagpur", &history, WeatherSummary::zero())
        .is_err());
}
