use chrono::{Duration, Months, NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{predictions, stations, water_levels};
use crate::error::{AppError, AppResult};
use crate::forecast::registry::ModelRegistry;
use crate::weather::{WeatherClient, WeatherSummary};

/// Minimum historical points before any fit is attempted.
pub const MIN_HISTORY_POINTS: usize = 3;

/// The linear-trend fallback fits on at most this many recent points.
pub const FALLBACK_WINDOW_POINTS: usize = 12;

/// Average forward precipitation above which the model-path forecast gets a
/// recharge bonus.
pub const HIGH_RAINFALL_MM: f64 = 20.0;

/// Multiplier applied to the model-path forecast under high forecast rainfall.
pub const HIGH_RAINFALL_RECHARGE_FACTOR: f64 = 1.05;

/// Which path produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    DistrictModel,
    LinearTrend,
}

/// A completed forecast for one station, one reporting period ahead.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub station_id: Uuid,
    pub target_date: NaiveDate,
    pub predicted_level: f64,
    pub source: ForecastSource,
    pub weather: WeatherSummary,
}

/// Per-station water-level forecaster.
///
/// Selects the district's trained seasonal model when the registry has one,
/// otherwise falls back to an ordinary-least-squares trend over the most
/// recent observations. The registry is immutable and injected at
/// construction.
pub struct Forecaster {
    models: ModelRegistry,
}

impl Forecaster {
    #[must_use]
    pub fn new(models: ModelRegistry) -> Self {
        Self { models }
    }

    #[must_use]
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Forecast the level one reporting period past the last observation.
    ///
    /// `history` must be chronological. The high-rainfall recharge bonus
    /// applies on the model path only; the fallback trend already absorbs
    /// recent conditions through the observations themselves.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InsufficientData` with fewer than
    /// [`MIN_HISTORY_POINTS`] observations; no fit is attempted in that case.
    pub fn forecast_from_history(
        &self,
        district: &str,
        history: &[(NaiveDate, f64)],
        weather: WeatherSummary,
    ) -> AppResult<(NaiveDate, f64, ForecastSource)> {
        if history.len() < MIN_HISTORY_POINTS {
            return Err(AppError::InsufficientData(format!(
                "{} historical readings, need at least {MIN_HISTORY_POINTS}",
                history.len()
            )));
        }

        let last_date = history[history.len() - 1].0;
        let target_date = next_period(last_date);

        if let Some(model) = self.models.get(district) {
            let mut level = model.predict(target_date, weather.avg_precipitation_mm);
            if weather.avg_precipitation_mm > HIGH_RAINFALL_MM {
                level *= HIGH_RAINFALL_RECHARGE_FACTOR;
            }
            return Ok((target_date, round2(level), ForecastSource::DistrictModel));
        }

        let window = &history[history.len().saturating_sub(FALLBACK_WINDOW_POINTS)..];
        let level = linear_trend_level(window, target_date);
        Ok((target_date, round2(level), ForecastSource::LinearTrend))
    }

    /// Full forecast operation: load history, fetch weather, predict, and
    /// persist the result as the station's current prediction.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InsufficientData` when the station has too little
    /// history, or a database error. Weather failures never propagate; they
    /// degrade to zero exogenous input inside the client.
    pub async fn predict_station(
        &self,
        db: &DatabaseConnection,
        weather: &WeatherClient,
        station: &stations::Model,
    ) -> AppResult<Forecast> {
        let history = load_history(db, station.id).await?;

        // Check before the weather fetch so insufficient-data stations cost
        // nothing upstream.
        if history.len() < MIN_HISTORY_POINTS {
            return Err(AppError::InsufficientData(format!(
                "station '{}' has {} historical readings, need at least {MIN_HISTORY_POINTS}",
                station.name,
                history.len()
            )));
        }

        let summary = weather
            .forecast_summary(station.latitude, station.longitude)
            .await;

        let (target_date, predicted_level, source) =
            self.forecast_from_history(&station.district, &history, summary)?;

        store_prediction(db, station.id, target_date, predicted_level).await?;

        Ok(Forecast {
            station_id: station.id,
            target_date,
            predicted_level,
            source,
            weather: summary,
        })
    }
}

/// Chronological (date, level) history for a station.
pub async fn load_history(
    db: &DatabaseConnection,
    station_id: Uuid,
) -> AppResult<Vec<(NaiveDate, f64)>> {
    let rows = water_levels::Entity::find()
        .filter(water_levels::Column::StationId.eq(station_id))
        .order_by_asc(water_levels::Column::Date)
        .all(db)
        .await?;

    Ok(rows.into_iter().map(|r| (r.date, r.level_m_bgl)).collect())
}

/// Upsert the station's current prediction, replacing any prior row for the
/// same target date. Last-writer-wins keeps concurrent on-demand and
/// scheduled forecasts safe.
async fn store_prediction(
    db: &DatabaseConnection,
    station_id: Uuid,
    date: NaiveDate,
    predicted_level: f64,
) -> AppResult<()> {
    let row = predictions::ActiveModel {
        id: Set(Uuid::new_v4()),
        station_id: Set(station_id),
        date: Set(date),
        predicted_level: Set(predicted_level),
        generated_at: Set(Some(Utc::now().into())),
    };

    predictions::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([predictions::Column::StationId, predictions::Column::Date])
                .update_columns([
                    predictions::Column::PredictedLevel,
                    predictions::Column::GeneratedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;

    Ok(())
}

/// One reporting period (a calendar month) past the given date.
fn next_period(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1))
        .unwrap_or_else(|| date + Duration::days(30))
}

/// OLS trend fit over the window (t = days since the window's first point),
/// evaluated at the target date. Degenerate windows (all observations on one
/// day) collapse to the window mean.
fn linear_trend_level(window: &[(NaiveDate, f64)], target: NaiveDate) -> f64 {
    let t0 = window[0].0;
    let n = window.len() as f64;

    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    for (date, level) in window {
        mean_x += (*date - t0).num_days() as f64;
        mean_y += level;
    }
    mean_x /= n;
    mean_y /= n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (date, level) in window {
        let dx = (*date - t0).num_days() as f64 - mean_x;
        sxx += dx * dx;
        sxy += dx * (level - mean_y);
    }

    if sxx == 0.0 {
        return mean_y;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    intercept + slope * (target - t0).num_days() as f64
}

/// Round to the 2-decimal output precision.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::registry::DistrictModel;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dry() -> WeatherSummary {
        WeatherSummary::zero()
    }

    fn wet(precip: f64) -> WeatherSummary {
        WeatherSummary {
            avg_precipitation_mm: precip,
            avg_max_temp_c: 31.0,
        }
    }

    fn flat_model(level: f64) -> DistrictModel {
        DistrictModel {
            district: "bengaluru".to_string(),
            origin: date(2020, 1, 1),
            level_offset: level,
            trend_per_day: 0.0,
            monthly: [0.0; 12],
            precip_coefficient: 0.0,
            trained_at: None,
        }
    }

    #[test]
    fn fewer_than_three_points_is_insufficient_data() {
        let forecaster = Forecaster::new(ModelRegistry::empty());
        for history in [
            vec![],
            vec![(date(2025, 1, 1), 20.0)],
            vec![(date(2025, 1, 1), 20.0), (date(2025, 2, 1), 19.5)],
        ] {
            let err = forecaster
                .forecast_from_history("bengaluru", &history, dry())
                .unwrap_err();
            assert!(matches!(err, AppError::InsufficientData(_)));
        }
    }

    #[test]
    fn linear_trend_extrapolates_declining_series() {
        // 0.5 m drop per 30 days; Apr 2 + 1 month is exactly 30 days out,
        // so the extrapolation lands on 18.5.
        let forecaster = Forecaster::new(ModelRegistry::empty());
        let history = vec![
            (date(2025, 2, 1), 20.0),
            (date(2025, 3, 3), 19.5),
            (date(2025, 4, 2), 19.0),
        ];

        let (target, level, source) = forecaster
            .forecast_from_history("mumbai", &history, dry())
            .unwrap();

        assert_eq!(target, date(2025, 5, 2));
        assert_eq!(source, ForecastSource::LinearTrend);
        assert!((level - 18.5).abs() < 1e-9);
    }

    #[test]
    fn fallback_fits_only_the_last_twelve_points() {
        let forecaster = Forecaster::new(ModelRegistry::empty());

        // A flat year preceded by wildly different old readings. If the old
        // points entered the fit the forecast would be pulled far from 15.0.
        let mut history: Vec<(NaiveDate, f64)> = vec![
            (date(2023, 1, 1), 80.0),
            (date(2023, 2, 1), 60.0),
            (date(2023, 3, 1), 40.0),
        ];
        for month in 1..=12 {
            history.push((date(2024, month, 1), 15.0));
        }

        let (_, level, _) = forecaster
            .forecast_from_history("mumbai", &history, dry())
            .unwrap();
        assert!((level - 15.0).abs() < 1e-9);
    }

    #[test]
    fn district_model_path_skips_the_fallback() {
        let forecaster = Forecaster::new(ModelRegistry::from_models([flat_model(17.0)]));
        let history = vec![
            (date(2025, 1, 1), 25.0),
            (date(2025, 2, 1), 24.0),
            (date(2025, 3, 1), 23.0),
        ];

        let (_, level, source) = forecaster
            .forecast_from_history("Bengaluru", &history, dry())
            .unwrap();
        assert_eq!(source, ForecastSource::DistrictModel);
        assert!((level - 17.0).abs() < 1e-9);
    }

    #[test]
    fn high_rainfall_bonus_applies_above_threshold_only() {
        let forecaster = Forecaster::new(ModelRegistry::from_models([flat_model(20.0)]));
        let history = vec![
            (date(2025, 1, 1), 20.0),
            (date(2025, 2, 1), 20.0),
            (date(2025, 3, 1), 20.0),
        ];

        // Exactly at the threshold: no bonus.
        let (_, at_threshold, _) = forecaster
            .forecast_from_history("bengaluru", &history, wet(HIGH_RAINFALL_MM))
            .unwrap();
        assert!((at_threshold - 20.0).abs() < 1e-9);

        // Above the threshold: raw output times 1.05, rounded.
        let (_, boosted, _) = forecaster
            .forecast_from_history("bengaluru", &history, wet(25.0))
            .unwrap();
        assert!((boosted - 21.0).abs() < 1e-9);
    }

    #[test]
    fn rainfall_bonus_never_touches_the_fallback_path() {
        let forecaster = Forecaster::new(ModelRegistry::empty());
        let history = vec![
            (date(2025, 1, 1), 20.0),
            (date(2025, 2, 1), 20.0),
            (date(2025, 3, 1), 20.0),
        ];

        let (_, level, source) = forecaster
            .forecast_from_history("mumbai", &history, wet(50.0))
            .unwrap();
        assert_eq!(source, ForecastSource::LinearTrend);
        assert!((level - 20.0).abs() < 1e-9);
    }

    #[test]
    fn output_rounds_to_two_decimals() {
        let forecaster = Forecaster::new(ModelRegistry::from_models([flat_model(18.12345)]));
        let history = vec![
            (date(2025, 1, 1), 20.0),
            (date(2025, 2, 1), 20.0),
            (date(2025, 3, 1), 20.0),
        ];

        let (_, level, _) = forecaster
            .forecast_from_history("bengaluru", &history, dry())
            .unwrap();
        assert_eq!(level, 18.12);
    }

    #[test]
    fn degenerate_single_day_window_collapses_to_mean() {
        let window = vec![
            (date(2025, 1, 1), 10.0),
            (date(2025, 1, 1), 12.0),
            (date(2025, 1, 1), 14.0),
        ];
        let level = linear_trend_level(&window, date(2025, 2, 1));
        assert!((level - 12.0).abs() < 1e-9);
    }

    #[test]
    fn month_end_target_dates_clamp() {
        // Jan 31 + 1 month clamps to Feb 28 in a non-leap year.
        assert_eq!(next_period(date(2025, 1, 31)), date(2025, 2, 28));
        assert_eq!(next_period(date(2025, 3, 15)), date(2025, 4, 15));
    }
}
