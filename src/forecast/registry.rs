use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Filename suffix identifying a trained model artifact.
const ARTIFACT_SUFFIX: &str = "_model.json";

/// A trained per-district seasonal forecaster artifact.
///
/// The training pipeline exports each district's fitted model as
/// `<district>_model.json`: a linear trend anchored at `origin`, twelve
/// additive monthly terms, and a coefficient for the exogenous precipitation
/// regressor. Only this observable contract is fixed; the upstream fitting
/// library is free to change.
#[derive(Debug, Clone, Deserialize)]
pub struct DistrictModel {
    pub district: String,
    pub origin: NaiveDate,
    pub level_offset: f64,
    pub trend_per_day: f64,
    pub monthly: [f64; 12],
    pub precip_coefficient: f64,
    #[serde(default)]
    pub trained_at: Option<NaiveDate>,
}

impl DistrictModel {
    /// Predicted level for a target date given the averaged forward
    /// precipitation (mm).
    #[must_use]
    pub fn predict(&self, date: NaiveDate, avg_precipitation_mm: f64) -> f64 {
        let elapsed_days = (date - self.origin).num_days() as f64;
        self.level_offset
            + self.trend_per_day * elapsed_days
            + self.monthly[date.month0() as usize]
            + self.precip_coefficient * avg_precipitation_mm
    }
}

/// Immutable registry of district models, keyed by lower-cased district name.
///
/// Loaded once at startup and injected into the `Forecaster`. Absence of a
/// district's entry is a normal condition and triggers the linear-trend
/// fallback.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, DistrictModel>,
}

impl ModelRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from already-parsed models (used by tests and
    /// artifact tooling).
    #[must_use]
    pub fn from_models(models: impl IntoIterator<Item = DistrictModel>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|m| (m.district.to_lowercase(), m))
                .collect(),
        }
    }

    /// Scan a directory for `<district>_model.json` artifacts.
    ///
    /// A missing directory or an unparseable artifact is logged and skipped;
    /// the service runs with whatever loaded (possibly nothing), falling back
    /// to linear trends for the rest.
    #[must_use]
    pub fn load_from_dir(dir: &Path) -> Self {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Model directory unavailable, all districts use fallback forecasting"
                );
                return Self::empty();
            }
        };

        let mut models = HashMap::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(district) = name.strip_suffix(ARTIFACT_SUFFIX) else {
                continue;
            };

            match std::fs::read_to_string(entry.path())
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str::<DistrictModel>(&raw).map_err(|e| e.to_string()))
            {
                Ok(model) => {
                    tracing::debug!(district, "Loaded district model");
                    models.insert(district.to_lowercase(), model);
                }
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "Skipping unreadable model artifact");
                }
            }
        }

        tracing::info!(count = models.len(), "District model registry loaded");
        Self { models }
    }

    /// Look up a district's model, case-insensitively.
    #[must_use]
    pub fn get(&self, district: &str) -> Option<&DistrictModel> {
        self.models.get(&district.to_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_model() -> DistrictModel {
        DistrictModel {
            district: "Bengaluru".to_string(),
            origin: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            level_offset: 18.0,
            trend_per_day: 0.0,
            monthly: [0.0; 12],
            precip_coefficient: 0.0,
            trained_at: None,
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = ModelRegistry::from_models([flat_model()]);
        assert!(registry.get("bengaluru").is_some());
        assert!(registry.get("Bengaluru").is_some());
        assert!(registry.get("BENGALURU").is_some());
        assert!(registry.get("mumbai").is_none());
    }

    #[test]
    fn predict_combines_trend_season_and_regressor() {
        let mut model = flat_model();
        model.trend_per_day = -0.01;
        model.monthly[5] = 0.5; // June
        model.precip_coefficient = 0.02;

        // 2020-06-10 is 161 days after origin.
        let date = NaiveDate::from_ymd_opt(2020, 6, 10).unwrap();
        let level = model.predict(date, 10.0);
        let expected = 18.0 - 0.01 * 161.0 + 0.5 + 0.02 * 10.0;
        assert!((level - expected).abs() < 1e-9);
    }

    #[test]
    fn missing_directory_yields_empty_registry() {
        let registry = ModelRegistry::load_from_dir(Path::new("/nonexistent/models"));
        assert!(registry.is_empty());
    }

    #[test]
    fn artifact_parses_from_json() {
        let raw = r#"{
            "district": "bengaluru",
            "origin": "2020-01-01",
            "level_offset": 17.8,
            "trend_per_day": -0.002,
            "monthly": [0.1, 0.0, -0.1, -0.2, -0.3, 0.2, 0.6, 0.8, 0.5, 0.3, 0.2, 0.1],
            "precip_coefficient": 0.015
        }"#;
        let model: DistrictModel = serde_json::from_str(raw).unwrap();
        assert_eq!(model.district, "bengaluru");
        assert!(model.trained_at.is_none());
    }
}
