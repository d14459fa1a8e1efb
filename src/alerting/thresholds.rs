use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::alert_thresholds;
use crate::error::{AppError, AppResult};

/// Stakeholder roles with independently tunable alert bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Stakeholder,
    Policymaker,
    Planner,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Farmer,
        Role::Stakeholder,
        Role::Policymaker,
        Role::Planner,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Farmer => "farmer",
            Role::Stakeholder => "stakeholder",
            Role::Policymaker => "policymaker",
            Role::Planner => "planner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "farmer" => Ok(Role::Farmer),
            "stakeholder" => Ok(Role::Stakeholder),
            "policymaker" => Ok(Role::Policymaker),
            "planner" => Ok(Role::Planner),
            other => Err(AppError::BadRequest(format!(
                "Unknown role '{other}', expected one of: farmer, stakeholder, policymaker, planner"
            ))),
        }
    }
}

/// Severity of an alert classification, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
    Emergency,
}

impl AlertLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Emergency => "emergency",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(AlertLevel::Normal),
            "warning" => Ok(AlertLevel::Warning),
            "critical" => Ok(AlertLevel::Critical),
            "emergency" => Ok(AlertLevel::Emergency),
            other => Err(AppError::BadRequest(format!("Unknown alert level '{other}'"))),
        }
    }
}

/// Where a resolved band came from, most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdSource {
    Station,
    Global,
    Default,
}

/// Alert band cut points, expressed as minima: a level at or above a cut
/// belongs to that band or better. Lower stored level = worse condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdBands {
    pub normal_min: f64,
    pub warning_min: f64,
    pub critical_min: f64,
    pub emergency_floor: f64,
}

/// Built-in bands used when neither a station override nor a global row
/// exists for a role.
pub const DEFAULT_BANDS: ThresholdBands = ThresholdBands {
    normal_min: 18.0,
    warning_min: 15.0,
    critical_min: 10.0,
    emergency_floor: 0.0,
};

impl ThresholdBands {
    /// Cut points must strictly descend so every band is non-empty;
    /// the emergency floor may coincide with the critical cut.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidThresholds` describing the violated ordering.
    pub fn validate(&self) -> AppResult<()> {
        if !(self.normal_min > self.warning_min) {
            return Err(AppError::InvalidThresholds(format!(
                "normal_min ({}) must exceed warning_min ({})",
                self.normal_min, self.warning_min
            )));
        }
        if !(self.warning_min > self.critical_min) {
            return Err(AppError::InvalidThresholds(format!(
                "warning_min ({}) must exceed critical_min ({})",
                self.warning_min, self.critical_min
            )));
        }
        if !(self.critical_min >= self.emergency_floor) {
            return Err(AppError::InvalidThresholds(format!(
                "critical_min ({}) must not be below emergency_floor ({})",
                self.critical_min, self.emergency_floor
            )));
        }
        Ok(())
    }

    /// Band for a level value. Boundaries are inclusive: a level exactly at
    /// a cut belongs to the better band.
    #[must_use]
    pub fn classify(&self, level: f64) -> AlertLevel {
        if level >= self.normal_min {
            AlertLevel::Normal
        } else if level >= self.warning_min {
            AlertLevel::Warning
        } else if level >= self.critical_min {
            AlertLevel::Critical
        } else {
            AlertLevel::Emergency
        }
    }
}

impl From<&alert_thresholds::Model> for ThresholdBands {
    fn from(row: &alert_thresholds::Model) -> Self {
        Self {
            normal_min: row.normal_min,
            warning_min: row.warning_min,
            critical_min: row.critical_min,
            emergency_floor: row.emergency_floor,
        }
    }
}

/// Pick the effective bands from the rows a lookup produced.
///
/// Precedence: station-specific row, then the role's global row, then the
/// built-in defaults.
#[must_use]
pub fn pick_bands(
    station_row: Option<&alert_thresholds::Model>,
    global_row: Option<&alert_thresholds::Model>,
) -> (ThresholdBands, ThresholdSource) {
    if let Some(row) = station_row {
        return (ThresholdBands::from(row), ThresholdSource::Station);
    }
    if let Some(row) = global_row {
        return (ThresholdBands::from(row), ThresholdSource::Global);
    }
    (DEFAULT_BANDS, ThresholdSource::Default)
}

/// Resolve the effective bands for a (station, role) pair.
pub async fn resolve(
    db: &DatabaseConnection,
    station_id: Uuid,
    role: Role,
) -> AppResult<(ThresholdBands, ThresholdSource)> {
    let station_row = alert_thresholds::Entity::find()
        .filter(alert_thresholds::Column::StationId.eq(station_id))
        .filter(alert_thresholds::Column::Role.eq(role.as_str()))
        .one(db)
        .await?;

    let global_row = if station_row.is_none() {
        alert_thresholds::Entity::find()
            .filter(alert_thresholds::Column::StationId.is_null())
            .filter(alert_thresholds::Column::Role.eq(role.as_str()))
            .one(db)
            .await?
    } else {
        None
    };

    Ok(pick_bands(station_row.as_ref(), global_row.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundaries_are_inclusive() {
        let bands = DEFAULT_BANDS;
        assert_eq!(bands.classify(18.5), AlertLevel::Normal);
        assert_eq!(bands.classify(18.0), AlertLevel::Normal);
        assert_eq!(bands.classify(17.999), AlertLevel::Warning);
        assert_eq!(bands.classify(15.0), AlertLevel::Warning);
        assert_eq!(bands.classify(14.999), AlertLevel::Critical);
        assert_eq!(bands.classify(10.0), AlertLevel::Critical);
        assert_eq!(bands.classify(9.999), AlertLevel::Emergency);
        assert_eq!(bands.classify(-3.0), AlertLevel::Emergency);
    }

    #[test]
    fn severity_ordering_matches_band_depth() {
        assert!(AlertLevel::Normal < AlertLevel::Warning);
        assert!(AlertLevel::Warning < AlertLevel::Critical);
        assert!(AlertLevel::Critical < AlertLevel::Emergency);
    }

    #[test]
    fn validation_requires_strictly_descending_cuts() {
        assert!(DEFAULT_BANDS.validate().is_ok());

        let equal_cuts = ThresholdBands {
            normal_min: 15.0,
            warning_min: 15.0,
            critical_min: 10.0,
            emergency_floor: 0.0,
        };
        assert!(matches!(
            equal_cuts.validate(),
            Err(AppError::InvalidThresholds(_))
        ));

        let inverted = ThresholdBands {
            normal_min: 10.0,
            warning_min: 15.0,
            critical_min: 5.0,
            emergency_floor: 0.0,
        };
        assert!(inverted.validate().is_err());

        let floor_above_critical = ThresholdBands {
            normal_min: 18.0,
            warning_min: 15.0,
            critical_min: 10.0,
            emergency_floor: 11.0,
        };
        assert!(floor_above_critical.validate().is_err());

        // Floor may equal the critical cut.
        let floor_at_critical = ThresholdBands {
            normal_min: 18.0,
            warning_min: 15.0,
            critical_min: 10.0,
            emergency_floor: 10.0,
        };
        assert!(floor_at_critical.validate().is_ok());
    }

    fn threshold_row(station_id: Option<Uuid>, normal_min: f64) -> alert_thresholds::Model {
        alert_thresholds::Model {
            id: Uuid::new_v4(),
            station_id,
            role: "policymaker".to_string(),
            normal_min,
            warning_min: normal_min - 3.0,
            critical_min: normal_min - 8.0,
            emergency_floor: 0.0,
            created_at: None,
        }
    }

    #[test]
    fn station_row_takes_precedence_over_global() {
        let station = threshold_row(Some(Uuid::new_v4()), 22.0);
        let global = threshold_row(None, 19.0);

        let (bands, source) = pick_bands(Some(&station), Some(&global));
        assert_eq!(source, ThresholdSource::Station);
        assert_eq!(bands.normal_min, 22.0);
    }

    #[test]
    fn global_row_used_when_no_station_override() {
        let global = threshold_row(None, 19.0);

        let (bands, source) = pick_bands(None, Some(&global));
        assert_eq!(source, ThresholdSource::Global);
        assert_eq!(bands.normal_min, 19.0);
    }

    #[test]
    fn built_in_defaults_when_no_rows_exist() {
        let (bands, source) = pick_bands(None, None);
        assert_eq!(source, ThresholdSource::Default);
        assert_eq!(bands, DEFAULT_BANDS);
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::from_str("Farmer").unwrap(), Role::Farmer);
        assert_eq!(Role::from_str("POLICYMAKER").unwrap(), Role::Policymaker);
        assert!(Role::from_str("tourist").is_err());
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }
}
