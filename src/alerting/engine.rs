use chrono::{Duration, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::alerting::thresholds::{self, AlertLevel, Role, ThresholdBands, ThresholdSource};
use crate::config::Config;
use crate::entity::{alerts, live_readings, predictions, stations};
use crate::error::{AppError, AppResult};

/// Which observation backed a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    Live,
    Predicted,
}

/// Outcome of classifying one station for one role.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Classification {
    pub station_id: Uuid,
    pub role: Role,
    pub observed_level: f64,
    pub observation: ObservationKind,
    pub alert_level: AlertLevel,
    pub bands: ThresholdBands,
    pub threshold_source: ThresholdSource,
    pub message: String,
}

/// Pick the observation a classification is based on.
///
/// A live reading within the freshness window wins; otherwise the latest
/// stored prediction. Freshness is judged against wall-clock now, so a
/// stalled telemetry feed degrades to prediction-based alerts rather than
/// acting on stale sensor data.
///
/// # Errors
///
/// Returns `AppError::InsufficientData` when the station has neither a fresh
/// live reading nor any stored prediction.
pub async fn select_observation(
    db: &DatabaseConnection,
    config: &Config,
    station: &stations::Model,
) -> AppResult<(f64, ObservationKind)> {
    let freshness_cutoff = Utc::now() - Duration::seconds(config.live_freshness_seconds);

    let live = live_readings::Entity::find()
        .filter(live_readings::Column::StationId.eq(station.id))
        .filter(live_readings::Column::Timestamp.gte(freshness_cutoff))
        .order_by_desc(live_readings::Column::Timestamp)
        .one(db)
        .await?;

    if let Some(reading) = live {
        return Ok((reading.level_m_bgl, ObservationKind::Live));
    }

    let prediction = predictions::Entity::find()
        .filter(predictions::Column::StationId.eq(station.id))
        .order_by_desc(predictions::Column::Date)
        .one(db)
        .await?;

    match prediction {
        Some(p) => Ok((p.predicted_level, ObservationKind::Predicted)),
        None => Err(AppError::InsufficientData(format!(
            "station '{}' has no fresh live reading and no stored prediction",
            station.name
        ))),
    }
}

/// Classify a station's current condition for one role.
pub async fn classify_station(
    db: &DatabaseConnection,
    config: &Config,
    station: &stations::Model,
    role: Role,
) -> AppResult<Classification> {
    let (observed_level, observation) = select_observation(db, config, station).await?;
    let (bands, threshold_source) = thresholds::resolve(db, station.id, role).await?;
    let alert_level = bands.classify(observed_level);
    let message = advisory_message(role, alert_level, &station.name);

    Ok(Classification {
        station_id: station.id,
        role,
        observed_level,
        observation,
        alert_level,
        bands,
        threshold_source,
        message,
    })
}

/// What `ensure_alert` should do with the station's alert record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertAction {
    /// Normal with nothing outstanding: no record change.
    Nothing,
    /// Normal with an outstanding alert: supersede it.
    ResolveOutstanding,
    /// Abnormal with an outstanding alert: dedup against the existing row.
    KeepOutstanding,
    /// Abnormal with nothing outstanding: insert a new row.
    Raise,
}

/// Decide the record change for a classified level against the current
/// unresolved alert, if any. Pure; the async side executes the decision.
#[must_use]
pub fn reconcile(level: AlertLevel, outstanding: Option<&alerts::Model>) -> AlertAction {
    match (level, outstanding) {
        (AlertLevel::Normal, None) => AlertAction::Nothing,
        (AlertLevel::Normal, Some(_)) => AlertAction::ResolveOutstanding,
        (_, Some(_)) => AlertAction::KeepOutstanding,
        (_, None) => AlertAction::Raise,
    }
}

/// Reconcile the station's alert record with a classification.
///
/// A normal classification resolves any outstanding unresolved alert and
/// returns `None`. An abnormal one returns the existing unresolved alert if
/// present (dedup), otherwise inserts a new row. The partial unique index on
/// unresolved alerts backstops concurrent inserts; on a conflict the winner's
/// row is re-read and returned.
pub async fn ensure_alert(
    db: &DatabaseConnection,
    classification: &Classification,
) -> AppResult<Option<alerts::Model>> {
    let outstanding = find_unresolved(db, classification.station_id).await?;

    match reconcile(classification.alert_level, outstanding.as_ref()) {
        AlertAction::Nothing => return Ok(None),
        AlertAction::ResolveOutstanding => {
            if let Some(alert) = outstanding {
                let mut active: alerts::ActiveModel = alert.into();
                active.resolved = Set(true);
                let resolved = alerts::Entity::update(active).exec(db).await?;
                tracing::info!(
                    station_id = %classification.station_id,
                    alert_id = %resolved.id,
                    "Resolved outstanding alert, station back to normal"
                );
            }
            return Ok(None);
        }
        AlertAction::KeepOutstanding => return Ok(outstanding),
        AlertAction::Raise => {}
    }

    let row = alerts::ActiveModel {
        id: Set(Uuid::new_v4()),
        station_id: Set(classification.station_id),
        level: Set(classification.alert_level.as_str().to_string()),
        message: Set(classification.message.clone()),
        timestamp: Set(Utc::now().into()),
        resolved: Set(false),
    };

    match alerts::Entity::insert(row).exec_with_returning(db).await {
        Ok(inserted) => {
            tracing::info!(
                station_id = %classification.station_id,
                level = %classification.alert_level,
                "Raised alert"
            );
            Ok(Some(inserted))
        }
        Err(insert_err) => {
            // Lost a race against another classifier; the index guarantees
            // exactly one unresolved row, so take the winner's.
            match find_unresolved(db, classification.station_id).await? {
                Some(existing) => Ok(Some(existing)),
                None => Err(insert_err.into()),
            }
        }
    }
}

async fn find_unresolved(
    db: &DatabaseConnection,
    station_id: Uuid,
) -> AppResult<Option<alerts::Model>> {
    Ok(alerts::Entity::find()
        .filter(alerts::Column::StationId.eq(station_id))
        .filter(alerts::Column::Resolved.eq(false))
        .order_by_desc(alerts::Column::Timestamp)
        .one(db)
        .await?)
}

/// Role-specific advisory text for an alert band.
#[must_use]
pub fn advisory_message(role: Role, level: AlertLevel, station_name: &str) -> String {
    match (level, role) {
        (AlertLevel::Normal, _) => {
            format!("Groundwater at {station_name} is within the normal band.")
        }

        (AlertLevel::Warning, Role::Farmer) => format!(
            "Water table at {station_name} is declining. Switch to low-water crops and drip irrigation where possible."
        ),
        (AlertLevel::Warning, Role::Stakeholder) => format!(
            "Groundwater at {station_name} entered the warning band. Review extraction schedules."
        ),
        (AlertLevel::Warning, Role::Policymaker) => format!(
            "Groundwater at {station_name} entered the warning band. Consider advisory notices for the district."
        ),
        (AlertLevel::Warning, Role::Planner) => format!(
            "Groundwater at {station_name} entered the warning band. Factor reduced availability into allocation plans."
        ),

        (AlertLevel::Critical, Role::Farmer) => format!(
            "Water table at {station_name} is critically low. Irrigate only essential crops and avoid new borewells."
        ),
        (AlertLevel::Critical, Role::Stakeholder) => format!(
            "Groundwater at {station_name} is critically low. Curtail non-essential extraction immediately."
        ),
        (AlertLevel::Critical, Role::Policymaker) => format!(
            "Groundwater at {station_name} is critically low. Extraction restrictions for the district are warranted."
        ),
        (AlertLevel::Critical, Role::Planner) => format!(
            "Groundwater at {station_name} is critically low. Activate contingency supply planning."
        ),

        (AlertLevel::Emergency, Role::Farmer) => format!(
            "Emergency at {station_name}: the aquifer is nearly depleted. Stop groundwater irrigation and seek alternative supply."
        ),
        (AlertLevel::Emergency, Role::Stakeholder) => format!(
            "Emergency at {station_name}: the aquifer is nearly depleted. All discretionary extraction must stop."
        ),
        (AlertLevel::Emergency, Role::Policymaker) => format!(
            "Emergency at {station_name}: the aquifer is nearly depleted. Immediate regulatory intervention required."
        ),
        (AlertLevel::Emergency, Role::Planner) => format!(
            "Emergency at {station_name}: the aquifer is nearly depleted. Deploy emergency water supply measures."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_alert(level: AlertLevel) -> alerts::Model {
        alerts::Model {
            id: Uuid::new_v4(),
            station_id: Uuid::new_v4(),
            level: level.as_str().to_string(),
            message: "advisory".to_string(),
            timestamp: Utc::now().into(),
            resolved: false,
        }
    }

    #[test]
    fn repeated_abnormal_classification_keeps_the_open_alert() {
        // A second pass over an already-alerting station must not raise
        // another row, whatever the current band is.
        let alert = open_alert(AlertLevel::Warning);
        for level in [
            AlertLevel::Warning,
            AlertLevel::Critical,
            AlertLevel::Emergency,
        ] {
            assert_eq!(
                reconcile(level, Some(&alert)),
                AlertAction::KeepOutstanding
            );
        }
    }

    #[test]
    fn abnormal_without_open_alert_raises() {
        assert_eq!(reconcile(AlertLevel::Critical, None), AlertAction::Raise);
        assert_eq!(reconcile(AlertLevel::Warning, None), AlertAction::Raise);
    }

    #[test]
    fn normal_resolves_outstanding_and_otherwise_does_nothing() {
        let alert = open_alert(AlertLevel::Critical);
        assert_eq!(
            reconcile(AlertLevel::Normal, Some(&alert)),
            AlertAction::ResolveOutstanding
        );
        assert_eq!(reconcile(AlertLevel::Normal, None), AlertAction::Nothing);
    }

    #[test]
    fn every_role_and_band_has_a_message() {
        for role in Role::ALL {
            for level in [
                AlertLevel::Normal,
                AlertLevel::Warning,
                AlertLevel::Critical,
                AlertLevel::Emergency,
            ] {
                let msg = advisory_message(role, level, "Anekal Deep Well");
                assert!(msg.contains("Anekal Deep Well"), "{role}/{level}: {msg}");
                assert!(!msg.is_empty());
            }
        }
    }

    #[test]
    fn normal_message_is_shared_across_roles() {
        let texts: Vec<String> = Role::ALL
            .iter()
            .map(|r| advisory_message(*r, AlertLevel::Normal, "W1"))
            .collect();
        assert!(texts.iter().all(|t| t == &texts[0]));
    }

    #[test]
    fn abnormal_messages_differ_by_role() {
        let farmer = advisory_message(Role::Farmer, AlertLevel::Critical, "W1");
        let planner = advisory_message(Role::Planner, AlertLevel::Critical, "W1");
        assert_ne!(farmer, planner);
    }
}
