use sea_orm_migration::prelude::*;

use crate::m20260830_000001_init::AlertThresholds;

/// Default band cut points seeded per role, station_id NULL (global rows).
/// All roles start from the same cuts; operators tune them per role or per
/// station through the thresholds endpoint.
const DEFAULT_ROWS: [(&str, f64, f64, f64); 4] = [
    ("farmer", 18.0, 15.0, 10.0),
    ("stakeholder", 18.0, 15.0, 10.0),
    ("policymaker", 18.0, 15.0, 10.0),
    ("planner", 18.0, 15.0, 10.0),
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (role, normal_min, warning_min, critical_min) in DEFAULT_ROWS {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(AlertThresholds::Table)
                        .columns([
                            AlertThresholds::Role,
                            AlertThresholds::NormalMin,
                            AlertThresholds::WarningMin,
                            AlertThresholds::CriticalMin,
                            AlertThresholds::EmergencyFloor,
                        ])
                        .values_panic([
                            role.into(),
                            normal_min.into(),
                            warning_min.into(),
                            critical_min.into(),
                            0.0.into(),
                        ])
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(AlertThresholds::Table)
                    .and_where(Expr::col(AlertThresholds::StationId).is_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
