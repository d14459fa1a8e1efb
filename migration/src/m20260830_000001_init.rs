use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ========== STATIONS ==========
        manager
            .create_table(
                Table::create()
                    .table(Stations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stations::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(Stations::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Stations::State).string_len(64).not_null())
                    .col(ColumnDef::new(Stations::District).string_len(64).not_null())
                    .col(ColumnDef::new(Stations::City).string_len(64).not_null())
                    .col(ColumnDef::new(Stations::Latitude).double().not_null())
                    .col(ColumnDef::new(Stations::Longitude).double().not_null())
                    .col(
                        ColumnDef::new(Stations::CreatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .to_owned(),
            )
            .await?;

        // Case-insensitive unique index on station name
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX stations_name_lower_idx ON stations (LOWER(name))",
            )
            .await?;

        let db = manager.get_connection();

        // District lookups drive the forecaster's model selection
        db.execute_unprepared(
            "CREATE INDEX idx_stations_district ON stations (LOWER(district))",
        )
        .await?;

        // ========== WATER LEVELS ==========
        manager
            .create_table(
                Table::create()
                    .table(WaterLevels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WaterLevels::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(WaterLevels::StationId).uuid().not_null())
                    .col(ColumnDef::new(WaterLevels::Date).date().not_null())
                    .col(ColumnDef::new(WaterLevels::LevelMBgl).double().not_null())
                    .col(ColumnDef::new(WaterLevels::RechargePattern).string_len(32))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_water_levels_station")
                            .from(WaterLevels::Table, WaterLevels::StationId)
                            .to(Stations::Table, Stations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_water_levels_station_date")
                    .table(WaterLevels::Table)
                    .col(WaterLevels::StationId)
                    .col(WaterLevels::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ========== PREDICTIONS ==========
        manager
            .create_table(
                Table::create()
                    .table(Predictions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Predictions::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(Predictions::StationId).uuid().not_null())
                    .col(ColumnDef::new(Predictions::Date).date().not_null())
                    .col(
                        ColumnDef::new(Predictions::PredictedLevel)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Predictions::GeneratedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_predictions_station")
                            .from(Predictions::Table, Predictions::StationId)
                            .to(Stations::Table, Stations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique (station, target date) makes the forecast upsert well-defined
        manager
            .create_index(
                Index::create()
                    .name("idx_predictions_station_date")
                    .table(Predictions::Table)
                    .col(Predictions::StationId)
                    .col(Predictions::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ========== LIVE READINGS ==========
        manager
            .create_table(
                Table::create()
                    .table(LiveReadings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LiveReadings::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(LiveReadings::StationId).uuid().not_null())
                    .col(
                        ColumnDef::new(LiveReadings::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LiveReadings::LevelMBgl).double().not_null())
                    .col(
                        ColumnDef::new(LiveReadings::RechargeRate)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(LiveReadings::BatteryPct)
                            .double()
                            .not_null()
                            .default(100.0),
                    )
                    .col(
                        ColumnDef::new(LiveReadings::DeviceStatus)
                            .string_len(32)
                            .not_null()
                            .default("ok"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_live_readings_station")
                            .from(LiveReadings::Table, LiveReadings::StationId)
                            .to(Stations::Table, Stations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Freshness queries and retention pruning both scan by time
        db.execute_unprepared(
            "CREATE INDEX idx_live_readings_station_time ON live_readings (station_id, timestamp DESC)",
        )
        .await?;

        // ========== ALERT THRESHOLDS ==========
        manager
            .create_table(
                Table::create()
                    .table(AlertThresholds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AlertThresholds::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(AlertThresholds::StationId).uuid())
                    .col(ColumnDef::new(AlertThresholds::Role).string_len(32).not_null())
                    .col(ColumnDef::new(AlertThresholds::NormalMin).double().not_null())
                    .col(ColumnDef::new(AlertThresholds::WarningMin).double().not_null())
                    .col(
                        ColumnDef::new(AlertThresholds::CriticalMin)
                            .double()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AlertThresholds::EmergencyFloor)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(AlertThresholds::CreatedAt)
                            .timestamp_with_time_zone()
                            .extra("DEFAULT NOW()"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alert_thresholds_station")
                            .from(AlertThresholds::Table, AlertThresholds::StationId)
                            .to(Stations::Table, Stations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (station, role); one global row per role
        db.execute_unprepared(
            "CREATE UNIQUE INDEX idx_alert_thresholds_station_role ON alert_thresholds (station_id, role) WHERE station_id IS NOT NULL",
        )
        .await?;
        db.execute_unprepared(
            "CREATE UNIQUE INDEX idx_alert_thresholds_global_role ON alert_thresholds (role) WHERE station_id IS NULL",
        )
        .await?;

        // ========== ALERTS ==========
        manager
            .create_table(
                Table::create()
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alerts::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .extra("DEFAULT gen_random_uuid()"),
                    )
                    .col(ColumnDef::new(Alerts::StationId).uuid().not_null())
                    .col(ColumnDef::new(Alerts::Level).string_len(32).not_null())
                    .col(ColumnDef::new(Alerts::Message).text().not_null())
                    .col(
                        ColumnDef::new(Alerts::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT NOW()"),
                    )
                    .col(
                        ColumnDef::new(Alerts::Resolved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_alerts_station")
                            .from(Alerts::Table, Alerts::StationId)
                            .to(Stations::Table, Stations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one unresolved alert per station; backstops concurrent
        // classifiers racing on insert
        db.execute_unprepared(
            "CREATE UNIQUE INDEX idx_alerts_station_unresolved ON alerts (station_id) WHERE resolved = false",
        )
        .await?;

        // History queries scan newest-first
        db.execute_unprepared(
            "CREATE INDEX idx_alerts_station_time ON alerts (station_id, timestamp DESC)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order of dependencies
        manager
            .drop_table(Table::drop().table(Alerts::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(AlertThresholds::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(LiveReadings::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(Predictions::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(WaterLevels::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Stations::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Stations {
    Table,
    Id,
    Name,
    State,
    District,
    City,
    Latitude,
    Longitude,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum WaterLevels {
    Table,
    Id,
    StationId,
    Date,
    LevelMBgl,
    RechargePattern,
}

#[derive(DeriveIden)]
pub enum Predictions {
    Table,
    Id,
    StationId,
    Date,
    PredictedLevel,
    GeneratedAt,
}

#[derive(DeriveIden)]
pub enum LiveReadings {
    Table,
    Id,
    StationId,
    Timestamp,
    LevelMBgl,
    RechargeRate,
    BatteryPct,
    DeviceStatus,
}

#[derive(DeriveIden)]
pub enum AlertThresholds {
    Table,
    Id,
    StationId,
    Role,
    NormalMin,
    WarningMin,
    CriticalMin,
    EmergencyFloor,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Alerts {
    Table,
    Id,
    StationId,
    Level,
    Message,
    Timestamp,
    Resolved,
}
