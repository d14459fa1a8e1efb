use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// High-frequency telemetry stream. Only entries within the trailing
/// freshness window matter operationally; older rows are pruned.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "live_readings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub station_id: Uuid,
    pub timestamp: DateTimeWithTimeZone,
    pub level_m_bgl: f64,
    pub recharge_rate: f64,
    pub battery_pct: f64,
    pub device_status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stations::Entity",
        from = "Column::StationId",
        to = "super::stations::Column::Id"
    )]
    Station,
}

impl Related<super::stations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Station.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
