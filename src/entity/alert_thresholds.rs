use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Alert banding cut points for a (station, role) pair.
///
/// `station_id = NULL` marks the global default row for a role. Cut points are
/// minima (lower level = worse) and must be strictly descending:
/// `normal_min > warning_min > critical_min >= emergency_floor`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_thresholds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub station_id: Option<Uuid>,
    pub role: String,
    pub normal_min: f64,
    pub warning_min: f64,
    pub critical_min: f64,
    pub emergency_floor: f64,
    pub created_at: Option<DateTimeWithTimeZone>,
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
