use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub state: String,
    pub district: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::water_levels::Entity")]
    WaterLevels,
    #[sea_orm(has_many = "super::predictions::Entity")]
    Predictions,
    #[sea_orm(has_many = "super::live_readings::Entity")]
    LiveReadings,
    #[sea_orm(has_many = "super::alerts::Entity")]
    Alerts,
}

impl Related<super::water_levels::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WaterLevels.def()
    }
}

impl Related<super::predictions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Predictions.def()
    }
}

impl Related<super::live_readings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LiveReadings.def()
    }
}

impl Related<super::alerts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
