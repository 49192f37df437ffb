//! Schedule occurrence entity: one sailing with its capacity counters

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schedule_occurrences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub schedule_id: i64,
    pub sailing_date: Date,

    pub used_passenger: i32,
    pub used_motorcycle: i32,
    pub used_car: i32,
    pub used_bus: i32,
    pub used_truck: i32,

    pub max_passenger: i32,
    pub max_motorcycle: i32,
    pub max_car: i32,
    pub max_bus: i32,
    pub max_truck: i32,

    pub fare_passenger: i64,
    pub fare_motorcycle: i64,
    pub fare_car: i64,
    pub fare_bus: i64,
    pub fare_truck: i64,

    /// ACTIVE, CANCELLED, DELAYED, FULL, DEPARTED
    pub status: String,

    #[sea_orm(nullable)]
    pub status_reason: Option<String>,

    #[sea_orm(nullable)]
    pub status_expires_at: Option<DateTimeUtc>,

    /// Optimistic concurrency token
    pub version: i64,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
