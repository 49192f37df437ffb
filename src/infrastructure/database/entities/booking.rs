//! Booking entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub code: String,

    pub occurrence_id: i64,

    /// PENDING, CONFIRMED, CANCELLED, COMPLETED, EXPIRED, REFUNDED
    pub status: String,

    pub total_amount: i64,
    pub created_by: String,

    #[sea_orm(nullable)]
    pub status_reason: Option<String>,

    pub created_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schedule_occurrence::Entity",
        from = "Column::OccurrenceId",
        to = "super::schedule_occurrence::Column::Id"
    )]
    ScheduleOccurrence,
    #[sea_orm(has_many = "super::booking_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::schedule_occurrence::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleOccurrence.def()
    }
}

impl Related<super::booking_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
