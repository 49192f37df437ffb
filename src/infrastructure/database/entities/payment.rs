//! Payment entity: one gateway payment attempt for a booking

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub booking_id: String,

    /// Order id at the gateway (booking code)
    pub order_id: String,

    pub amount: i64,

    #[sea_orm(nullable)]
    pub method: Option<String>,
    #[sea_orm(nullable)]
    pub channel: Option<String>,
    #[sea_orm(nullable)]
    pub transaction_id: Option<String>,

    /// PENDING, PAID, FAILED, EXPIRED, PARTIALLY_REFUNDED, REFUNDED
    pub status: String,

    #[sea_orm(nullable)]
    pub snap_token: Option<String>,
    #[sea_orm(nullable)]
    pub redirect_url: Option<String>,
    #[sea_orm(nullable)]
    pub failure_reason: Option<String>,

    pub refunded_amount: i64,

    /// Last gateway payload, JSON text
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_payload: Option<String>,

    pub poll_attempts: i32,

    #[sea_orm(nullable)]
    pub last_polled_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub paid_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub expired_at: Option<DateTimeUtc>,
    #[sea_orm(nullable)]
    pub refunded_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id"
    )]
    Booking,
    #[sea_orm(has_many = "super::refund::Entity")]
    Refunds,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl Related<super::refund::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Refunds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
