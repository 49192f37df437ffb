//! SeaORM implementation of BookingRepository
//!
//! A booking row and its items are written in one transaction; status
//! changes go through a conditional update keyed on the current status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait, UpdateResult,
};
use tracing::debug;

use crate::domain::{
    Booking, BookingItem, BookingRepository, BookingStatus, CapacityCategory, DomainError,
    DomainResult,
};
use crate::infrastructure::database::entities::{booking, booking_item};

pub struct SeaOrmBookingRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn with_items(&self, m: booking::Model) -> DomainResult<Booking> {
        let items = booking_item::Entity::find()
            .filter(booking_item::Column::BookingId.eq(m.id.as_str()))
            .order_by_asc(booking_item::Column::Position)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        model_to_domain(m, items)
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: booking::Model, items: Vec<booking_item::Model>) -> DomainResult<Booking> {
    let status = BookingStatus::from_str(&m.status)
        .ok_or_else(|| DomainError::Database(format!("unknown booking status {}", m.status)))?;
    let items = items
        .into_iter()
        .map(|i| {
            let category = CapacityCategory::from_str(&i.category).ok_or_else(|| {
                DomainError::Database(format!("unknown capacity category {}", i.category))
            })?;
            Ok(BookingItem {
                category,
                label: i.label,
                fare: i.fare,
            })
        })
        .collect::<DomainResult<Vec<_>>>()?;

    Ok(Booking {
        id: m.id,
        code: m.code,
        occurrence_id: m.occurrence_id,
        status,
        items,
        total_amount: m.total_amount,
        created_by: m.created_by,
        status_reason: m.status_reason,
        created_at: m.created_at,
        expires_at: m.expires_at,
        updated_at: m.updated_at,
    })
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Database(e.to_string())
}

// ── BookingRepository impl ──────────────────────────────────────

#[async_trait]
impl BookingRepository for SeaOrmBookingRepository {
    async fn insert(&self, b: &Booking) -> DomainResult<()> {
        debug!("Saving booking {} ({} items)", b.code, b.items.len());

        let txn = self.db.begin().await.map_err(db_err)?;

        let model = booking::ActiveModel {
            id: Set(b.id.clone()),
            code: Set(b.code.clone()),
            occurrence_id: Set(b.occurrence_id),
            status: Set(b.status.as_str().to_string()),
            total_amount: Set(b.total_amount),
            created_by: Set(b.created_by.clone()),
            status_reason: Set(b.status_reason.clone()),
            created_at: Set(b.created_at),
            expires_at: Set(b.expires_at),
            updated_at: Set(b.updated_at),
        };
        if let Err(e) = model.insert(&txn).await {
            txn.rollback().await.map_err(db_err)?;
            if let Some(SqlErr::UniqueConstraintViolation(_)) = e.sql_err() {
                return Err(DomainError::Conflict(format!("booking code {}", b.code)));
            }
            return Err(db_err(e));
        }

        for (position, item) in b.items.iter().enumerate() {
            booking_item::ActiveModel {
                id: NotSet,
                booking_id: Set(b.id.clone()),
                position: Set(position as i32),
                category: Set(item.category.as_str().to_string()),
                label: Set(item.label.clone()),
                fare: Set(item.fare),
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Booking>> {
        let model = booking::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        match model {
            Some(m) => Ok(Some(self.with_items(m).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_code(&self, code: &str) -> DomainResult<Option<Booking>> {
        let model = booking::Entity::find()
            .filter(booking::Column::Code.eq(code))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        match model {
            Some(m) => Ok(Some(self.with_items(m).await?)),
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        id: &str,
        from: BookingStatus,
        to: BookingStatus,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut update = booking::Entity::update_many()
            .col_expr(booking::Column::Status, Expr::value(to.as_str()))
            .col_expr(booking::Column::UpdatedAt, Expr::value(at));
        if let Some(reason) = reason {
            update = update.col_expr(booking::Column::StatusReason, Expr::value(reason));
        }

        let result: UpdateResult = update
            .filter(booking::Column::Id.eq(id))
            .filter(booking::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected > 0 {
            debug!("Booking {} {} -> {}", id, from, to);
            return Ok(true);
        }

        let exists = booking::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        if !exists {
            return Err(DomainError::not_found("Booking", "id", id));
        }
        Ok(false)
    }

    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .filter(booking::Column::ExpiresAt.lt(now))
            .order_by_asc(booking::Column::ExpiresAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut bookings = Vec::with_capacity(models.len());
        for m in models {
            bookings.push(self.with_items(m).await?);
        }
        Ok(bookings)
    }
}
