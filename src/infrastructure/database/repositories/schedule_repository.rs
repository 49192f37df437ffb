//! SeaORM implementation of ScheduleRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set, UpdateResult,
};
use tracing::debug;

use crate::domain::{
    CapacityCounters, CategoryCounts, DomainError, DomainResult, Fares, ScheduleOccurrence,
    ScheduleRepository, ScheduleStatus,
};
use crate::infrastructure::database::entities::schedule_occurrence;

pub struct SeaOrmScheduleRepository {
    db: DatabaseConnection,
}

impl SeaOrmScheduleRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn unit(v: i32) -> u32 {
    v.max(0) as u32
}

fn model_to_domain(m: schedule_occurrence::Model) -> DomainResult<ScheduleOccurrence> {
    let status = ScheduleStatus::from_str(&m.status)
        .ok_or_else(|| DomainError::Database(format!("unknown schedule status {}", m.status)))?;
    Ok(ScheduleOccurrence {
        id: m.id,
        schedule_id: m.schedule_id,
        sailing_date: m.sailing_date,
        capacity: CapacityCounters {
            used: CategoryCounts {
                passenger: unit(m.used_passenger),
                motorcycle: unit(m.used_motorcycle),
                car: unit(m.used_car),
                bus: unit(m.used_bus),
                truck: unit(m.used_truck),
            },
            max: CategoryCounts {
                passenger: unit(m.max_passenger),
                motorcycle: unit(m.max_motorcycle),
                car: unit(m.max_car),
                bus: unit(m.max_bus),
                truck: unit(m.max_truck),
            },
        },
        fares: Fares {
            passenger: m.fare_passenger,
            motorcycle: m.fare_motorcycle,
            car: m.fare_car,
            bus: m.fare_bus,
            truck: m.fare_truck,
        },
        status,
        status_reason: m.status_reason,
        status_expires_at: m.status_expires_at,
        version: m.version,
        updated_at: m.updated_at,
    })
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Database(e.to_string())
}

/// Counters are stored as INTEGER columns
fn counter(value: u32, column: &str) -> DomainResult<i32> {
    i32::try_from(value)
        .map_err(|_| DomainError::Validation(format!("{} out of range: {}", column, value)))
}

// ── ScheduleRepository impl ─────────────────────────────────────

#[async_trait]
impl ScheduleRepository for SeaOrmScheduleRepository {
    async fn insert(&self, o: ScheduleOccurrence) -> DomainResult<ScheduleOccurrence> {
        let used = o.capacity.used;
        let max = o.capacity.max;
        let model = schedule_occurrence::ActiveModel {
            id: NotSet,
            schedule_id: Set(o.schedule_id),
            sailing_date: Set(o.sailing_date),
            used_passenger: Set(counter(used.passenger, "used_passenger")?),
            used_motorcycle: Set(counter(used.motorcycle, "used_motorcycle")?),
            used_car: Set(counter(used.car, "used_car")?),
            used_bus: Set(counter(used.bus, "used_bus")?),
            used_truck: Set(counter(used.truck, "used_truck")?),
            max_passenger: Set(counter(max.passenger, "max_passenger")?),
            max_motorcycle: Set(counter(max.motorcycle, "max_motorcycle")?),
            max_car: Set(counter(max.car, "max_car")?),
            max_bus: Set(counter(max.bus, "max_bus")?),
            max_truck: Set(counter(max.truck, "max_truck")?),
            fare_passenger: Set(o.fares.passenger),
            fare_motorcycle: Set(o.fares.motorcycle),
            fare_car: Set(o.fares.car),
            fare_bus: Set(o.fares.bus),
            fare_truck: Set(o.fares.truck),
            status: Set(o.status.as_str().to_string()),
            status_reason: Set(o.status_reason),
            status_expires_at: Set(o.status_expires_at),
            version: Set(o.version),
            updated_at: Set(o.updated_at),
        };
        let saved = model.insert(&self.db).await.map_err(db_err)?;
        debug!("Inserted schedule occurrence {}", saved.id);
        model_to_domain(saved)
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<ScheduleOccurrence>> {
        schedule_occurrence::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn compare_and_swap(&self, next: &ScheduleOccurrence) -> DomainResult<bool> {
        use schedule_occurrence::Column;

        let used = next.capacity.used;
        let result: UpdateResult = schedule_occurrence::Entity::update_many()
            .col_expr(Column::UsedPassenger, Expr::value(counter(used.passenger, "used_passenger")?))
            .col_expr(Column::UsedMotorcycle, Expr::value(counter(used.motorcycle, "used_motorcycle")?))
            .col_expr(Column::UsedCar, Expr::value(counter(used.car, "used_car")?))
            .col_expr(Column::UsedBus, Expr::value(counter(used.bus, "used_bus")?))
            .col_expr(Column::UsedTruck, Expr::value(counter(used.truck, "used_truck")?))
            .col_expr(Column::Status, Expr::value(next.status.as_str()))
            .col_expr(Column::StatusReason, Expr::value(next.status_reason.clone()))
            .col_expr(Column::StatusExpiresAt, Expr::value(next.status_expires_at))
            .col_expr(Column::Version, Expr::value(next.version + 1))
            .col_expr(Column::UpdatedAt, Expr::value(next.updated_at))
            .filter(Column::Id.eq(next.id))
            .filter(Column::Version.eq(next.version))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected > 0 {
            return Ok(true);
        }

        // Lost the race, or the row is gone
        let exists = schedule_occurrence::Entity::find_by_id(next.id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        if !exists {
            return Err(DomainError::not_found("ScheduleOccurrence", "id", next.id));
        }
        debug!(
            "Version conflict on schedule occurrence {} (expected v{})",
            next.id, next.version
        );
        Ok(false)
    }

    async fn find_delay_elapsed(&self, now: DateTime<Utc>) -> DomainResult<Vec<ScheduleOccurrence>> {
        let models = schedule_occurrence::Entity::find()
            .filter(schedule_occurrence::Column::Status.eq(ScheduleStatus::Delayed.as_str()))
            .filter(schedule_occurrence::Column::StatusExpiresAt.lte(now))
            .order_by_asc(schedule_occurrence::Column::StatusExpiresAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models.into_iter().map(model_to_domain).collect()
    }
}
