pub mod entities;
pub mod migrator;
pub mod repositories;

pub use repositories::SeaOrmRepositoryProvider;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://./ferry.db?mode=rwc")
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./ferry.db?mode=rwc".to_string(),
            max_connections: 10,
        }
    }
}

impl DatabaseConfig {
    /// Create config for SQLite
    pub fn sqlite(path: &str) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path),
            ..Default::default()
        }
    }

    /// Private in-memory database; one connection so every query sees the same data
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

/// Initialize database connection
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, sea_orm::DbErr> {
    info!("Connecting to database: {}", config.url);
    let mut opts = ConnectOptions::new(config.url.clone());
    opts.max_connections(config.max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let db = Database::connect(opts).await?;
    info!("Database connected successfully");
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::migrator::{Migrator, MigratorTrait};
    use super::*;
    use crate::domain::{
        Booking, BookingItem, BookingStatus, CapacityCategory, CategoryCounts, Fares, Payment,
        PaymentSession, PaymentStatus, Refund, RepositoryProvider, ScheduleOccurrence,
        ScheduleStatus,
    };
    use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

    async fn repos() -> SeaOrmRepositoryProvider {
        let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmRepositoryProvider::new(db)
    }

    fn occurrence() -> ScheduleOccurrence {
        ScheduleOccurrence::new(
            3,
            NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            CategoryCounts {
                passenger: 10,
                car: 2,
                ..Default::default()
            },
            Fares {
                passenger: 50_000,
                car: 350_000,
                ..Default::default()
            },
        )
    }

    fn booking(occurrence_id: i64, code: &str) -> Booking {
        Booking::new(
            code,
            occurrence_id,
            vec![
                BookingItem {
                    category: CapacityCategory::Passenger,
                    label: "Ayu".into(),
                    fare: 50_000,
                },
                BookingItem {
                    category: CapacityCategory::Car,
                    label: "B 1234 XY".into(),
                    fare: 350_000,
                },
            ],
            "user-1",
            Utc::now(),
            ChronoDuration::minutes(5),
        )
    }

    #[tokio::test]
    async fn counter_beyond_column_range_is_refused() {
        let repos = repos().await;
        let mut occ = occurrence();
        occ.capacity.max.passenger = 3_000_000_000;

        let err = repos.schedules().insert(occ).await.unwrap_err();
        assert!(matches!(err, crate::domain::DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn schedule_cas_bumps_version_and_rejects_stale() {
        let repos = repos().await;
        let occ = repos.schedules().insert(occurrence()).await.unwrap();
        assert!(occ.id > 0);

        let next = occ
            .reserved(&CategoryCounts {
                passenger: 2,
                ..Default::default()
            })
            .unwrap();
        assert!(repos.schedules().compare_and_swap(&next).await.unwrap());
        // same base version again
        assert!(!repos.schedules().compare_and_swap(&next).await.unwrap());

        let stored = repos.schedules().find_by_id(occ.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.capacity.used.passenger, 2);
        assert_eq!(stored.capacity.max.car, 2);
        assert_eq!(stored.fares.car, 350_000);
        assert_eq!(stored.status, ScheduleStatus::Active);

        let mut ghost = stored.clone();
        ghost.id = 999;
        assert!(repos.schedules().compare_and_swap(&ghost).await.is_err());
    }

    #[tokio::test]
    async fn booking_round_trips_with_items_and_guards_status() {
        let repos = repos().await;
        let occ = repos.schedules().insert(occurrence()).await.unwrap();
        let b = booking(occ.id, "FRY-261017-AAAAAA");
        repos.bookings().insert(&b).await.unwrap();

        let dup = booking(occ.id, "FRY-261017-AAAAAA");
        assert!(repos.bookings().insert(&dup).await.is_err());

        let found = repos
            .bookings()
            .find_by_code("FRY-261017-AAAAAA")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, b.id);
        assert_eq!(found.items, b.items);
        assert_eq!(found.total_amount, 400_000);

        let now = Utc::now();
        assert!(repos
            .bookings()
            .transition(&b.id, BookingStatus::Pending, BookingStatus::Confirmed, None, now)
            .await
            .unwrap());
        assert!(!repos
            .bookings()
            .transition(&b.id, BookingStatus::Pending, BookingStatus::Expired, Some("late"), now)
            .await
            .unwrap());

        let stored = repos.bookings().find_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert!(stored.status_reason.is_none());
    }

    #[tokio::test]
    async fn expired_pending_query_respects_deadline() {
        let repos = repos().await;
        let occ = repos.schedules().insert(occurrence()).await.unwrap();
        let b = booking(occ.id, "FRY-261017-BBBBBB");
        repos.bookings().insert(&b).await.unwrap();

        let before = repos
            .bookings()
            .find_expired_pending(b.expires_at, 10)
            .await
            .unwrap();
        assert!(before.is_empty());

        let after = repos
            .bookings()
            .find_expired_pending(b.expires_at + ChronoDuration::seconds(1), 10)
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].items.len(), 2);
    }

    #[tokio::test]
    async fn payment_update_is_conditional_and_keeps_poll_counters() {
        let repos = repos().await;
        let occ = repos.schedules().insert(occurrence()).await.unwrap();
        let b = booking(occ.id, "FRY-261017-CCCCCC");
        repos.bookings().insert(&b).await.unwrap();

        let session = PaymentSession {
            order_id: b.code.clone(),
            token: "snap-token".into(),
            redirect_url: "https://pay.example/snap".into(),
        };
        let p = Payment::pending(&b.id, b.total_amount, &session);
        repos.payments().insert(&p).await.unwrap();

        let now = Utc::now();
        repos.payments().record_poll_attempt(&p.id, now).await.unwrap();

        let due = repos
            .payments()
            .find_due_for_poll(now + ChronoDuration::seconds(1), 1, 10)
            .await
            .unwrap();
        assert!(due.is_empty(), "attempt budget spent");

        let mut paid = p.clone();
        paid.status = PaymentStatus::Paid;
        paid.paid_at = Some(now);
        paid.raw_payload = Some(serde_json::json!({"transaction_status": "settlement"}));
        assert!(repos
            .payments()
            .update_if(&paid, PaymentStatus::Pending, 0)
            .await
            .unwrap());
        assert!(!repos
            .payments()
            .update_if(&paid, PaymentStatus::Pending, 0)
            .await
            .unwrap());

        let stored = repos
            .payments()
            .find_by_order_id(&b.code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, PaymentStatus::Paid);
        assert_eq!(stored.poll_attempts, 1);
        assert!(stored.last_polled_at.is_some());
        assert_eq!(
            stored.raw_payload.unwrap()["transaction_status"],
            "settlement"
        );
        assert!(repos
            .payments()
            .find_open_for_booking(&b.id)
            .await
            .unwrap()
            .is_none());

        repos
            .refunds()
            .insert(&Refund::new(&p.id, 100_000, Some("partial".into())))
            .await
            .unwrap();
        let refunds = repos.refunds().find_for_payment(&p.id).await.unwrap();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].amount, 100_000);
    }
}
