//! In-memory repositories for development and testing
//!
//! Conditional writes hold the DashMap shard lock for the duration of the
//! check-and-set, which gives the same single-row atomicity the SQL
//! `UPDATE ... WHERE` statements give.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::{
    Booking, BookingRepository, BookingStatus, DomainError, DomainResult, Payment,
    PaymentRepository, PaymentStatus, Refund, RefundRepository, RepositoryProvider,
    ScheduleOccurrence, ScheduleRepository, ScheduleStatus,
};

/// In-memory storage for development and testing
pub struct InMemoryRepositoryProvider {
    schedules: InMemoryScheduleRepository,
    bookings: InMemoryBookingRepository,
    payments: InMemoryPaymentRepository,
    refunds: InMemoryRefundRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self {
            schedules: InMemoryScheduleRepository {
                rows: DashMap::new(),
                next_id: AtomicI64::new(1),
            },
            bookings: InMemoryBookingRepository {
                rows: DashMap::new(),
            },
            payments: InMemoryPaymentRepository {
                rows: DashMap::new(),
            },
            refunds: InMemoryRefundRepository {
                rows: DashMap::new(),
            },
        }
    }
}

impl Default for InMemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn schedules(&self) -> &dyn ScheduleRepository {
        &self.schedules
    }

    fn bookings(&self) -> &dyn BookingRepository {
        &self.bookings
    }

    fn payments(&self) -> &dyn PaymentRepository {
        &self.payments
    }

    fn refunds(&self) -> &dyn RefundRepository {
        &self.refunds
    }
}

// ── Schedules ──────────────────────────────────────────────────

struct InMemoryScheduleRepository {
    rows: DashMap<i64, ScheduleOccurrence>,
    next_id: AtomicI64,
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn insert(&self, mut occurrence: ScheduleOccurrence) -> DomainResult<ScheduleOccurrence> {
        occurrence.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.insert(occurrence.id, occurrence.clone());
        Ok(occurrence)
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<ScheduleOccurrence>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn compare_and_swap(&self, next: &ScheduleOccurrence) -> DomainResult<bool> {
        let Some(mut row) = self.rows.get_mut(&next.id) else {
            return Err(DomainError::not_found("ScheduleOccurrence", "id", next.id));
        };
        if row.version != next.version {
            return Ok(false);
        }
        *row = next.clone();
        row.version = next.version + 1;
        Ok(true)
    }

    async fn find_delay_elapsed(&self, now: DateTime<Utc>) -> DomainResult<Vec<ScheduleOccurrence>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.status == ScheduleStatus::Delayed && r.delay_elapsed(now))
            .map(|r| r.clone())
            .collect())
    }
}

// ── Bookings ───────────────────────────────────────────────────

struct InMemoryBookingRepository {
    rows: DashMap<String, Booking>,
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: &Booking) -> DomainResult<()> {
        if self.rows.iter().any(|b| b.code == booking.code) {
            return Err(DomainError::Conflict(format!("booking code {}", booking.code)));
        }
        self.rows.insert(booking.id.clone(), booking.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Booking>> {
        Ok(self.rows.get(id).map(|r| r.clone()))
    }

    async fn find_by_code(&self, code: &str) -> DomainResult<Option<Booking>> {
        Ok(self
            .rows
            .iter()
            .find(|b| b.code == code)
            .map(|b| b.clone()))
    }

    async fn transition(
        &self,
        id: &str,
        from: BookingStatus,
        to: BookingStatus,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let Some(mut row) = self.rows.get_mut(id) else {
            return Err(DomainError::not_found("Booking", "id", id));
        };
        if row.status != from {
            return Ok(false);
        }
        row.status = to;
        if let Some(reason) = reason {
            row.status_reason = Some(reason.to_string());
        }
        row.updated_at = at;
        Ok(true)
    }

    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Booking>> {
        let mut rows: Vec<Booking> = self
            .rows
            .iter()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at < now)
            .map(|b| b.clone())
            .collect();
        rows.sort_by_key(|b| b.expires_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

// ── Payments ───────────────────────────────────────────────────

struct InMemoryPaymentRepository {
    rows: DashMap<String, Payment>,
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, payment: &Payment) -> DomainResult<()> {
        self.rows.insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Payment>> {
        Ok(self.rows.get(id).map(|r| r.clone()))
    }

    async fn find_by_order_id(&self, order_id: &str) -> DomainResult<Option<Payment>> {
        Ok(self
            .rows
            .iter()
            .filter(|p| p.order_id == order_id)
            .max_by_key(|p| p.created_at)
            .map(|p| p.clone()))
    }

    async fn find_open_for_booking(&self, booking_id: &str) -> DomainResult<Option<Payment>> {
        Ok(self
            .rows
            .iter()
            .find(|p| p.booking_id == booking_id && p.status.is_open())
            .map(|p| p.clone()))
    }

    async fn update_if(
        &self,
        next: &Payment,
        expected_status: PaymentStatus,
        expected_refunded: i64,
    ) -> DomainResult<bool> {
        let Some(mut row) = self.rows.get_mut(&next.id) else {
            return Err(DomainError::not_found("Payment", "id", &next.id));
        };
        if row.status != expected_status || row.refunded_amount != expected_refunded {
            return Ok(false);
        }
        let poll_attempts = row.poll_attempts;
        let last_polled_at = row.last_polled_at;
        *row = next.clone();
        // Poll bookkeeping is owned by record_poll_attempt
        row.poll_attempts = poll_attempts;
        row.last_polled_at = last_polled_at;
        Ok(true)
    }

    async fn find_due_for_poll(
        &self,
        created_before: DateTime<Utc>,
        max_attempts: u32,
        limit: u64,
    ) -> DomainResult<Vec<Payment>> {
        let mut rows: Vec<Payment> = self
            .rows
            .iter()
            .filter(|p| {
                p.status == PaymentStatus::Pending
                    && p.created_at < created_before
                    && p.poll_attempts < max_attempts
            })
            .map(|p| p.clone())
            .collect();
        rows.sort_by_key(|p| p.created_at);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn record_poll_attempt(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        let Some(mut row) = self.rows.get_mut(id) else {
            return Err(DomainError::not_found("Payment", "id", id));
        };
        row.poll_attempts += 1;
        row.last_polled_at = Some(at);
        Ok(())
    }
}

// ── Refunds ────────────────────────────────────────────────────

struct InMemoryRefundRepository {
    rows: DashMap<String, Refund>,
}

#[async_trait]
impl RefundRepository for InMemoryRefundRepository {
    async fn insert(&self, refund: &Refund) -> DomainResult<()> {
        self.rows.insert(refund.id.clone(), refund.clone());
        Ok(())
    }

    async fn find_for_payment(&self, payment_id: &str) -> DomainResult<Vec<Refund>> {
        let mut rows: Vec<Refund> = self
            .rows
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .map(|r| r.clone())
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CategoryCounts;
    use chrono::NaiveDate;

    fn occurrence() -> ScheduleOccurrence {
        let max = CategoryCounts {
            passenger: 10,
            ..Default::default()
        };
        ScheduleOccurrence::new(
            1,
            NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            max,
            Default::default(),
        )
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_version() {
        let repos = InMemoryRepositoryProvider::new();
        let occ = repos.schedules().insert(occurrence()).await.unwrap();

        let mut first = occ.clone();
        first.status_reason = Some("first".into());
        assert!(repos.schedules().compare_and_swap(&first).await.unwrap());

        let mut stale = occ.clone();
        stale.status_reason = Some("stale".into());
        assert!(!repos.schedules().compare_and_swap(&stale).await.unwrap());

        let stored = repos.schedules().find_by_id(occ.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status_reason.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn missing_occurrence_is_not_found() {
        let repos = InMemoryRepositoryProvider::new();
        let mut ghost = occurrence();
        ghost.id = 42;
        let err = repos.schedules().compare_and_swap(&ghost).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
