//! Booking repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Booking, BookingStatus};
use crate::domain::DomainResult;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Save a new booking together with its line items
    async fn insert(&self, booking: &Booking) -> DomainResult<()>;

    /// Find booking by ID
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Booking>>;

    /// Find booking by public code
    async fn find_by_code(&self, code: &str) -> DomainResult<Option<Booking>>;

    /// Conditional status write: applies only while the stored status is
    /// still `from`. Returns `false` when another writer got there first.
    async fn transition(
        &self,
        id: &str,
        from: BookingStatus,
        to: BookingStatus,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// PENDING bookings whose deadline is strictly before `now`, oldest first
    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> DomainResult<Vec<Booking>>;
}
