//! Payment and refund repository interfaces

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Payment, PaymentStatus, Refund};
use crate::domain::DomainResult;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> DomainResult<()>;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Payment>>;

    /// Most recent payment carrying this gateway order id
    async fn find_by_order_id(&self, order_id: &str) -> DomainResult<Option<Payment>>;

    /// The booking's PENDING payment, if any
    async fn find_open_for_booking(&self, booking_id: &str) -> DomainResult<Option<Payment>>;

    /// Conditional write of every mutable field of `next`. Applies only while
    /// the stored row still has `expected_status` and `expected_refunded`;
    /// returns `false` when a concurrent writer changed it first.
    async fn update_if(
        &self,
        next: &Payment,
        expected_status: PaymentStatus,
        expected_refunded: i64,
    ) -> DomainResult<bool>;

    /// PENDING payments created before `created_before` with fewer than
    /// `max_attempts` polls, oldest first
    async fn find_due_for_poll(
        &self,
        created_before: DateTime<Utc>,
        max_attempts: u32,
        limit: u64,
    ) -> DomainResult<Vec<Payment>>;

    async fn record_poll_attempt(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()>;
}

#[async_trait]
pub trait RefundRepository: Send + Sync {
    async fn insert(&self, refund: &Refund) -> DomainResult<()>;

    async fn find_for_payment(&self, payment_id: &str) -> DomainResult<Vec<Refund>>;
}
