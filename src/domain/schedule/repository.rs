//! Schedule occurrence repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::ScheduleOccurrence;
use crate::domain::DomainResult;

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Insert a new occurrence; returns it with its assigned id
    async fn insert(&self, occurrence: ScheduleOccurrence) -> DomainResult<ScheduleOccurrence>;

    /// Find occurrence by ID
    async fn find_by_id(&self, id: i64) -> DomainResult<Option<ScheduleOccurrence>>;

    /// Conditional write: persists counters, status, reason and expiry of
    /// `next` only if the stored version still equals `next.version`.
    /// The stored version is bumped on success. Returns `false` on conflict.
    async fn compare_and_swap(&self, next: &ScheduleOccurrence) -> DomainResult<bool>;

    /// DELAYED occurrences whose `status_expires_at` is at or before `now`
    async fn find_delay_elapsed(&self, now: DateTime<Utc>) -> DomainResult<Vec<ScheduleOccurrence>>;
}
