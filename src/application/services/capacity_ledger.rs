//! Capacity ledger
//!
//! The only writer of occurrence counters and status. Every change is a
//! read / compute / compare-and-swap cycle on the occurrence version, retried
//! while other writers keep winning.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{CategoryCounts, DomainError, RepositoryProvider, ScheduleOccurrence};
use crate::shared::errors::CapacityError;

const DEFAULT_MAX_ATTEMPTS: u32 = 32;

/// Proof of a successful reservation
#[derive(Debug, Clone)]
pub struct ReservationToken {
    pub occurrence_id: i64,
    pub counts: CategoryCounts,
    /// Occurrence state right after the reservation committed
    pub occurrence: ScheduleOccurrence,
}

pub struct CapacityLedger {
    repos: Arc<dyn RepositoryProvider>,
    max_attempts: u32,
}

impl CapacityLedger {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            repos,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// All-or-nothing reservation; flips the occurrence to FULL when a
    /// category reaches its maximum.
    pub async fn reserve(
        &self,
        occurrence_id: i64,
        counts: &CategoryCounts,
    ) -> Result<ReservationToken, CapacityError> {
        let occurrence = self
            .modify(occurrence_id, |current| current.reserved(counts).map(Some))
            .await?;
        debug!(
            occurrence_id,
            requested = counts.total(),
            status = %occurrence.status,
            "Capacity reserved"
        );
        Ok(ReservationToken {
            occurrence_id,
            counts: *counts,
            occurrence,
        })
    }

    /// Give capacity back. FULL reverts to ACTIVE once there is headroom;
    /// CANCELLED / DELAYED / DEPARTED overrides are left alone.
    pub async fn release(
        &self,
        occurrence_id: i64,
        counts: &CategoryCounts,
    ) -> Result<ScheduleOccurrence, CapacityError> {
        let occurrence = self
            .modify(occurrence_id, |current| Ok(Some(current.released(counts))))
            .await?;
        debug!(
            occurrence_id,
            released = counts.total(),
            status = %occurrence.status,
            "Capacity released"
        );
        Ok(occurrence)
    }

    /// Apply `change` under optimistic concurrency. `Ok(None)` from the
    /// closure means nothing to write; the current state is returned.
    pub async fn modify<F>(
        &self,
        occurrence_id: i64,
        change: F,
    ) -> Result<ScheduleOccurrence, CapacityError>
    where
        F: Fn(&ScheduleOccurrence) -> Result<Option<ScheduleOccurrence>, CapacityError>,
    {
        for attempt in 1..=self.max_attempts {
            let current = self
                .repos
                .schedules()
                .find_by_id(occurrence_id)
                .await?
                .ok_or_else(|| DomainError::not_found("ScheduleOccurrence", "id", occurrence_id))?;

            let Some(next) = change(&current)? else {
                return Ok(current);
            };

            if self.repos.schedules().compare_and_swap(&next).await? {
                let mut stored = next;
                stored.version += 1;
                return Ok(stored);
            }

            debug!(occurrence_id, attempt, "Occurrence changed concurrently, retrying");
            tokio::task::yield_now().await;
        }

        warn!(
            occurrence_id,
            attempts = self.max_attempts,
            "Gave up updating occurrence after repeated conflicts"
        );
        Err(CapacityError::Conflict(occurrence_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Fares, ScheduleStatus};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use chrono::NaiveDate;

    fn counts(passenger: u32, car: u32) -> CategoryCounts {
        CategoryCounts {
            passenger,
            car,
            ..Default::default()
        }
    }

    async fn setup(max: CategoryCounts) -> (Arc<dyn RepositoryProvider>, CapacityLedger, i64) {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = repos
            .schedules()
            .insert(ScheduleOccurrence::new(
                1,
                NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                max,
                Fares::default(),
            ))
            .await
            .unwrap();
        let ledger = CapacityLedger::new(repos.clone());
        (repos, ledger, occ.id)
    }

    #[tokio::test]
    async fn reserve_is_all_or_nothing() {
        let (repos, ledger, id) = setup(counts(5, 1)).await;

        let err = ledger.reserve(id, &counts(2, 2)).await.unwrap_err();
        assert!(matches!(err, CapacityError::CapacityExceeded { category: "car", .. }));

        let occ = repos.schedules().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(occ.capacity.used, CategoryCounts::default());
        assert_eq!(occ.version, 0);
    }

    #[tokio::test]
    async fn reserve_then_release_round_trips() {
        let (repos, ledger, id) = setup(counts(2, 0)).await;

        let token = ledger.reserve(id, &counts(2, 0)).await.unwrap();
        assert_eq!(token.occurrence.status, ScheduleStatus::Full);
        assert_eq!(token.occurrence.capacity.used.passenger, 2);

        let occ = ledger.release(id, &token.counts).await.unwrap();
        assert_eq!(occ.status, ScheduleStatus::Active);
        assert_eq!(occ.capacity.used.passenger, 0);

        let stored = repos.schedules().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored, occ);
    }

    #[tokio::test]
    async fn release_does_not_underflow() {
        let (_repos, ledger, id) = setup(counts(2, 0)).await;
        ledger.reserve(id, &counts(1, 0)).await.unwrap();
        let occ = ledger.release(id, &counts(3, 0)).await.unwrap();
        assert_eq!(occ.capacity.used.passenger, 0);
    }

    #[tokio::test]
    async fn unknown_occurrence_is_storage_not_found() {
        let (_repos, ledger, _) = setup(counts(2, 0)).await;
        let err = ledger.reserve(999, &counts(1, 0)).await.unwrap_err();
        assert!(matches!(
            err,
            CapacityError::Storage(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let (repos, ledger, id) = setup(counts(10, 0)).await;
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for _ in 0..25 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve(id, &counts(1, 0)).await.is_ok()
            }));
        }

        let mut won = 0;
        for h in handles {
            if h.await.unwrap() {
                won += 1;
            }
        }

        let occ = repos.schedules().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(won, 10);
        assert_eq!(occ.capacity.used.passenger, 10);
        assert_eq!(occ.status, ScheduleStatus::Full);
    }
}
