//! Schedule occurrence status management
//!
//! Operator overrides and delay recovery. Writes go through the capacity
//! ledger's optimistic loop so they never clobber a concurrent reservation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use super::capacity_ledger::CapacityLedger;
use crate::application::events::{Event, ScheduleChangedEvent, SharedEventBus};
use crate::domain::{
    Actor, CapacityCategory, CategoryCounts, DomainError, Fares, RepositoryProvider,
    ScheduleOccurrence, ScheduleStatus,
};
use crate::shared::errors::BookingError;

pub struct ScheduleService {
    repos: Arc<dyn RepositoryProvider>,
    ledger: Arc<CapacityLedger>,
    event_bus: SharedEventBus,
}

impl ScheduleService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        ledger: Arc<CapacityLedger>,
        event_bus: SharedEventBus,
    ) -> Self {
        Self {
            repos,
            ledger,
            event_bus,
        }
    }

    pub async fn get(&self, occurrence_id: i64) -> Result<ScheduleOccurrence, BookingError> {
        self.repos
            .schedules()
            .find_by_id(occurrence_id)
            .await?
            .ok_or_else(|| DomainError::not_found("ScheduleOccurrence", "id", occurrence_id).into())
    }

    /// Open a sailing for booking
    pub async fn create_occurrence(
        &self,
        actor: &Actor,
        schedule_id: i64,
        sailing_date: NaiveDate,
        max: CategoryCounts,
        fares: Fares,
    ) -> Result<ScheduleOccurrence, BookingError> {
        require_staff(actor)?;
        if max.is_empty() {
            return Err(DomainError::Validation("occurrence has no capacity".into()).into());
        }
        if CapacityCategory::ALL.iter().any(|c| fares.get(*c) < 0) {
            return Err(DomainError::Validation("fares must not be negative".into()).into());
        }
        let occurrence = self
            .repos
            .schedules()
            .insert(ScheduleOccurrence::new(schedule_id, sailing_date, max, fares))
            .await?;
        info!(
            occurrence_id = occurrence.id,
            schedule_id,
            %sailing_date,
            actor = %actor.id,
            "Schedule occurrence created"
        );
        Ok(occurrence)
    }

    /// Operator override: CANCELLED, DELAYED (optionally auto-recovering at
    /// `expires_at`), DEPARTED or back to ACTIVE.
    pub async fn set_status(
        &self,
        actor: &Actor,
        occurrence_id: i64,
        status: ScheduleStatus,
        reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ScheduleOccurrence, BookingError> {
        require_staff(actor)?;
        if status == ScheduleStatus::Delayed {
            if let Some(at) = expires_at {
                if at <= Utc::now() {
                    return Err(DomainError::Validation(
                        "delay expiry must be in the future".into(),
                    )
                    .into());
                }
            }
        }

        let before = self.get(occurrence_id).await?;
        let updated = self
            .ledger
            .modify(occurrence_id, |current| {
                Ok(Some(current.overridden(status, reason.clone(), expires_at)))
            })
            .await?;

        info!(
            occurrence_id,
            from = %before.status,
            to = %updated.status,
            actor = %actor.id,
            reason = ?updated.status_reason,
            "Schedule status overridden"
        );
        self.publish_change(&before, &updated);
        Ok(updated)
    }

    /// Revert an elapsed DELAYED occurrence to normal service. Returns
    /// `false` if it is no longer delayed or the delay has not elapsed.
    pub async fn recover_if_elapsed(
        &self,
        occurrence_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let before = self.get(occurrence_id).await?;
        let recovered = AtomicBool::new(false);
        let updated = self
            .ledger
            .modify(occurrence_id, |current| {
                let elapsed = current.delay_elapsed(now);
                recovered.store(elapsed, Ordering::SeqCst);
                Ok(elapsed.then(|| current.recovered()))
            })
            .await?;

        if !recovered.load(Ordering::SeqCst) {
            return Ok(false);
        }
        info!(occurrence_id, status = %updated.status, "Delay elapsed, schedule restored");
        self.publish_change(&before, &updated);
        Ok(true)
    }

    fn publish_change(&self, before: &ScheduleOccurrence, after: &ScheduleOccurrence) {
        if before.status == after.status && before.status_reason == after.status_reason {
            return;
        }
        self.event_bus
            .publish(Event::ScheduleChanged(ScheduleChangedEvent {
                occurrence_id: after.id,
                old_status: before.status.as_str().to_string(),
                new_status: after.status.as_str().to_string(),
                reason: after.status_reason.clone(),
                timestamp: after.updated_at,
            }));
    }
}

fn require_staff(actor: &Actor) -> Result<(), BookingError> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!("{} may not manage schedules", actor.id)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::create_event_bus;
    use crate::application::services::test_support::seed_occurrence;
    use crate::domain::ActorRole;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use chrono::Duration;

    fn service() -> (Arc<dyn RepositoryProvider>, ScheduleService, SharedEventBus) {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let bus = create_event_bus();
        let ledger = Arc::new(CapacityLedger::new(repos.clone()));
        (repos.clone(), ScheduleService::new(repos, ledger, bus.clone()), bus)
    }

    fn operator() -> Actor {
        Actor::new("op-1", ActorRole::Operator)
    }

    #[tokio::test]
    async fn operator_cancels_and_event_is_emitted() {
        let (repos, svc, bus) = service();
        let occ = seed_occurrence(&repos, 10).await;
        let mut events = bus.subscribe();

        let updated = svc
            .set_status(&operator(), occ, ScheduleStatus::Cancelled, Some("weather".into()), None)
            .await
            .unwrap();
        assert_eq!(updated.status, ScheduleStatus::Cancelled);
        assert_eq!(updated.status_reason.as_deref(), Some("weather"));

        let msg = events.try_recv().unwrap();
        assert_eq!(msg.event.event_type(), "schedule_changed");
    }

    #[tokio::test]
    async fn negative_fare_is_invalid() {
        let (_repos, svc, _bus) = service();
        let max = CategoryCounts {
            passenger: 10,
            ..Default::default()
        };
        let fares = Fares {
            passenger: -1,
            ..Default::default()
        };
        let err = svc
            .create_occurrence(
                &operator(),
                1,
                NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
                max,
                fares,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn customers_cannot_override() {
        let (repos, svc, _bus) = service();
        let occ = seed_occurrence(&repos, 10).await;
        let err = svc
            .set_status(
                &Actor::new("u", ActorRole::Customer),
                occ,
                ScheduleStatus::Cancelled,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Domain(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    async fn delay_in_the_past_is_invalid() {
        let (repos, svc, _bus) = service();
        let occ = seed_occurrence(&repos, 10).await;
        let err = svc
            .set_status(
                &operator(),
                occ,
                ScheduleStatus::Delayed,
                None,
                Some(Utc::now() - Duration::minutes(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn elapsed_delay_recovers_once() {
        let (repos, svc, _bus) = service();
        let occ = seed_occurrence(&repos, 10).await;
        let until = Utc::now() + Duration::minutes(30);
        svc.set_status(&operator(), occ, ScheduleStatus::Delayed, Some("tide".into()), Some(until))
            .await
            .unwrap();

        assert!(!svc.recover_if_elapsed(occ, Utc::now()).await.unwrap());

        let later = until + Duration::seconds(1);
        assert!(svc.recover_if_elapsed(occ, later).await.unwrap());
        let stored = svc.get(occ).await.unwrap();
        assert_eq!(stored.status, ScheduleStatus::Active);
        assert_eq!(stored.status_reason, None);
        assert_eq!(stored.status_expires_at, None);

        assert!(!svc.recover_if_elapsed(occ, later).await.unwrap());
    }
}
