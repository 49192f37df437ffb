//! Booking lifecycle
//!
//! PENDING -> {CONFIRMED, CANCELLED, EXPIRED}, CONFIRMED -> {CANCELLED,
//! REFUNDED}. Every write is conditional on the status it was decided from,
//! so a sweep and a notification racing on one booking cannot both win.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

use super::capacity_ledger::CapacityLedger;
use crate::application::events::{
    BookingCancelledEvent, BookingConfirmedEvent, BookingCreatedEvent, BookingExpiredEvent,
    BookingRefundedEvent, Event, SharedEventBus,
};
use crate::domain::{
    booking::{counts_for, generate_booking_code},
    Actor, Booking, BookingItem, BookingStatus, CapacityCategory, DomainError, PaymentStatus,
    RepositoryProvider,
};
use crate::shared::errors::BookingError;

/// Re-reads of the open payment before giving up on closing it
const CLAIM_ATTEMPTS: u32 = 3;

/// Booking rules taken from configuration
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// How long a PENDING booking holds capacity while waiting for payment
    pub expiry_window: Duration,
    pub code_prefix: String,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            expiry_window: Duration::minutes(5),
            code_prefix: "FRY".to_string(),
        }
    }
}

/// One requested passenger or vehicle
#[derive(Debug, Clone)]
pub struct BookingRequestItem {
    pub category: CapacityCategory,
    pub label: String,
}

pub struct BookingService {
    repos: Arc<dyn RepositoryProvider>,
    ledger: Arc<CapacityLedger>,
    event_bus: SharedEventBus,
    policy: BookingPolicy,
}

impl BookingService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        ledger: Arc<CapacityLedger>,
        event_bus: SharedEventBus,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            repos,
            ledger,
            event_bus,
            policy,
        }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Booking, BookingError> {
        self.repos
            .bookings()
            .find_by_code(code)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", "code", code).into())
    }

    async fn load(&self, booking_id: &str) -> Result<Booking, BookingError> {
        self.repos
            .bookings()
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking", "id", booking_id).into())
    }

    /// Reserve capacity and create a PENDING booking. Nothing is persisted
    /// when the reservation fails.
    pub async fn create(
        &self,
        actor: &Actor,
        occurrence_id: i64,
        items: Vec<BookingRequestItem>,
    ) -> Result<Booking, BookingError> {
        if items.is_empty() {
            return Err(BookingError::EmptyBooking);
        }

        let labels: Vec<BookingItem> = items
            .into_iter()
            .map(|i| BookingItem {
                category: i.category,
                label: i.label,
                fare: 0,
            })
            .collect();
        let counts = counts_for(&labels);

        let token = match self.ledger.reserve(occurrence_id, &counts).await {
            Ok(token) => token,
            Err(e) => {
                let err = BookingError::from(e);
                if matches!(err, BookingError::NoCapacity(_)) {
                    metrics::counter!("bookings_rejected_total").increment(1);
                    info!(occurrence_id, error = %err, "Booking rejected");
                }
                return Err(err);
            }
        };

        let fares = token.occurrence.fares;
        let priced = labels
            .into_iter()
            .map(|mut item| {
                item.fare = fares.get(item.category);
                item
            })
            .collect();

        let now = Utc::now();
        let booking = Booking::new(
            generate_booking_code(&self.policy.code_prefix, now),
            occurrence_id,
            priced,
            actor.id.clone(),
            now,
            self.policy.expiry_window,
        );

        if let Err(e) = self.repos.bookings().insert(&booking).await {
            // Compensate: the reservation must not outlive a booking that was never stored
            if let Err(release_err) = self.ledger.release(occurrence_id, &counts).await {
                error!(
                    occurrence_id,
                    error = %release_err,
                    "Failed to release capacity after booking insert failure"
                );
            }
            return Err(e.into());
        }

        metrics::counter!("bookings_created_total").increment(1);
        info!(
            booking_code = %booking.code,
            occurrence_id,
            total_amount = booking.total_amount,
            expires_at = %booking.expires_at,
            "Booking created"
        );

        self.event_bus.publish(Event::BookingCreated(BookingCreatedEvent {
            booking_code: booking.code.clone(),
            occurrence_id,
            total_amount: booking.total_amount,
            expires_at: booking.expires_at,
            timestamp: now,
        }));

        Ok(booking)
    }

    /// PENDING -> CONFIRMED. Confirming a CONFIRMED booking is a no-op.
    pub async fn confirm(&self, booking_id: &str) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        match booking.status {
            BookingStatus::Confirmed => {
                debug!(booking_code = %booking.code, "Booking already confirmed");
                return Ok(booking);
            }
            BookingStatus::Pending => {}
            other => {
                return Err(BookingError::invalid_transition(
                    "booking",
                    other.as_str(),
                    BookingStatus::Confirmed.as_str(),
                ))
            }
        }

        let now = Utc::now();
        let applied = self
            .repos
            .bookings()
            .transition(
                &booking.id,
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                None,
                now,
            )
            .await?;

        if !applied {
            // Lost a race; only a concurrent confirm counts as success
            let current = self.load(booking_id).await?;
            if current.status == BookingStatus::Confirmed {
                return Ok(current);
            }
            return Err(BookingError::invalid_transition(
                "booking",
                current.status.as_str(),
                BookingStatus::Confirmed.as_str(),
            ));
        }

        info!(booking_code = %booking.code, "Booking confirmed");
        self.event_bus
            .publish(Event::BookingConfirmed(BookingConfirmedEvent {
                booking_code: booking.code.clone(),
                occurrence_id: booking.occurrence_id,
                timestamp: now,
            }));

        Ok(Booking {
            status: BookingStatus::Confirmed,
            updated_at: now,
            ..booking
        })
    }

    /// Cancel a PENDING or CONFIRMED booking on behalf of `actor`, releasing
    /// its capacity and closing any open payment.
    pub async fn cancel(
        &self,
        actor: &Actor,
        booking_id: &str,
        reason: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;

        if !actor.can_manage_booking(&booking.created_by) {
            return Err(DomainError::Forbidden(format!(
                "{} may not cancel booking {}",
                actor.id, booking.code
            ))
            .into());
        }

        let from = booking.status;
        if !from.can_transition_to(BookingStatus::Cancelled) {
            return Err(BookingError::invalid_transition(
                "booking",
                from.as_str(),
                BookingStatus::Cancelled.as_str(),
            ));
        }

        let now = Utc::now();
        if let Some(settled) = self
            .claim_open_payment(&booking, PaymentStatus::Failed, reason, now)
            .await?
        {
            return Err(BookingError::invalid_transition(
                "payment",
                settled.as_str(),
                PaymentStatus::Failed.as_str(),
            ));
        }

        let applied = self
            .repos
            .bookings()
            .transition(&booking.id, from, BookingStatus::Cancelled, Some(reason), now)
            .await?;

        if !applied {
            let current = self.load(booking_id).await?;
            return Err(BookingError::invalid_transition(
                "booking",
                current.status.as_str(),
                BookingStatus::Cancelled.as_str(),
            ));
        }

        self.release_capacity(&booking).await;

        info!(
            booking_code = %booking.code,
            actor = %actor.id,
            role = actor.role.as_str(),
            reason,
            "Booking cancelled"
        );
        self.event_bus
            .publish(Event::BookingCancelled(BookingCancelledEvent {
                booking_code: booking.code.clone(),
                occurrence_id: booking.occurrence_id,
                reason: reason.to_string(),
                timestamp: now,
            }));

        Ok(Booking {
            status: BookingStatus::Cancelled,
            status_reason: Some(reason.to_string()),
            updated_at: now,
            ..booking
        })
    }

    /// PENDING -> EXPIRED once `now` is past the deadline. Returns `false`
    /// when there was nothing to do (already settled or lost a race).
    pub async fn expire(&self, booking_id: &str, now: DateTime<Utc>) -> Result<bool, BookingError> {
        let booking = self.load(booking_id).await?;
        if booking.status != BookingStatus::Pending {
            debug!(booking_code = %booking.code, status = %booking.status, "Expire skipped");
            return Ok(false);
        }
        if !booking.is_past_deadline(now) {
            return Err(BookingError::NotYetExpired);
        }

        if let Some(settled) = self
            .claim_open_payment(&booking, PaymentStatus::Expired, "booking expired", now)
            .await?
        {
            debug!(booking_code = %booking.code, payment = %settled, "Payment settled first, expire skipped");
            if settled == PaymentStatus::Paid {
                self.confirm(&booking.id).await?;
            }
            return Ok(false);
        }

        let applied = self
            .repos
            .bookings()
            .transition(
                &booking.id,
                BookingStatus::Pending,
                BookingStatus::Expired,
                Some("payment window expired"),
                now,
            )
            .await?;
        if !applied {
            debug!(booking_code = %booking.code, "Booking settled concurrently, expire skipped");
            return Ok(false);
        }

        self.release_capacity(&booking).await;

        info!(booking_code = %booking.code, expires_at = %booking.expires_at, "Booking expired");
        self.event_bus.publish(Event::BookingExpired(BookingExpiredEvent {
            booking_code: booking.code.clone(),
            occurrence_id: booking.occurrence_id,
            timestamp: now,
        }));

        Ok(true)
    }

    /// CONFIRMED -> REFUNDED after a full refund. Capacity stays held.
    pub async fn mark_refunded(&self, booking_id: &str) -> Result<bool, BookingError> {
        let booking = self.load(booking_id).await?;
        match booking.status {
            BookingStatus::Refunded => return Ok(false),
            BookingStatus::Confirmed => {}
            other => {
                return Err(BookingError::invalid_transition(
                    "booking",
                    other.as_str(),
                    BookingStatus::Refunded.as_str(),
                ))
            }
        }

        let now = Utc::now();
        let applied = self
            .repos
            .bookings()
            .transition(
                &booking.id,
                BookingStatus::Confirmed,
                BookingStatus::Refunded,
                Some("refunded"),
                now,
            )
            .await?;
        if applied {
            info!(booking_code = %booking.code, "Booking refunded");
            self.event_bus
                .publish(Event::BookingRefunded(BookingRefundedEvent {
                    booking_code: booking.code.clone(),
                    timestamp: now,
                }));
        }
        Ok(applied)
    }

    async fn release_capacity(&self, booking: &Booking) {
        if let Err(e) = self
            .ledger
            .release(booking.occurrence_id, &booking.counts())
            .await
        {
            error!(
                booking_code = %booking.code,
                occurrence_id = booking.occurrence_id,
                error = %e,
                "Failed to release capacity"
            );
        }
    }

    /// Close the booking's open payment before the booking itself moves, so
    /// the payment row decides any race with a gateway report. A late PAID
    /// report is then rejected by the monotonic rule.
    ///
    /// Returns the payment status when the gateway settled it first with a
    /// success; the caller must leave the booking alone in that case.
    async fn claim_open_payment(
        &self,
        booking: &Booking,
        status: PaymentStatus,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatus>, BookingError> {
        let Some(mut open) = self.repos.payments().find_open_for_booking(&booking.id).await? else {
            return Ok(None);
        };

        for _ in 0..CLAIM_ATTEMPTS {
            let next = open.closed_locally(status, reason, now);
            if self
                .repos
                .payments()
                .update_if(&next, open.status, open.refunded_amount)
                .await?
            {
                debug!(payment_id = %open.id, status = %status, "Open payment closed");
                return Ok(None);
            }

            let current = self
                .repos
                .payments()
                .find_by_id(&open.id)
                .await?
                .ok_or_else(|| DomainError::not_found("Payment", "id", &open.id))?;
            if current.status.is_terminal_failure() {
                return Ok(None);
            }
            if !current.status.is_open() {
                info!(
                    booking_code = %booking.code,
                    payment_id = %current.id,
                    payment = %current.status,
                    "Payment settled before the booking could be closed"
                );
                return Ok(Some(current.status));
            }
            open = current;
        }

        Err(DomainError::Conflict(format!("payment for {} kept changing", booking.code)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::create_event_bus;
    use crate::application::services::test_support::{booking_service, passengers, seed_occurrence};
    use crate::domain::{ActorRole, ScheduleStatus};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    fn customer(id: &str) -> Actor {
        Actor::new(id, ActorRole::Customer)
    }

    #[tokio::test]
    async fn scenario_last_seats_then_no_capacity() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 2).await;
        let svc = booking_service(repos.clone(), create_event_bus());

        let booking = svc
            .create(&customer("u1"), occ, passengers(2))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_amount, 100_000);

        let stored = repos.schedules().find_by_id(occ).await.unwrap().unwrap();
        assert_eq!(stored.capacity.used.passenger, 2);
        assert_eq!(stored.status, ScheduleStatus::Full);

        let err = svc
            .create(&customer("u2"), occ, passengers(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NoCapacity(_)));
    }

    #[tokio::test]
    async fn empty_booking_is_rejected() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 2).await;
        let svc = booking_service(repos, create_event_bus());
        let err = svc.create(&customer("u1"), occ, vec![]).await.unwrap_err();
        assert!(matches!(err, BookingError::EmptyBooking));
    }

    #[tokio::test]
    async fn confirm_is_idempotent() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 4).await;
        let svc = booking_service(repos.clone(), create_event_bus());
        let booking = svc.create(&customer("u1"), occ, passengers(1)).await.unwrap();

        svc.confirm(&booking.id).await.unwrap();
        let again = svc.confirm(&booking.id).await.unwrap();
        assert_eq!(again.status, BookingStatus::Confirmed);

        let stored = repos.schedules().find_by_id(occ).await.unwrap().unwrap();
        assert_eq!(stored.capacity.used.passenger, 1);
    }

    #[tokio::test]
    async fn cancel_releases_capacity_and_is_not_repeatable() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 2).await;
        let svc = booking_service(repos.clone(), create_event_bus());
        let booking = svc.create(&customer("u1"), occ, passengers(2)).await.unwrap();

        let cancelled = svc
            .cancel(&customer("u1"), &booking.id, "changed plans")
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let stored = repos.schedules().find_by_id(occ).await.unwrap().unwrap();
        assert_eq!(stored.capacity.used.passenger, 0);
        assert_eq!(stored.status, ScheduleStatus::Active);

        let err = svc
            .cancel(&customer("u1"), &booking.id, "again")
            .await
            .unwrap_err();
        assert!(err.is_benign_race());
    }

    #[tokio::test]
    async fn customers_cannot_cancel_other_bookings() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 2).await;
        let svc = booking_service(repos, create_event_bus());
        let booking = svc.create(&customer("u1"), occ, passengers(1)).await.unwrap();

        let err = svc
            .cancel(&customer("intruder"), &booking.id, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Domain(DomainError::Forbidden(_))));

        svc.cancel(&Actor::new("op-1", ActorRole::Operator), &booking.id, "ops")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expire_respects_deadline_and_is_idempotent() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 2).await;
        let svc = booking_service(repos.clone(), create_event_bus());
        let booking = svc.create(&customer("u1"), occ, passengers(1)).await.unwrap();

        let err = svc.expire(&booking.id, booking.created_at).await.unwrap_err();
        assert!(matches!(err, BookingError::NotYetExpired));

        let later = booking.expires_at + Duration::seconds(1);
        assert!(svc.expire(&booking.id, later).await.unwrap());
        assert!(!svc.expire(&booking.id, later).await.unwrap());

        let stored = repos.schedules().find_by_id(occ).await.unwrap().unwrap();
        assert_eq!(stored.capacity.used.passenger, 0);
    }

    #[tokio::test]
    async fn expire_on_confirmed_booking_is_a_no_op() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 2).await;
        let svc = booking_service(repos.clone(), create_event_bus());
        let booking = svc.create(&customer("u1"), occ, passengers(1)).await.unwrap();
        svc.confirm(&booking.id).await.unwrap();

        let later = booking.expires_at + Duration::minutes(10);
        assert!(!svc.expire(&booking.id, later).await.unwrap());

        let stored = repos.schedules().find_by_id(occ).await.unwrap().unwrap();
        assert_eq!(stored.capacity.used.passenger, 1);
    }

    #[tokio::test]
    async fn cancelled_occurrence_rejects_bookings() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 2).await;
        let mut stored = repos.schedules().find_by_id(occ).await.unwrap().unwrap();
        stored.status = ScheduleStatus::Cancelled;
        assert!(repos.schedules().compare_and_swap(&stored).await.unwrap());

        let svc = booking_service(repos, create_event_bus());
        let err = svc.create(&customer("u1"), occ, passengers(1)).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::NoCapacity(crate::shared::errors::CapacityError::NotBookable("CANCELLED"))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn scenario_concurrent_creates_for_last_seat() {
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let occ = seed_occurrence(&repos, 1).await;
        let svc = Arc::new(booking_service(repos.clone(), create_event_bus()));

        let a = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.create(&customer("a"), occ, passengers(1)).await })
        };
        let b = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.create(&customer("b"), occ, passengers(1)).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let ok = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(BookingError::NoCapacity(_))))
            .count();
        assert_eq!((ok, rejected), (1, 1));

        let stored = repos.schedules().find_by_id(occ).await.unwrap().unwrap();
        assert_eq!(stored.capacity.used.passenger, 1);
    }
}
