//! Payment reconciliation
//!
//! Push notifications and poll results both end in
//! [`ReconciliationService::apply_remote_status`], so the two paths cannot
//! drift apart. Payment writes are conditional on the status they were
//! planned from; the first writer into a terminal state wins.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::booking::BookingService;
use crate::application::events::{
    Event, PaymentFailedEvent, PaymentRefundedEvent, PaymentSucceededEvent, SharedEventBus,
};
use crate::application::ports::SharedPaymentGateway;
use crate::domain::{
    Actor, Booking, BookingStatus, DomainError, Payment, PaymentStatus, Refund, RemoteStatus,
    RemoteTransaction, RepositoryProvider, TransitionPlan,
};
use crate::shared::errors::{BookingError, GatewayError};
use crate::shared::utills::{retry_with_delay, RetryConfig};

/// Cancellation reason when no payment session could be opened
pub const PAYMENT_UNAVAILABLE: &str = "payment_unavailable";

const MAX_APPLY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct ReconciliationPolicy {
    /// A full refund also moves the booking to REFUNDED
    pub full_refund_marks_booking_refunded: bool,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            full_refund_marks_booking_refunded: true,
        }
    }
}

/// What a remote report did to the local payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(PaymentStatus),
    Duplicate(PaymentStatus),
    /// Remote still pending or unrecognised
    Unchanged,
    /// Contradicts the monotonic rule; logged, not applied
    Rejected {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

impl ReconcileOutcome {
    /// Metrics label
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Duplicate(_) => "duplicate",
            Self::Unchanged => "unchanged",
            Self::Rejected { .. } => "rejected",
        }
    }
}

pub struct ReconciliationService {
    repos: Arc<dyn RepositoryProvider>,
    gateway: SharedPaymentGateway,
    bookings: Arc<BookingService>,
    event_bus: SharedEventBus,
    retry: RetryConfig,
    policy: ReconciliationPolicy,
}

impl ReconciliationService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        gateway: SharedPaymentGateway,
        bookings: Arc<BookingService>,
        event_bus: SharedEventBus,
        retry: RetryConfig,
        policy: ReconciliationPolicy,
    ) -> Self {
        Self {
            repos,
            gateway,
            bookings,
            event_bus,
            retry,
            policy,
        }
    }

    /// Open a gateway session for a PENDING booking and record the PENDING
    /// payment. Returns the existing open payment instead of creating a
    /// second one. When the gateway stays unavailable the booking is
    /// cancelled so its capacity goes back immediately.
    pub async fn initiate_payment(&self, booking: &Booking) -> Result<Payment, BookingError> {
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::invalid_transition(
                "booking",
                booking.status.as_str(),
                BookingStatus::Confirmed.as_str(),
            ));
        }
        if booking.is_past_deadline(Utc::now()) {
            return Err(BookingError::PaymentWindowExpired);
        }
        if let Some(open) = self
            .repos
            .payments()
            .find_open_for_booking(&booking.id)
            .await?
        {
            debug!(booking_code = %booking.code, payment_id = %open.id, "Reusing open payment");
            return Ok(open);
        }

        let session = match retry_with_delay(
            &self.retry,
            || self.gateway.create_transaction(booking),
            GatewayError::is_retryable,
            "create_transaction",
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(booking_code = %booking.code, error = %e, "Could not open payment session");
                if let Err(cancel_err) = self
                    .bookings
                    .cancel(&Actor::system(), &booking.id, PAYMENT_UNAVAILABLE)
                    .await
                {
                    error!(
                        booking_code = %booking.code,
                        error = %cancel_err,
                        "Failed to cancel booking after payment initiation failure"
                    );
                }
                return Err(e.into());
            }
        };

        let payment = Payment::pending(&booking.id, booking.total_amount, &session);
        self.repos.payments().insert(&payment).await?;

        info!(
            booking_code = %booking.code,
            payment_id = %payment.id,
            amount = payment.amount,
            "Payment initiated"
        );
        Ok(payment)
    }

    /// Latest payment attempt for the booking, open or settled
    pub async fn payment_for(&self, booking: &Booking) -> Result<Option<Payment>, BookingError> {
        Ok(self.repos.payments().find_by_order_id(&booking.code).await?)
    }

    /// Webhook entry point. Unverifiable payloads never touch state.
    pub async fn on_notification(
        &self,
        raw: &[u8],
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome, BookingError> {
        let notification = match self.gateway.verify_notification(raw, signature) {
            Ok(n) => n,
            Err(e) => {
                let label = match e {
                    GatewayError::InvalidSignature => "invalid_signature",
                    _ => "invalid_payload",
                };
                metrics::counter!("payment_notifications_total", "outcome" => label).increment(1);
                warn!(error = %e, "Dropping payment notification");
                return Err(e.into());
            }
        };

        let payment = match self
            .repos
            .payments()
            .find_by_order_id(&notification.order_id)
            .await?
        {
            Some(p) => p,
            None => {
                metrics::counter!("payment_notifications_total", "outcome" => "unknown_order")
                    .increment(1);
                warn!(order_id = %notification.order_id, "Notification for unknown order");
                return Err(
                    DomainError::not_found("Payment", "order_id", &notification.order_id).into(),
                );
            }
        };

        let outcome = self.apply_remote_status(&payment, &notification).await?;
        metrics::counter!("payment_notifications_total", "outcome" => outcome.as_label())
            .increment(1);
        Ok(outcome)
    }

    /// Polling fallback for one PENDING payment
    pub async fn on_poll_tick(&self, payment: &Payment) -> Result<ReconcileOutcome, BookingError> {
        self.repos
            .payments()
            .record_poll_attempt(&payment.id, Utc::now())
            .await?;

        let remote = match retry_with_delay(
            &self.retry,
            || self.gateway.poll_status(&payment.order_id),
            GatewayError::is_retryable,
            "poll_status",
        )
        .await
        {
            Ok(remote) => remote,
            Err(e) => {
                metrics::counter!("payment_polls_total", "outcome" => "gateway_error").increment(1);
                warn!(order_id = %payment.order_id, error = %e, "Payment status poll failed");
                return Err(e.into());
            }
        };

        let outcome = self.apply_remote_status(payment, &remote).await?;
        metrics::counter!("payment_polls_total", "outcome" => outcome.as_label()).increment(1);
        Ok(outcome)
    }

    /// Idempotent, monotonic application of a remote report
    pub async fn apply_remote_status(
        &self,
        payment: &Payment,
        remote: &RemoteTransaction,
    ) -> Result<ReconcileOutcome, BookingError> {
        let mut current = payment.clone();

        for _ in 0..MAX_APPLY_ATTEMPTS {
            if remote.status == RemoteStatus::Paid
                && remote.gross_amount.is_some_and(|g| g != current.amount)
            {
                warn!(
                    order_id = %current.order_id,
                    expected = current.amount,
                    reported = ?remote.gross_amount,
                    "Paid amount does not match payment amount"
                );
                return Ok(ReconcileOutcome::Rejected {
                    from: current.status,
                    to: PaymentStatus::Paid,
                });
            }

            let now = Utc::now();
            match current.plan(remote, now) {
                TransitionPlan::Unchanged => {
                    debug!(order_id = %current.order_id, remote = ?remote.status, "Payment unchanged");
                    return Ok(ReconcileOutcome::Unchanged);
                }
                TransitionPlan::Duplicate(status) => {
                    debug!(order_id = %current.order_id, %status, "Duplicate payment report");
                    // Re-drive the booking side in case an earlier attempt stopped halfway
                    self.settle_booking(&current).await?;
                    return Ok(ReconcileOutcome::Duplicate(status));
                }
                TransitionPlan::Rejected { from, to } => {
                    warn!(
                        order_id = %current.order_id,
                        payment_id = %current.id,
                        %from,
                        %to,
                        "Rejected non-monotonic payment transition"
                    );
                    return Ok(ReconcileOutcome::Rejected { from, to });
                }
                TransitionPlan::Apply { next, refund } => {
                    let written = self
                        .repos
                        .payments()
                        .update_if(&next, current.status, current.refunded_amount)
                        .await?;
                    if written {
                        info!(
                            order_id = %next.order_id,
                            payment_id = %next.id,
                            from = %current.status,
                            to = %next.status,
                            "Payment status updated"
                        );
                        self.after_transition(&next, refund).await?;
                        return Ok(ReconcileOutcome::Applied(next.status));
                    }

                    debug!(payment_id = %current.id, "Payment changed concurrently, re-planning");
                    current = self
                        .repos
                        .payments()
                        .find_by_id(&current.id)
                        .await?
                        .ok_or_else(|| DomainError::not_found("Payment", "id", &payment.id))?;
                }
            }
        }

        Err(DomainError::Conflict(format!("payment {} kept changing", payment.id)).into())
    }

    async fn after_transition(&self, next: &Payment, refund: Option<i64>) -> Result<(), BookingError> {
        let now = Utc::now();
        match next.status {
            PaymentStatus::Paid => {
                self.event_bus
                    .publish(Event::PaymentSucceeded(PaymentSucceededEvent {
                        order_id: next.order_id.clone(),
                        payment_id: next.id.clone(),
                        amount: next.amount,
                        method: next.method.clone(),
                        timestamp: now,
                    }));
                self.settle_booking(next).await
            }
            PaymentStatus::Failed | PaymentStatus::Expired => {
                self.event_bus.publish(Event::PaymentFailed(PaymentFailedEvent {
                    order_id: next.order_id.clone(),
                    payment_id: next.id.clone(),
                    status: next.status.as_str().to_string(),
                    reason: next.failure_reason.clone(),
                    timestamp: now,
                }));
                self.settle_booking(next).await
            }
            PaymentStatus::PartiallyRefunded | PaymentStatus::Refunded => {
                let amount = refund.unwrap_or(0);
                if amount > 0 {
                    self.repos
                        .refunds()
                        .insert(&Refund::new(&next.id, amount, next.failure_reason.clone()))
                        .await?;
                }
                let full = next.is_fully_refunded();
                self.event_bus
                    .publish(Event::PaymentRefunded(PaymentRefundedEvent {
                        order_id: next.order_id.clone(),
                        payment_id: next.id.clone(),
                        amount,
                        full,
                        timestamp: now,
                    }));
                if full && self.policy.full_refund_marks_booking_refunded {
                    if let Err(e) = self.bookings.mark_refunded(&next.booking_id).await {
                        if !e.is_benign_race() {
                            return Err(e);
                        }
                        warn!(booking_id = %next.booking_id, error = %e, "Refunded booking not confirmed");
                    }
                }
                Ok(())
            }
            PaymentStatus::Pending => Ok(()),
        }
    }

    /// Drive the booking to match a settled payment. Races with the expiry
    /// sweep or a user cancel surface as benign transition errors.
    async fn settle_booking(&self, payment: &Payment) -> Result<(), BookingError> {
        let result = match payment.status {
            PaymentStatus::Paid => self.bookings.confirm(&payment.booking_id).await.map(|_| ()),
            PaymentStatus::Failed | PaymentStatus::Expired => {
                let reason = payment
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| payment.status.as_str().to_lowercase());
                self.bookings
                    .cancel(&Actor::system(), &payment.booking_id, &reason)
                    .await
                    .map(|_| ())
            }
            _ => Ok(()),
        };

        match result {
            Err(e) if e.is_benign_race() => {
                if payment.status == PaymentStatus::Paid {
                    warn!(
                        booking_id = %payment.booking_id,
                        payment_id = %payment.id,
                        error = %e,
                        "Payment settled for a booking that is no longer pending"
                    );
                } else {
                    debug!(booking_id = %payment.booking_id, error = %e, "Booking already settled");
                }
                Ok(())
            }
            other => other,
        }
    }
}
