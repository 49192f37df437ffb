//! Payment domain entities and the monotonic status rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
    PartiallyRefunded,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
            Self::PartiallyRefunded => "PARTIALLY_REFUNDED",
            Self::Refunded => "REFUNDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PAID" => Some(Self::Paid),
            "FAILED" => Some(Self::Failed),
            "EXPIRED" => Some(Self::Expired),
            "PARTIALLY_REFUNDED" => Some(Self::PartiallyRefunded),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// FAILED / EXPIRED: no success transition is ever accepted afterwards
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Expired)
    }

    /// Still waiting on the gateway
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Monotonic transition table. Once PAID only refunds may follow.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (*self, next),
            (Pending, Paid)
                | (Pending, Failed)
                | (Pending, Expired)
                | (Paid, PartiallyRefunded)
                | (Paid, Refunded)
                | (PartiallyRefunded, PartiallyRefunded)
                | (PartiallyRefunded, Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider-side status, decoded once at the gateway boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Paid,
    Failed { reason: String },
    Expired,
    Cancelled { reason: String },
    /// `refunded_total` is the cumulative amount refunded so far, when known
    Refunded { refunded_total: Option<i64> },
    PartiallyRefunded { refunded_total: i64 },
    Unknown(String),
}

/// What the gateway reports about one transaction (push or poll)
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTransaction {
    /// Our booking code
    pub order_id: String,
    pub status: RemoteStatus,
    /// Gateway transaction id
    pub transaction_id: Option<String>,
    /// e.g. `bank_transfer`, `qris`, `credit_card`
    pub method: Option<String>,
    /// e.g. `bca`, `gopay`
    pub channel: Option<String>,
    pub gross_amount: Option<i64>,
    /// Untouched payload, kept for audit and replay
    pub raw: serde_json::Value,
}

/// A push notification whose signature has been checked
pub type VerifiedNotification = RemoteTransaction;

/// Payment session returned when a transaction is created at the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub order_id: String,
    pub token: String,
    pub redirect_url: String,
}

/// One payment attempt for a booking
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    /// External reference at the gateway (the booking code)
    pub order_id: String,
    pub amount: i64,
    pub method: Option<String>,
    pub channel: Option<String>,
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub snap_token: Option<String>,
    pub redirect_url: Option<String>,
    pub failure_reason: Option<String>,
    pub refunded_amount: i64,
    pub raw_payload: Option<serde_json::Value>,
    pub poll_attempts: u32,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn pending(booking_id: impl Into<String>, amount: i64, session: &PaymentSession) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            booking_id: booking_id.into(),
            order_id: session.order_id.clone(),
            amount,
            method: None,
            channel: None,
            transaction_id: None,
            status: PaymentStatus::Pending,
            snap_token: Some(session.token.clone()),
            redirect_url: Some(session.redirect_url.clone()),
            failure_reason: None,
            refunded_amount: 0,
            raw_payload: None,
            poll_attempts: 0,
            last_polled_at: None,
            paid_at: None,
            expired_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decide what a remote report means for this payment. Pure: the caller
    /// persists the result with a conditional write.
    pub fn plan(&self, remote: &RemoteTransaction, now: DateTime<Utc>) -> TransitionPlan {
        let (target, reason, refunded_total) = match &remote.status {
            RemoteStatus::Pending | RemoteStatus::Unknown(_) => return TransitionPlan::Unchanged,
            RemoteStatus::Paid => (PaymentStatus::Paid, None, None),
            RemoteStatus::Failed { reason } => (PaymentStatus::Failed, Some(reason.clone()), None),
            RemoteStatus::Cancelled { reason } => {
                (PaymentStatus::Failed, Some(reason.clone()), None)
            }
            RemoteStatus::Expired => (PaymentStatus::Expired, Some("expire".to_string()), None),
            RemoteStatus::Refunded { refunded_total } => (
                PaymentStatus::Refunded,
                None,
                Some(refunded_total.unwrap_or(self.amount)),
            ),
            RemoteStatus::PartiallyRefunded { refunded_total } => {
                (PaymentStatus::PartiallyRefunded, None, Some(*refunded_total))
            }
        };

        if let Some(total) = refunded_total {
            if total > self.amount || total < 0 {
                return TransitionPlan::Rejected {
                    from: self.status,
                    to: target,
                };
            }
            if self.status == target && total <= self.refunded_amount {
                return TransitionPlan::Duplicate(self.status);
            }
            // A stale partial report after the full refund landed
            if self.status == PaymentStatus::Refunded {
                return TransitionPlan::Duplicate(self.status);
            }
        } else if self.status == target {
            return TransitionPlan::Duplicate(self.status);
        }

        if !self.status.can_transition_to(target) {
            return TransitionPlan::Rejected {
                from: self.status,
                to: target,
            };
        }

        let mut next = self.clone();
        next.status = target;
        next.updated_at = now;
        next.raw_payload = Some(remote.raw.clone());
        if remote.transaction_id.is_some() {
            next.transaction_id = remote.transaction_id.clone();
        }
        if remote.method.is_some() {
            next.method = remote.method.clone();
        }
        if remote.channel.is_some() {
            next.channel = remote.channel.clone();
        }

        let mut refund = None;
        match target {
            PaymentStatus::Paid => next.paid_at = Some(now),
            PaymentStatus::Failed => next.failure_reason = reason,
            PaymentStatus::Expired => {
                next.expired_at = Some(now);
                next.failure_reason = reason;
            }
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => {
                let total = refunded_total.unwrap_or(self.amount);
                refund = Some(total - self.refunded_amount);
                next.refunded_amount = total;
                next.refunded_at = Some(now);
            }
            PaymentStatus::Pending => {}
        }

        TransitionPlan::Apply {
            next: Box::new(next),
            refund,
        }
    }

    /// Local expiry of an open payment when its booking is expired or cancelled
    pub fn closed_locally(&self, status: PaymentStatus, reason: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.failure_reason = Some(reason.to_string());
        if status == PaymentStatus::Expired {
            next.expired_at = Some(now);
        }
        next.updated_at = now;
        next
    }

    pub fn is_fully_refunded(&self) -> bool {
        self.status == PaymentStatus::Refunded
    }
}

/// Outcome of [`Payment::plan`]
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionPlan {
    /// Remote still pending or unrecognised
    Unchanged,
    /// Already in this state (duplicate notification / poll)
    Duplicate(PaymentStatus),
    /// Would violate monotonicity; logged, not applied
    Rejected {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    /// Write `next`; `refund` carries the newly refunded amount, if any
    Apply {
        next: Box<Payment>,
        refund: Option<i64>,
    },
}

/// Money returned against a payment
#[derive(Debug, Clone, PartialEq)]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    pub fn new(payment_id: impl Into<String>, amount: i64, reason: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payment_id: payment_id.into(),
            amount,
            reason,
            created_at: Utc::now(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(status: PaymentStatus) -> Payment {
        let session = PaymentSession {
            order_id: "FRY-261017-ABC123".into(),
            token: "tok".into(),
            redirect_url: "https://pay.example/tok".into(),
        };
        let mut p = Payment::pending("b-1", 100_000, &session);
        p.status = status;
        p
    }

    fn remote(status: RemoteStatus) -> RemoteTransaction {
        RemoteTransaction {
            order_id: "FRY-261017-ABC123".into(),
            status,
            transaction_id: Some("tx-9".into()),
            method: Some("bank_transfer".into()),
            channel: Some("bca".into()),
            gross_amount: Some(100_000),
            raw: serde_json::json!({"transaction_status": "x"}),
        }
    }

    fn applied(plan: TransitionPlan) -> (Payment, Option<i64>) {
        match plan {
            TransitionPlan::Apply { next, refund } => (*next, refund),
            other => panic!("expected Apply, got {:?}", other),
        }
    }

    #[test]
    fn pending_to_paid_records_payment_details() {
        let now = Utc::now();
        let (next, refund) = applied(payment(PaymentStatus::Pending).plan(&remote(RemoteStatus::Paid), now));
        assert_eq!(next.status, PaymentStatus::Paid);
        assert_eq!(next.paid_at, Some(now));
        assert_eq!(next.transaction_id.as_deref(), Some("tx-9"));
        assert_eq!(next.channel.as_deref(), Some("bca"));
        assert!(next.raw_payload.is_some());
        assert_eq!(refund, None);
    }

    #[test]
    fn remote_pending_is_unchanged() {
        let plan = payment(PaymentStatus::Pending).plan(&remote(RemoteStatus::Pending), Utc::now());
        assert_eq!(plan, TransitionPlan::Unchanged);
        let plan = payment(PaymentStatus::Pending)
            .plan(&remote(RemoteStatus::Unknown("weird".into())), Utc::now());
        assert_eq!(plan, TransitionPlan::Unchanged);
    }

    #[test]
    fn duplicate_paid_is_detected() {
        let plan = payment(PaymentStatus::Paid).plan(&remote(RemoteStatus::Paid), Utc::now());
        assert_eq!(plan, TransitionPlan::Duplicate(PaymentStatus::Paid));
    }

    #[test]
    fn late_paid_after_expiry_is_rejected() {
        let plan = payment(PaymentStatus::Expired).plan(&remote(RemoteStatus::Paid), Utc::now());
        assert_eq!(
            plan,
            TransitionPlan::Rejected {
                from: PaymentStatus::Expired,
                to: PaymentStatus::Paid
            }
        );
    }

    #[test]
    fn paid_cannot_fail() {
        let plan = payment(PaymentStatus::Paid).plan(
            &remote(RemoteStatus::Failed {
                reason: "deny".into(),
            }),
            Utc::now(),
        );
        assert!(matches!(plan, TransitionPlan::Rejected { .. }));
    }

    #[test]
    fn cancel_maps_to_failed_with_reason() {
        let (next, _) = applied(payment(PaymentStatus::Pending).plan(
            &remote(RemoteStatus::Cancelled {
                reason: "cancel".into(),
            }),
            Utc::now(),
        ));
        assert_eq!(next.status, PaymentStatus::Failed);
        assert_eq!(next.failure_reason.as_deref(), Some("cancel"));
    }

    #[test]
    fn full_refund_defaults_to_payment_amount() {
        let (next, refund) = applied(payment(PaymentStatus::Paid).plan(
            &remote(RemoteStatus::Refunded {
                refunded_total: None,
            }),
            Utc::now(),
        ));
        assert_eq!(next.status, PaymentStatus::Refunded);
        assert_eq!(next.refunded_amount, 100_000);
        assert_eq!(refund, Some(100_000));
    }

    #[test]
    fn partial_refunds_accumulate() {
        let p = payment(PaymentStatus::Paid);
        let (p, refund) = applied(p.plan(
            &remote(RemoteStatus::PartiallyRefunded {
                refunded_total: 30_000,
            }),
            Utc::now(),
        ));
        assert_eq!(refund, Some(30_000));
        let (p, refund) = applied(p.plan(
            &remote(RemoteStatus::PartiallyRefunded {
                refunded_total: 50_000,
            }),
            Utc::now(),
        ));
        assert_eq!(refund, Some(20_000));
        assert_eq!(p.refunded_amount, 50_000);

        // same report again
        let plan = p.plan(
            &remote(RemoteStatus::PartiallyRefunded {
                refunded_total: 50_000,
            }),
            Utc::now(),
        );
        assert_eq!(plan, TransitionPlan::Duplicate(PaymentStatus::PartiallyRefunded));

        let (p, refund) = applied(p.plan(
            &remote(RemoteStatus::Refunded {
                refunded_total: Some(100_000),
            }),
            Utc::now(),
        ));
        assert_eq!(refund, Some(50_000));
        assert!(p.is_fully_refunded());
    }

    #[test]
    fn refund_above_amount_is_rejected() {
        let plan = payment(PaymentStatus::Paid).plan(
            &remote(RemoteStatus::PartiallyRefunded {
                refunded_total: 100_001,
            }),
            Utc::now(),
        );
        assert!(matches!(plan, TransitionPlan::Rejected { .. }));
    }

    #[test]
    fn refund_of_pending_payment_is_rejected() {
        let plan = payment(PaymentStatus::Pending).plan(
            &remote(RemoteStatus::Refunded {
                refunded_total: None,
            }),
            Utc::now(),
        );
        assert!(matches!(plan, TransitionPlan::Rejected { .. }));
    }

    #[test]
    fn monotonic_table() {
        use PaymentStatus::*;
        for terminal in [Failed, Expired, Refunded] {
            for next in [Pending, Paid, Failed, Expired, PartiallyRefunded] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Expired));
    }
}
