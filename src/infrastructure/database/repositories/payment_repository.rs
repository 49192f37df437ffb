//! SeaORM implementation of PaymentRepository and RefundRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, UpdateResult,
};
use tracing::{debug, warn};

use crate::domain::{
    DomainError, DomainResult, Payment, PaymentRepository, PaymentStatus, Refund, RefundRepository,
};
use crate::infrastructure::database::entities::{payment, refund};

pub struct SeaOrmPaymentRepository {
    db: DatabaseConnection,
}

impl SeaOrmPaymentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub struct SeaOrmRefundRepository {
    db: DatabaseConnection,
}

impl SeaOrmRefundRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: payment::Model) -> DomainResult<Payment> {
    let status = PaymentStatus::from_str(&m.status)
        .ok_or_else(|| DomainError::Database(format!("unknown payment status {}", m.status)))?;
    let raw_payload = match m.raw_payload {
        Some(text) => match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Unreadable raw payload on payment {}: {}", m.id, e);
                None
            }
        },
        None => None,
    };

    Ok(Payment {
        id: m.id,
        booking_id: m.booking_id,
        order_id: m.order_id,
        amount: m.amount,
        method: m.method,
        channel: m.channel,
        transaction_id: m.transaction_id,
        status,
        snap_token: m.snap_token,
        redirect_url: m.redirect_url,
        failure_reason: m.failure_reason,
        refunded_amount: m.refunded_amount,
        raw_payload,
        poll_attempts: m.poll_attempts.max(0) as u32,
        last_polled_at: m.last_polled_at,
        paid_at: m.paid_at,
        expired_at: m.expired_at,
        refunded_at: m.refunded_at,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn refund_to_domain(m: refund::Model) -> Refund {
    Refund {
        id: m.id,
        payment_id: m.payment_id,
        amount: m.amount,
        reason: m.reason,
        created_at: m.created_at,
    }
}

fn payload_text(p: &Payment) -> Option<String> {
    p.raw_payload.as_ref().map(|v| v.to_string())
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Database(e.to_string())
}

// ── PaymentRepository impl ──────────────────────────────────────

#[async_trait]
impl PaymentRepository for SeaOrmPaymentRepository {
    async fn insert(&self, p: &Payment) -> DomainResult<()> {
        debug!("Saving payment {} for order {}", p.id, p.order_id);

        let model = payment::ActiveModel {
            id: Set(p.id.clone()),
            booking_id: Set(p.booking_id.clone()),
            order_id: Set(p.order_id.clone()),
            amount: Set(p.amount),
            method: Set(p.method.clone()),
            channel: Set(p.channel.clone()),
            transaction_id: Set(p.transaction_id.clone()),
            status: Set(p.status.as_str().to_string()),
            snap_token: Set(p.snap_token.clone()),
            redirect_url: Set(p.redirect_url.clone()),
            failure_reason: Set(p.failure_reason.clone()),
            refunded_amount: Set(p.refunded_amount),
            raw_payload: Set(payload_text(p)),
            poll_attempts: Set(p.poll_attempts as i32),
            last_polled_at: Set(p.last_polled_at),
            paid_at: Set(p.paid_at),
            expired_at: Set(p.expired_at),
            refunded_at: Set(p.refunded_at),
            created_at: Set(p.created_at),
            updated_at: Set(p.updated_at),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Payment>> {
        payment::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_order_id(&self, order_id: &str) -> DomainResult<Option<Payment>> {
        payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_desc(payment::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_open_for_booking(&self, booking_id: &str) -> DomainResult<Option<Payment>> {
        payment::Entity::find()
            .filter(payment::Column::BookingId.eq(booking_id))
            .filter(payment::Column::Status.eq(PaymentStatus::Pending.as_str()))
            .order_by_desc(payment::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn update_if(
        &self,
        next: &Payment,
        expected_status: PaymentStatus,
        expected_refunded: i64,
    ) -> DomainResult<bool> {
        use payment::Column;

        // Poll bookkeeping is owned by record_poll_attempt and left alone here
        let result: UpdateResult = payment::Entity::update_many()
            .col_expr(Column::Status, Expr::value(next.status.as_str()))
            .col_expr(Column::Method, Expr::value(next.method.clone()))
            .col_expr(Column::Channel, Expr::value(next.channel.clone()))
            .col_expr(Column::TransactionId, Expr::value(next.transaction_id.clone()))
            .col_expr(Column::SnapToken, Expr::value(next.snap_token.clone()))
            .col_expr(Column::RedirectUrl, Expr::value(next.redirect_url.clone()))
            .col_expr(Column::FailureReason, Expr::value(next.failure_reason.clone()))
            .col_expr(Column::RefundedAmount, Expr::value(next.refunded_amount))
            .col_expr(Column::RawPayload, Expr::value(payload_text(next)))
            .col_expr(Column::PaidAt, Expr::value(next.paid_at))
            .col_expr(Column::ExpiredAt, Expr::value(next.expired_at))
            .col_expr(Column::RefundedAt, Expr::value(next.refunded_at))
            .col_expr(Column::UpdatedAt, Expr::value(next.updated_at))
            .filter(Column::Id.eq(next.id.as_str()))
            .filter(Column::Status.eq(expected_status.as_str()))
            .filter(Column::RefundedAmount.eq(expected_refunded))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected > 0 {
            return Ok(true);
        }

        let exists = payment::Entity::find_by_id(next.id.clone())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .is_some();
        if !exists {
            return Err(DomainError::not_found("Payment", "id", &next.id));
        }
        debug!(
            "Payment {} changed underneath (expected {} / refunded {})",
            next.id, expected_status, expected_refunded
        );
        Ok(false)
    }

    async fn find_due_for_poll(
        &self,
        created_before: DateTime<Utc>,
        max_attempts: u32,
        limit: u64,
    ) -> DomainResult<Vec<Payment>> {
        let models = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Pending.as_str()))
            .filter(payment::Column::CreatedAt.lt(created_before))
            .filter(payment::Column::PollAttempts.lt(max_attempts as i32))
            .order_by_asc(payment::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models.into_iter().map(model_to_domain).collect()
    }

    async fn record_poll_attempt(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        let result: UpdateResult = payment::Entity::update_many()
            .col_expr(
                payment::Column::PollAttempts,
                Expr::col(payment::Column::PollAttempts).add(1),
            )
            .col_expr(payment::Column::LastPolledAt, Expr::value(Some(at)))
            .filter(payment::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(DomainError::not_found("Payment", "id", id));
        }
        Ok(())
    }
}

// ── RefundRepository impl ───────────────────────────────────────

#[async_trait]
impl RefundRepository for SeaOrmRefundRepository {
    async fn insert(&self, r: &Refund) -> DomainResult<()> {
        debug!("Recording refund {} of {} on payment {}", r.id, r.amount, r.payment_id);

        let model = refund::ActiveModel {
            id: Set(r.id.clone()),
            payment_id: Set(r.payment_id.clone()),
            amount: Set(r.amount),
            reason: Set(r.reason.clone()),
            created_at: Set(r.created_at),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_for_payment(&self, payment_id: &str) -> DomainResult<Vec<Refund>> {
        let models = refund::Entity::find()
            .filter(refund::Column::PaymentId.eq(payment_id))
            .order_by_asc(refund::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(refund_to_domain).collect())
    }
}
