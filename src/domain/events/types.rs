//! Booking domain events
//!
//! Emitted by the core; delivery (email, push, websocket) belongs to
//! whoever subscribes to the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event types for notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    BookingCreated(BookingCreatedEvent),
    BookingConfirmed(BookingConfirmedEvent),
    BookingCancelled(BookingCancelledEvent),
    BookingExpired(BookingExpiredEvent),
    BookingRefunded(BookingRefundedEvent),
    PaymentSucceeded(PaymentSucceededEvent),
    PaymentFailed(PaymentFailedEvent),
    PaymentRefunded(PaymentRefundedEvent),
    ScheduleChanged(ScheduleChangedEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::BookingCreated(_) => "booking_created",
            Event::BookingConfirmed(_) => "booking_confirmed",
            Event::BookingCancelled(_) => "booking_cancelled",
            Event::BookingExpired(_) => "booking_expired",
            Event::BookingRefunded(_) => "booking_refunded",
            Event::PaymentSucceeded(_) => "payment_succeeded",
            Event::PaymentFailed(_) => "payment_failed",
            Event::PaymentRefunded(_) => "payment_refunded",
            Event::ScheduleChanged(_) => "schedule_changed",
        }
    }

    pub fn booking_code(&self) -> Option<&str> {
        match self {
            Event::BookingCreated(e) => Some(&e.booking_code),
            Event::BookingConfirmed(e) => Some(&e.booking_code),
            Event::BookingCancelled(e) => Some(&e.booking_code),
            Event::BookingExpired(e) => Some(&e.booking_code),
            Event::BookingRefunded(e) => Some(&e.booking_code),
            Event::PaymentSucceeded(e) => Some(&e.order_id),
            Event::PaymentFailed(e) => Some(&e.order_id),
            Event::PaymentRefunded(e) => Some(&e.order_id),
            Event::ScheduleChanged(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCreatedEvent {
    pub booking_code: String,
    pub occurrence_id: i64,
    pub total_amount: i64,
    pub expires_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmedEvent {
    pub booking_code: String,
    pub occurrence_id: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCancelledEvent {
    pub booking_code: String,
    pub occurrence_id: i64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingExpiredEvent {
    pub booking_code: String,
    pub occurrence_id: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRefundedEvent {
    pub booking_code: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceededEvent {
    pub order_id: String,
    pub payment_id: String,
    pub amount: i64,
    pub method: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order_id: String,
    pub payment_id: String,
    pub status: String,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedEvent {
    pub order_id: String,
    pub payment_id: String,
    pub amount: i64,
    pub full: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleChangedEvent {
    pub occurrence_id: i64,
    pub old_status: String,
    pub new_status: String,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Envelope published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let msg = EventMessage::new(Event::BookingExpired(BookingExpiredEvent {
            booking_code: "FRY-1".into(),
            occurrence_id: 3,
            timestamp: Utc::now(),
        }));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "BookingExpired");
        assert_eq!(json["data"]["booking_code"], "FRY-1");
        assert_eq!(msg.event.event_type(), "booking_expired");
        assert_eq!(msg.event.booking_code(), Some("FRY-1"));
    }
}
